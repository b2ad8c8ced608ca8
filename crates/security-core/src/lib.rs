//! Webhook signature validation (C10): the trust boundary the core audio
//! pipeline sits behind. HTTP framework glue lives at the adapter layer;
//! this crate only computes and compares signatures, validates replay
//! windows, and resolves a trustworthy client IP.

mod client_ip;
mod error;
mod generic;
mod sipgate;
mod timestamp;
mod twilio;

pub use client_ip::{client_ip, TrustedProxies};
pub use error::{Result, SecurityError};
pub use generic::{GenericHmacValidator, HmacAlgorithm};
pub use sipgate::SipgateSignatureValidator;
pub use timestamp::TimestampValidator;
pub use twilio::TwilioSignatureValidator;

pub mod prelude {
    pub use crate::{
        client_ip, GenericHmacValidator, HmacAlgorithm, SecurityError, SipgateSignatureValidator,
        TimestampValidator, TrustedProxies, TwilioSignatureValidator,
    };
}
