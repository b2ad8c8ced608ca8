//! RTP/RTCP packet handling: wire (de)serialization, the adaptive jitter
//! buffer, and per-call session state.

mod error;
mod jitter;
mod packet;
mod rtcp;
mod session;

pub use error::{Result, RtpError};
pub use jitter::{JitterBuffer, JitterBufferConfig, JitterBufferStats};
pub use packet::{seq_diff, seq_lt, ts_diff, Arrival, RtpHeader, RtpPacket, RTP_VERSION};
pub use rtcp::{RtcpReceiverReport, RtcpReportBlock};
pub use session::{RtpPayloadType, RtpSession};

pub mod prelude {
    pub use crate::{
        JitterBuffer, JitterBufferConfig, RtcpReceiverReport, RtpHeader, RtpPacket,
        RtpPayloadType, RtpSession, RtpError,
    };
}
