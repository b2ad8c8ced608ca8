//! Ambient stack (C13) shared across the workspace: layered configuration,
//! logging setup, a common error-context shape, and a small typed event
//! bus. No crate-specific domain types live here — `DialerConfig`,
//! `SecurityConfig` and friends stay in their owning crates; this crate
//! only supplies the machinery they're loaded and reported through.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{ConfigProvider, DefaultConfigProvider, FileConfigProvider};
pub use error::{Error, ErrorContext, Result};
pub use events::EventBus;
pub use logging::{log_welcome, parse_log_level, setup_logging, LoggingConfig};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use crate::{
        log_welcome, parse_log_level, setup_logging, ConfigProvider, DefaultConfigProvider,
        Error, ErrorContext, EventBus, FileConfigProvider, LoggingConfig,
    };
}
