//! Logging setup shared by every binary in this workspace: a small config
//! struct plus one `setup_logging` call, supporting plain and JSON output
//! and optional span logging.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub json: bool,
    pub file_info: bool,
    pub log_spans: bool,
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "callcore".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        Self { level, app_name: app_name.into(), ..Default::default() }
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Installs the global `tracing` subscriber. Call once, near the start of
/// `main`. Returns an error rather than panicking so callers can decide how
/// to handle a double-init during tests.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let span_events = if config.log_spans { FmtSpan::ACTIVE } else { FmtSpan::NONE };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let result = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|err| Error::Logging(err.to_string()))
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Config(format!("invalid log level: {level}")))
}

pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("starting {app_name} v{version}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert!(parse_log_level("not-a-level").is_err());
    }

    #[test]
    fn builder_methods_toggle_flags() {
        let config = LoggingConfig::new(Level::WARN, "callcore-test").with_json().with_spans().with_file_info();
        assert!(config.json);
        assert!(config.log_spans);
        assert!(config.file_info);
        assert_eq!(config.app_name, "callcore-test");
    }
}
