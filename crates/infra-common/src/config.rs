//! Layered configuration loading, mirroring `infra-common::config` in the
//! teacher workspace: components depend on a small abstraction
//! ([`ConfigProvider`]) instead of a concrete file format, and the actual
//! loader composes a TOML file with `CALLCORE_*` environment overrides via
//! the `config` crate.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Abstracts "where configuration comes from" so components depend on this
/// trait rather than a concrete file format or the `config` crate's
/// builder directly.
pub trait ConfigProvider {
    fn load<T: DeserializeOwned>(&self) -> Result<T>;
}

/// Loads a TOML file at `path`, overlaying environment variables prefixed
/// `CALLCORE_` (double-underscore separated for nested keys, e.g.
/// `CALLCORE_DIALER__MAX_CONCURRENT_CALLS=5`).
pub struct FileConfigProvider {
    path: String,
    env_prefix: String,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), env_prefix: "CALLCORE".to_string() }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load<T: DeserializeOwned>(&self) -> Result<T> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&self.path).required(false))
            .add_source(config::Environment::with_prefix(&self.env_prefix).separator("__"))
            .build()
            .map_err(|err| Error::Config(err.to_string()))?;

        settings.try_deserialize().map_err(|err| Error::Config(err.to_string()))
    }
}

/// A provider that ignores any backing store and always returns `T::default()`.
/// Useful for tests and for components that have no required configuration.
#[derive(Default)]
pub struct DefaultConfigProvider;

impl ConfigProvider for DefaultConfigProvider {
    fn load<T: DeserializeOwned>(&self) -> Result<T> {
        let settings = config::Config::builder().build().map_err(|err| Error::Config(err.to_string()))?;
        settings.try_deserialize().map_err(|err| Error::Config(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default = "default_count")]
        count: u32,
    }

    fn default_count() -> u32 {
        7
    }

    #[test]
    fn env_override_takes_precedence_over_missing_file() {
        std::env::set_var("CALLCORETEST__COUNT", "42");
        let provider = FileConfigProvider::new("nonexistent").with_env_prefix("CALLCORETEST");
        let sample: Sample = provider.load().unwrap();
        assert_eq!(sample.count, 42);
        std::env::remove_var("CALLCORETEST__COUNT");
    }

    #[test]
    fn falls_back_to_field_default_when_unset() {
        let provider = DefaultConfigProvider;
        let sample: Sample = provider.load().unwrap();
        assert_eq!(sample, Sample { count: 7 });
    }
}
