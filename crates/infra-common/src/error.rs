//! A common error shape for configuration/bootstrap failures, with an
//! `ErrorContext` (component + operation + optional detail) so startup
//! failures in any crate can be reported uniformly.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Context information attached to an error: which component, which
/// operation, and any extra detail worth logging alongside it.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub component: String,
    pub operation: String,
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self { component: component.into(), operation: operation.into(), details: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "in component '{}' during operation '{}'", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_formats_with_and_without_details() {
        let bare = ErrorContext::new("dialer", "execute_call");
        assert_eq!(bare.to_string(), "in component 'dialer' during operation 'execute_call'");

        let detailed = bare.with_details("consent denied");
        assert_eq!(
            detailed.to_string(),
            "in component 'dialer' during operation 'execute_call' (consent denied)"
        );
    }
}
