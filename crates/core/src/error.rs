//! Error types for the Relief core.
//!
//! None of these are fatal to a request: the pipeline converts each of them
//! into a degraded value (empty domain result, retained message, default
//! config) at the boundary where it occurs.

use thiserror::Error;

/// Errors raised while configuring the pipeline
#[derive(Error, Debug)]
pub enum ReliefError {
    /// A domain tag outside shelter/food/medical/government
    #[error("Unknown worker type: {0}")]
    UnknownDomain(String),

    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for `ReliefConfig`
    #[error("Invalid config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure reported by a resource lookup collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("Lookup provider unavailable: {0}")]
    Unavailable(String),

    #[error("Lookup timed out after {0}ms")]
    Timeout(u64),

    #[error("Malformed lookup response: {0}")]
    Malformed(String),
}

/// Failure returned by an A2A message handler
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Handler for '{agent}' failed: {reason}")]
pub struct HandlerError {
    pub agent: String,
    pub reason: String,
}

impl HandlerError {
    pub fn new(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_domain_message() {
        let err = ReliefError::UnknownDomain("weather".to_string());
        assert_eq!(err.to_string(), "Unknown worker type: weather");
    }

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::new("planner", "session missing");
        assert_eq!(err.to_string(), "Handler for 'planner' failed: session missing");
    }
}
