//! Error handling for name vetting operations.
//!
//! Two layers live here. [`ProbeFailure`] is the probe-local taxonomy: it is
//! produced by a single network call and consumed by the resolver or prober
//! that made it, and never reaches the caller raw. [`NameVetError`] covers
//! the failures that do reach the caller: bad input, bad configuration and
//! internal faults.

use std::fmt;
use std::time::Duration;

/// Why a single probe could not produce a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeFailure {
    /// The call did not complete within the per-probe timeout.
    Timeout,
    /// Connection refused, DNS failure for the upstream host, no endpoint known.
    Unreachable,
    /// The upstream answered, but not in a shape we can classify.
    MalformedResponse,
    /// The upstream throttled us, or the local token bucket was exhausted.
    RateLimited,
}

impl ProbeFailure {
    /// Short machine-friendly label used in verdict details and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unreachable => "unreachable",
            Self::MalformedResponse => "malformed response",
            Self::RateLimited => "rate limited",
        }
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::error::Error for ProbeFailure {}

impl From<reqwest::Error> for ProbeFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() || err.is_body() {
            Self::MalformedResponse
        } else {
            Self::Unreachable
        }
    }
}

impl From<std::io::Error> for ProbeFailure {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
                Self::MalformedResponse
            }
            _ => Self::Unreachable,
        }
    }
}

/// Main error type for the caller-facing API.
///
/// Per-target failures never show up here; they are folded into an
/// `Unknown` verdict instead.
#[derive(Debug, Clone)]
pub enum NameVetError {
    /// The candidate name has nothing usable in it
    InvalidName { name: String, reason: String },

    /// Invalid domain name format
    InvalidDomain { domain: String, reason: String },

    /// Configuration errors (invalid settings, unparsable files, etc.)
    ConfigError { message: String },

    /// File I/O errors when reading configuration
    FileError { path: String, message: String },

    /// Network setup errors (HTTP client or resolver construction)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// Timeout errors when a caller-level operation takes too long
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl NameVetError {
    /// Create a new invalid name error.
    pub fn invalid_name<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from user input rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidName { .. } | Self::InvalidDomain { .. })
    }
}

impl fmt::Display for NameVetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { name, reason } => {
                write!(f, "Invalid name '{}': {}", name, reason)
            }
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for NameVetError {}

impl From<reqwest::Error> for NameVetError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_with_source("HTTP client error", err.to_string())
    }
}

impl From<serde_json::Error> for NameVetError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON serialization failed: {}", err))
    }
}

impl From<std::io::Error> for NameVetError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<toml::de::Error> for NameVetError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML configuration: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_failure_labels() {
        assert_eq!(ProbeFailure::Timeout.to_string(), "timeout");
        assert_eq!(ProbeFailure::RateLimited.to_string(), "rate limited");
        assert_eq!(
            ProbeFailure::MalformedResponse.to_string(),
            "malformed response"
        );
    }

    #[test]
    fn test_io_error_mapping() {
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(ProbeFailure::from(timed_out), ProbeFailure::Timeout);

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "nope");
        assert_eq!(ProbeFailure::from(refused), ProbeFailure::Unreachable);

        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "cut");
        assert_eq!(ProbeFailure::from(eof), ProbeFailure::MalformedResponse);
    }

    #[test]
    fn test_error_display() {
        let err = NameVetError::invalid_name("!!!", "no alphanumeric characters");
        assert_eq!(
            err.to_string(),
            "Invalid name '!!!': no alphanumeric characters"
        );
        assert!(err.is_input_error());

        let err = NameVetError::config("probe timeout must be positive");
        assert!(err.to_string().starts_with("Configuration error"));
        assert!(!err.is_input_error());
    }
}
