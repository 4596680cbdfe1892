//! Error types for Loraix runtime operations.

use std::error::Error as StdError;
use std::io;

/// HTTP statuses that are worth another attempt.
const RETRYABLE_STATUS_CODES: [u16; 3] = [429, 500, 503];

/// HTTP statuses that are permanent client or auth failures.
const PERMANENT_STATUS_CODES: [u16; 3] = [400, 401, 403];

/// Transport error codes treated as transient.
const TRANSIENT_CODES: [&str; 4] = ["ECONNRESET", "ECONNREFUSED", "ETIMEDOUT", "ENOTFOUND"];

/// The main error type for Loraix operations.
#[derive(Debug, thiserror::Error)]
pub enum LoraixError {
    /// Vendor answered with a non-success HTTP status
    #[error("{provider} request failed ({status}): {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// Errors raised by the HTTP client
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Transport failure described by flags rather than a client error
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        code: Option<String>,
        network: bool,
    },

    /// Deadline elapsed before the operation finished
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The in-flight operation was aborted through its cancellation token
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Structured output could not be parsed or did not match its schema
    #[error("JSON validation error: {message}")]
    JsonValidation {
        message: String,
        #[source]
        source: Option<Box<LoraixError>>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unsupported operation errors
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Stream errors
    #[error("Stream error: {0}")]
    Stream(String),

    /// Interceptor errors
    #[error("Interceptor error ({interceptor}): {message}")]
    Interceptor {
        interceptor: String,
        message: String,
    },

    /// Provider-specific errors
    #[error("Provider error: {0}")]
    Provider(String),

    /// Generic errors
    #[error("Error: {0}")]
    Other(String),
}

impl LoraixError {
    /// Create an HTTP status error
    pub fn status(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            provider: provider.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a transport error flagged as a network failure
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            code: None,
            network: true,
        }
    }

    /// Create a transport error carrying a system error code such as `ECONNRESET`
    pub fn transport_code(msg: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            code: Some(code.into()),
            network: false,
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a JSON validation error
    pub fn json_validation(msg: impl Into<String>) -> Self {
        Self::JsonValidation {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a JSON validation error wrapping the last underlying failure
    pub fn json_validation_caused_by(msg: impl Into<String>, cause: LoraixError) -> Self {
        Self::JsonValidation {
            message: msg.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Create an interceptor error
    pub fn interceptor(interceptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Interceptor {
            interceptor: interceptor.into(),
            message: message.into(),
        }
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// HTTP status attached to this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LoraixError::Status { status, .. } => Some(*status),
            LoraixError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// System error code attached to this error, if any
    pub fn code(&self) -> Option<String> {
        match self {
            LoraixError::Transport { code, .. } => code.clone(),
            LoraixError::Network(e) => io_error_code(e).map(str::to_string),
            _ => None,
        }
    }

    /// Whether this error was raised by a deadline
    pub fn is_timeout(&self) -> bool {
        match self {
            LoraixError::Timeout { .. } => true,
            LoraixError::Network(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Whether this error is flagged as a network failure
    pub fn is_network(&self) -> bool {
        match self {
            LoraixError::Transport { network, .. } => *network,
            LoraixError::Network(e) => e.is_connect(),
            _ => false,
        }
    }

    /// Check if this error warrants another attempt.
    ///
    /// JSON validation failures never retry. A known HTTP status decides on
    /// its own: 400/401/403 are permanent, 429/500/503 are transient and
    /// anything else is not retried. Cancellations and well-known transport
    /// codes retry; everything else retries only when flagged as a network
    /// failure or a timeout.
    pub fn is_retryable(&self) -> bool {
        if matches!(self, LoraixError::JsonValidation { .. }) {
            return false;
        }

        if let Some(status) = self.status_code() {
            if PERMANENT_STATUS_CODES.contains(&status) {
                return false;
            }
            return RETRYABLE_STATUS_CODES.contains(&status);
        }

        if matches!(self, LoraixError::Cancelled(_)) {
            return true;
        }

        if let Some(code) = self.code() {
            if TRANSIENT_CODES.contains(&code.as_str()) {
                return true;
            }
        }

        self.is_network() || self.is_timeout()
    }
}

/// Map an `io::Error` found in the source chain to its conventional code.
fn io_error_code(err: &reqwest::Error) -> Option<&'static str> {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return match io_err.kind() {
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                    Some("ECONNRESET")
                }
                io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
                io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
                _ => None,
            };
        }
        source = inner.source();
    }
    None
}

impl From<String> for LoraixError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for LoraixError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 500, 503] {
            assert!(LoraixError::status("openai", status, "").is_retryable());
        }
    }

    #[test]
    fn test_permanent_statuses() {
        for status in [400, 401, 403] {
            assert!(!LoraixError::status("openai", status, "").is_retryable());
        }
        assert!(!LoraixError::status("openai", 404, "").is_retryable());
    }

    #[test]
    fn test_json_validation_never_retries() {
        assert!(!LoraixError::json_validation("bad").is_retryable());
        let wrapped =
            LoraixError::json_validation_caused_by("bad", LoraixError::timeout(10));
        assert!(!wrapped.is_retryable());
    }

    #[test]
    fn test_transport_classification() {
        assert!(LoraixError::cancelled("aborted").is_retryable());
        assert!(LoraixError::timeout(10).is_retryable());
        assert!(LoraixError::network("socket hang up").is_retryable());
        assert!(LoraixError::transport_code("reset", "ECONNRESET").is_retryable());
        assert!(LoraixError::transport_code("dns", "ENOTFOUND").is_retryable());
        assert!(!LoraixError::transport_code("perm", "EACCES").is_retryable());
        assert!(!LoraixError::provider("bad payload").is_retryable());
        assert!(!LoraixError::other("boom").is_retryable());
    }

    #[test]
    fn test_timeout_flags() {
        let err = LoraixError::timeout(250);
        assert!(err.is_timeout());
        assert!(!err.is_network());
        assert_eq!(err.to_string(), "Timed out after 250ms");
    }
}
