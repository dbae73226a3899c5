//! Error types for the tachyon evaluation client.
//!
//! Every error surfaced to a host carries a numeric status and a
//! human-readable message. Status `0` means no response was received.

use thiserror::Error;

/// Result type alias using tachyon's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Message for a 403 response.
pub const MSG_FORBIDDEN: &str = "You do not have permission to perform this action";

/// Message for a 404 response.
pub const MSG_NOT_FOUND: &str = "The requested resource was not found";

/// Message for a 429 response.
pub const MSG_RATE_LIMITED: &str = "Too many requests. Please try again later";

/// Message for a 500 response.
pub const MSG_INTERNAL: &str = "Internal server error. Please try again later";

/// Message when no response was received.
pub const MSG_NETWORK: &str = "Network error. Please check your connection";

/// Fallback when the server did not provide a message.
pub const MSG_UNEXPECTED: &str = "An unexpected error occurred";

/// Core error type for client operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The server rejected the credentials (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403).
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (404).
    #[error("{0}")]
    NotFound(String),

    /// Too many requests (429).
    #[error("{0}")]
    RateLimited(String),

    /// Server-side failure (5xx), reported after retries are exhausted.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// No response was received (connect failure, timeout, broken body).
    #[error("{0}")]
    Network(String),

    /// Any other non-success status.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        /// Raw error body when it was valid JSON.
        data: Option<serde_json::Value>,
    },

    /// The request succeeded but its result could not be used.
    #[error("{0}")]
    Operation(String),

    /// Rejected on the client before any request was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build the error for a non-success HTTP status.
    ///
    /// `server_message` is the `message` field of the response body, if any.
    pub fn from_status(
        status: u16,
        server_message: Option<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        let passthrough = || {
            server_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| MSG_UNEXPECTED.to_string())
        };
        match status {
            401 => Error::Unauthorized(passthrough()),
            403 => Error::Forbidden(MSG_FORBIDDEN.to_string()),
            404 => Error::NotFound(MSG_NOT_FOUND.to_string()),
            429 => Error::RateLimited(MSG_RATE_LIMITED.to_string()),
            500 => Error::Server {
                status,
                message: MSG_INTERNAL.to_string(),
            },
            501..=599 => Error::Server {
                status,
                message: passthrough(),
            },
            _ => Error::Http {
                status,
                message: passthrough(),
                data,
            },
        }
    }

    /// Connectivity failure with the standard message.
    pub fn network() -> Self {
        Error::Network(MSG_NETWORK.to_string())
    }

    /// Numeric status of this error. `0` denotes a connectivity failure.
    pub fn status(&self) -> u16 {
        match self {
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::RateLimited(_) => 429,
            Error::Server { status, .. } | Error::Http { status, .. } => *status,
            Error::Network(_) => 0,
            Error::Operation(_) | Error::Serialization(_) => 500,
            Error::InvalidInput(_) => 400,
        }
    }

    /// Human-readable message, without any prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Unauthorized(m)
            | Error::Forbidden(m)
            | Error::NotFound(m)
            | Error::RateLimited(m)
            | Error::Network(m)
            | Error::Operation(m)
            | Error::InvalidInput(m)
            | Error::Serialization(m) => m,
            Error::Server { message, .. } | Error::Http { message, .. } => message,
        }
    }

    /// Whether the request that produced this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Server { .. })
    }

    /// Whether the server rejected the request itself (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_messages_for_known_statuses() {
        let server_msg = Some("ignored".to_string());
        assert_eq!(
            Error::from_status(403, server_msg.clone(), None).message(),
            MSG_FORBIDDEN
        );
        assert_eq!(
            Error::from_status(404, server_msg.clone(), None).message(),
            MSG_NOT_FOUND
        );
        assert_eq!(
            Error::from_status(429, server_msg.clone(), None).message(),
            MSG_RATE_LIMITED
        );
        assert_eq!(
            Error::from_status(500, server_msg, None).message(),
            MSG_INTERNAL
        );
    }

    #[test]
    fn test_statuses_are_preserved() {
        for status in [401u16, 403, 404, 409, 422, 429, 500, 502, 503] {
            assert_eq!(Error::from_status(status, None, None).status(), status);
        }
    }

    #[test]
    fn test_other_status_passes_server_message_through() {
        let data = serde_json::json!({"message": "alias already taken"});
        let err = Error::from_status(409, Some("alias already taken".into()), Some(data.clone()));
        assert_eq!(err.message(), "alias already taken");
        match err {
            Error::Http { data: Some(d), .. } => assert_eq!(d, data),
            other => panic!("Expected Http error, got {:?}", other),
        }
    }

    #[test]
    fn test_other_status_without_message_uses_fallback() {
        let err = Error::from_status(418, None, None);
        assert_eq!(err.message(), MSG_UNEXPECTED);

        let blank = Error::from_status(400, Some("   ".into()), None);
        assert_eq!(blank.message(), MSG_UNEXPECTED);
    }

    #[test]
    fn test_503_keeps_server_message() {
        let err = Error::from_status(503, Some("maintenance".into()), None);
        assert_eq!(
            err,
            Error::Server {
                status: 503,
                message: "maintenance".into()
            }
        );
    }

    #[test]
    fn test_network_error_has_status_zero() {
        let err = Error::network();
        assert_eq!(err.status(), 0);
        assert_eq!(err.to_string(), MSG_NETWORK);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::network().is_retryable());
        assert!(Error::from_status(502, None, None).is_retryable());
        assert!(!Error::from_status(401, None, None).is_retryable());
        assert!(!Error::from_status(429, None, None).is_retryable());
        assert!(!Error::InvalidInput("x".into()).is_retryable());
    }

    #[test]
    fn test_client_error_classification() {
        for status in [400u16, 401, 404, 409, 429] {
            assert!(Error::from_status(status, None, None).is_client_error());
        }
        assert!(!Error::from_status(500, None, None).is_client_error());
        assert!(!Error::from_status(503, None, None).is_client_error());
        assert!(!Error::network().is_client_error());
        assert!(!Error::Operation("x".into()).is_client_error());
    }

    #[test]
    fn test_invalid_input_display() {
        let err = Error::InvalidInput("alias must not be empty".to_string());
        assert_eq!(err.to_string(), "Invalid input: alias must not be empty");
        assert_eq!(err.message(), "alias must not be empty");
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().contains("Serialization error:"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
