use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use crate::envelope::CorrelationId;

/// Failure classification for a dispatched command. Serialized with a
/// `code` tag so the frontend can match on it and pick the right toast.
///
/// Every variant except `Protocol` settles exactly one caller's request.
/// `Protocol` describes inbound traffic that could not be attributed to a
/// live request; it is logged and dropped, never handed to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error, TS)]
#[serde(tag = "code", content = "detail")]
#[ts(export)]
pub enum DispatchError {
    /// The channel failed to carry the request to the backend.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The backend ran the command and reported that it failed.
    #[error("{message}")]
    Backend { message: String },
    #[error("request {id} timed out after {after_ms} ms")]
    Timeout { id: CorrelationId, after_ms: u64 },
    #[error("request cancelled: {reason}")]
    Cancelled { reason: String },
    #[error("protocol error: {message}")]
    Protocol { message: String },
    /// Raised while building an envelope; nothing was sent.
    #[error("invalid command envelope: {message}")]
    InvalidEnvelope { message: String },
}

/// Discriminant of [`DispatchError`], carried by outcomes and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ErrorKind {
    Transport,
    Backend,
    Timeout,
    Cancelled,
    Protocol,
    InvalidEnvelope,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Backend => "backend",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Protocol => "protocol",
            Self::InvalidEnvelope => "invalid_envelope",
        }
    }
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Backend { .. } => ErrorKind::Backend,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::InvalidEnvelope { .. } => ErrorKind::InvalidEnvelope,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn invalid_envelope(message: impl Into<String>) -> Self {
        Self::InvalidEnvelope {
            message: message.into(),
        }
    }
}

/// Errors raised while loading or saving the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_code_and_detail() {
        let err = DispatchError::Backend {
            message: "device busy".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "Backend");
        assert_eq!(json["detail"]["message"], "device busy");
    }

    #[test]
    fn backend_display_is_the_raw_message() {
        let err = DispatchError::Backend {
            message: "device busy".to_string(),
        };
        assert_eq!(err.to_string(), "device busy");
    }

    #[test]
    fn timeout_display_names_the_request() {
        let err = DispatchError::Timeout {
            id: CorrelationId(7),
            after_ms: 1000,
        };
        assert_eq!(err.to_string(), "request #7 timed out after 1000 ms");
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn kind_labels_are_snake_case() {
        assert_eq!(
            serde_json::to_value(ErrorKind::InvalidEnvelope).unwrap(),
            serde_json::json!("invalid_envelope")
        );
        assert_eq!(ErrorKind::InvalidEnvelope.label(), "invalid_envelope");
    }
}
