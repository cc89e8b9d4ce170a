use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("{status} {error}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Http {
        status: u16,
        error: String,
        message: Option<String>,
        field: Option<String>,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),

    /// Rejected locally before any request was sent.
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// The `{error, message?, field?}` body every failed request carries.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: String,
    pub message: Option<String>,
    pub field: Option<String>,
}

impl ErrorEnvelope {
    pub(crate) fn into_error(self, status: u16) -> ClientError {
        ClientError::Http {
            status,
            error: self.error,
            message: self.message,
            field: self.field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = ErrorEnvelope {
            error: "Validation failed".to_string(),
            message: Some("name is required".to_string()),
            field: Some("name".to_string()),
        }
        .into_error(400);

        assert_eq!(err.to_string(), "400 Validation failed: name is required");
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_http_error_without_message() {
        let err = ClientError::Http {
            status: 404,
            error: "Not found".to_string(),
            message: None,
            field: None,
        };
        assert_eq!(err.to_string(), "404 Not found");
        assert!(err.is_not_found());
    }
}
