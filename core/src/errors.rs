use thiserror::Error;

/// Errors surfaced by the conversation client and its collaborators
#[derive(Error, Debug)]
pub enum SaverError {
    /// A local image could not be read or a URL reference is not usable
    #[error("Attachment Error: {0}")]
    Attachment(String),

    /// Missing or rejected API credential
    #[error("Auth Error: {0}")]
    Auth(String),

    /// The provider rejected the request or returned something unusable
    #[error("Provider Error{}: {message}", status_suffix(.status))]
    Provider { status: Option<u16>, message: String },

    /// Transport failure before a response was received
    #[error("Network Error: {0}")]
    Network(String),

    /// The turn carries no content or no model
    #[error("Invalid Turn: {0}")]
    InvalidTurn(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl SaverError {
    pub(crate) fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Whether resubmitting the same turn unchanged may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Provider { status, .. } => matches!(status, Some(429) | Some(500..=599)),
            _ => false,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({})", code)).unwrap_or_default()
}

/// Result type for conversation operations
pub type SaverResult<T> = Result<T, SaverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_display_includes_status() {
        let err = SaverError::provider(Some(404), "No response found");
        assert_eq!(err.to_string(), "Provider Error (404): No response found");

        let err = SaverError::provider(None, "empty id");
        assert_eq!(err.to_string(), "Provider Error: empty id");
    }

    #[test]
    fn test_transient_kinds() {
        assert!(SaverError::Network("reset".into()).is_transient());
        assert!(SaverError::provider(Some(429), "slow down").is_transient());
        assert!(SaverError::provider(Some(503), "busy").is_transient());
        assert!(!SaverError::provider(Some(400), "bad model").is_transient());
        assert!(!SaverError::Auth("bad key".into()).is_transient());
        assert!(!SaverError::Attachment("missing".into()).is_transient());
    }
}
