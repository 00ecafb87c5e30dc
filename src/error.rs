//! Error types for the conversation pipeline.

/// Top-level error type for the companion core.
#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    /// Input rejected before any side effect (blank text, busy session).
    #[error("validation error: {0}")]
    Validation(String),

    /// A remote collaborator could not be reached (network failure, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The collaborator rejected our credentials.
    #[error("auth error: {0}")]
    Auth(String),

    /// Structured error returned by the remote service itself.
    #[error("provider error: {message}")]
    Provider {
        /// Human-readable message from the provider.
        message: String,
        /// Provider-assigned error type, when present.
        kind: Option<String>,
        /// Provider-assigned error code, when present.
        code: Option<String>,
    },

    /// Speech synthesis failed to produce or play audio.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Conversation store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error between session collaborators.
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<rusqlite::Error> for CompanionError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CompanionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_display_uses_message() {
        let err = CompanionError::Provider {
            message: "model overloaded".into(),
            kind: Some("server_error".into()),
            code: None,
        };
        assert_eq!(format!("{err}"), "provider error: model overloaded");
    }

    #[test]
    fn sqlite_errors_become_storage() {
        let err = CompanionError::from(rusqlite::Error::InvalidQuery);
        assert!(matches!(err, CompanionError::Storage(_)));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompanionError>();
    }
}
