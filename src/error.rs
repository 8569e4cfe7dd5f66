use thiserror::Error;

/// Custom error types for the interview server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Template and question resolution errors
    #[error("No interview template found for {0}")]
    TemplateNotFound(String),

    #[error("Question {index} not found in template (template has {total} questions)")]
    QuestionOutOfRange { index: usize, total: usize },

    /// External scorer errors, recovered by the keyword fallback
    #[error("AI scorer unavailable: {0}")]
    ScorerUnavailable(String),

    /// Store errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Protocol errors
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using ServerError
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        ServerError::Internal(msg.into())
    }

    /// Helper to create Persistence errors
    pub fn persistence(msg: impl Into<String>) -> Self {
        ServerError::Persistence(msg.into())
    }

    /// Helper to create InvalidPayload errors
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        ServerError::InvalidPayload(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::TemplateNotFound("room-42".to_string());
        assert_eq!(err.to_string(), "No interview template found for room-42");

        let err = ServerError::QuestionOutOfRange { index: 5, total: 3 };
        assert_eq!(
            err.to_string(),
            "Question 5 not found in template (template has 3 questions)"
        );
    }

    #[test]
    fn test_error_helpers() {
        let err = ServerError::internal("Something went wrong");
        assert!(matches!(err, ServerError::Internal(_)));

        let err = ServerError::persistence("write failed");
        assert!(matches!(err, ServerError::Persistence(_)));
    }
}
