//! Error types for the conversation engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {

    // =============================
    // Upstream Service Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Session store error: {0}")]
    SessionError(String),

    #[error("Messaging error: {0}")]
    MessagingError(String),

    // =============================
    // Engine Errors
    // =============================

    #[error("Invalid dialogue state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification of a failed turn, used to pick the apology sent
/// back to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    ServiceUnavailable,
    Generic,
}

impl FailureKind {
    pub fn apology(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => {
                "⏳ *Calma lá!* Você está usando o assistente muito rápido.\nAguarde alguns instantes 🙂"
            }
            FailureKind::ServiceUnavailable => {
                "🤖 *IA temporariamente indisponível.*\nTente novamente em instantes."
            }
            FailureKind::Generic => {
                "❌ Ocorreu um erro inesperado.\nTente novamente mais tarde."
            }
        }
    }
}

impl EngineError {
    /// Classify by variant first, then by message heuristics for errors that
    /// arrive wrapped as plain strings.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            EngineError::RateLimited(_) => return FailureKind::RateLimited,
            EngineError::ServiceUnavailable(_) | EngineError::LlmError(_) => {
                return FailureKind::ServiceUnavailable
            }
            EngineError::HttpError(e) => {
                if e.status().map(|s| s.as_u16()) == Some(429) {
                    return FailureKind::RateLimited;
                }
                return FailureKind::ServiceUnavailable;
            }
            _ => {}
        }

        let message = self.to_string();
        let lowered = message.to_lowercase();

        if message.contains("429") || lowered.contains("too many requests") {
            FailureKind::RateLimited
        } else if lowered.contains("api key")
            || lowered.contains("gemini")
            || message.contains("500")
            || message.contains("503")
        {
            FailureKind::ServiceUnavailable
        } else {
            FailureKind::Generic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_classification() {
        assert_eq!(
            EngineError::RateLimited("quota".into()).failure_kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            EngineError::LlmError("bad candidate".into()).failure_kind(),
            FailureKind::ServiceUnavailable
        );
        assert_eq!(
            EngineError::DatabaseError("connection refused".into()).failure_kind(),
            FailureKind::Generic
        );
    }

    #[test]
    fn test_message_heuristics() {
        assert_eq!(
            EngineError::Unknown("upstream said 429".into()).failure_kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            EngineError::Unknown("missing API key".into()).failure_kind(),
            FailureKind::ServiceUnavailable
        );
        assert_eq!(
            EngineError::Unknown("status 503".into()).failure_kind(),
            FailureKind::ServiceUnavailable
        );
    }

    #[test]
    fn test_apologies_are_distinct() {
        let a = FailureKind::RateLimited.apology();
        let b = FailureKind::ServiceUnavailable.apology();
        let c = FailureKind::Generic.apology();
        assert_ne!(a, b);
        assert_ne!(b, c);
    }
}
