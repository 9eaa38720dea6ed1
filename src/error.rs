//! Error taxonomy shared by every engine component

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Every failing operation leaves the state it was given untouched, so callers
/// can keep using their last snapshot after any of these.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Preconditions of the operation were not met (e.g. a freeze is already armed)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A lesson or badge id that is not part of the static catalog
    #[error("unknown {kind}: {id}")]
    UnknownEntity { kind: &'static str, id: String },

    /// Local persistence could not be read or written
    #[error("storage failure for key '{key}': {message}")]
    StorageFailure { key: String, message: String },

    /// Remote reconciliation failed; local state stays authoritative
    #[error("sync failure: {0}")]
    SyncFailure(String),
}

impl EngineError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn unknown_lesson(id: impl Into<String>) -> Self {
        Self::UnknownEntity {
            kind: "lesson",
            id: id.into(),
        }
    }

    pub fn unknown_badge(id: impl Into<String>) -> Self {
        Self::UnknownEntity {
            kind: "badge",
            id: id.into(),
        }
    }

    /// Wrap an adapter error (usually `anyhow` with context) as a storage failure
    pub fn storage(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::StorageFailure {
            key: key.into(),
            message: format!("{:#}", err),
        }
    }

    pub fn sync(err: impl std::fmt::Display) -> Self {
        Self::SyncFailure(format!("{:#}", err))
    }

    /// Whether retrying the same call later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailure { .. } | Self::SyncFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("Failed to write userProgress");
        let wrapped = EngineError::storage("userProgress", err);
        let text = wrapped.to_string();
        assert!(text.contains("userProgress"));
        assert!(text.contains("disk full"));
        assert!(wrapped.is_retryable());
    }

    #[test]
    fn test_unknown_entity_not_retryable() {
        let err = EngineError::unknown_lesson("es-99");
        assert_eq!(err.to_string(), "unknown lesson: es-99");
        assert!(!err.is_retryable());
    }
}
