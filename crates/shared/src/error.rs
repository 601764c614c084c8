use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorCode {
    Unavailable,
    Rejected,
    Internal,
}

/// Failure reported by a record store. Cloneable so the commit worker can hand
/// the same error to every subscriber.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("batch rejected by record store: {0}")]
    Rejected(String),
    #[error("record store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn code(&self) -> StoreErrorCode {
        match self {
            Self::Unavailable(_) => StoreErrorCode::Unavailable,
            Self::Rejected(_) => StoreErrorCode::Rejected,
            Self::Internal(_) => StoreErrorCode::Internal,
        }
    }

    /// Whether retrying the same request later can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(StoreError::Unavailable("locked".into()).is_transient());
        assert!(!StoreError::Rejected("constraint".into()).is_transient());
        assert!(!StoreError::Internal("boom".into()).is_transient());
    }

    #[test]
    fn display_includes_context() {
        let err = StoreError::Rejected("UNIQUE constraint failed".into());
        assert_eq!(
            err.to_string(),
            "batch rejected by record store: UNIQUE constraint failed"
        );
        assert_eq!(err.code(), StoreErrorCode::Rejected);
    }
}
