use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки привязки к хранилищу состояния.
///
/// Не прерывают операцию в памяти: акторы логируют их и продолжают.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Failed to serialize state '{key}': {reason}")]
    Serialize { key: String, reason: String },

    #[error("Failed to deserialize state '{key}': {reason}")]
    Deserialize { key: String, reason: String },

    #[error("State store backend failure for '{key}': {reason}")]
    Backend { key: String, reason: String },
}

impl ErrorExt for StorageError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Serialize { .. } => StatusCode::SerializationFailed,
            Self::Deserialize { .. } => StatusCode::DeserializationFailed,
            Self::Backend { .. } => StatusCode::StorageUnavailable,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_codes() {
        let err = StorageError::Backend {
            key: "resource/res://a".to_string(),
            reason: "disk gone".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::StorageUnavailable);
        assert!(err.status_code().is_retryable());
        assert!(err.to_string().contains("resource/res://a"));
    }
}
