use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибка доставки одному наблюдателю или подписчику.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Наблюдатель вернул ошибку.
    #[error("Observer failed: {reason}")]
    ObserverFailed { reason: String },

    /// Принимающая сторона больше не слушает.
    #[error("Observer channel closed")]
    Closed,
}

impl DeliveryError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ObserverFailed {
            reason: reason.into(),
        }
    }
}

impl ErrorExt for DeliveryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ObserverFailed { .. } => StatusCode::DeliveryFailed,
            Self::Closed => StatusCode::ObserverClosed,
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
    fn test_delivery_error_codes() {
        assert_eq!(DeliveryError::failed("boom").status_code(), StatusCode::DeliveryFailed);
        assert_eq!(DeliveryError::Closed.status_code(), StatusCode::ObserverClosed);
        assert_eq!(
            DeliveryError::failed("boom").to_string(),
            "Observer failed: boom"
        );
    }
}
