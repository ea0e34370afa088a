use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки, которые ядро брокера возвращает вызывающему.
///
/// Всё остальное (сбой доставки, сбой хранилища, неизвестная аренда)
/// поглощается на границе, где произошло, и превращается в `false` или
/// запись в логе.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Политика доступа отклонила вызов.
    #[error("Access to '{resource}' denied for {operation}: {reason}")]
    AuthorizationDenied {
        resource: String,
        operation: String,
        reason: String,
    },

    /// Некорректные входные данные (uri, фильтр, индексы, размер страницы).
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Почтовый ящик актора закрыт, актор остановлен.
    #[error("Actor '{address}' is unavailable")]
    ActorUnavailable { address: String },

    /// Вызов актора не уложился в отведённое время.
    #[error("Call to '{address}' timed out after {millis} ms")]
    Timeout { address: String, millis: u64 },
}

pub type BrokerResult<T> = Result<T, BrokerError>;

impl BrokerError {
    pub fn invalid(
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(address: impl Into<String>) -> Self {
        Self::ActorUnavailable {
            address: address.into(),
        }
    }

    /// `true` для ошибок, которые адаптер обязан показать клиенту.
    pub fn is_surfaced(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationDenied { .. } | Self::InvalidInput { .. }
        )
    }
}

impl ErrorExt for BrokerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthorizationDenied { .. } => StatusCode::PermissionDenied,
            Self::InvalidInput { .. } => StatusCode::InvalidArgs,
            Self::ActorUnavailable { .. } => StatusCode::ActorUnavailable,
            Self::Timeout { .. } => StatusCode::Timeout,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::AuthorizationDenied { reason, .. } => format!("Access denied: {reason}"),
            Self::InvalidInput { .. } => self.to_string(),
            Self::ActorUnavailable { .. } => "Service temporarily unavailable".to_string(),
            Self::Timeout { .. } => "Operation timeout".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_denied_is_surfaced() {
        let err = BrokerError::AuthorizationDenied {
            resource: "res://a".to_string(),
            operation: "subscribe".to_string(),
            reason: "missing role".to_string(),
        };
        assert!(err.is_surfaced());
        assert_eq!(err.status_code(), StatusCode::PermissionDenied);
        assert_eq!(err.client_message(), "Access denied: missing role");
    }

    #[test]
    fn test_runtime_errors_are_not_surfaced() {
        let err = BrokerError::unavailable("sub://x");
        assert!(!err.is_surfaced());
        assert_eq!(err.client_message(), "Service temporarily unavailable");
        assert!(err.status_code().is_retryable());
    }

    #[test]
    fn test_invalid_input_message() {
        let err = BrokerError::invalid("quantity", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid quantity: must be greater than zero"
        );
    }
}
