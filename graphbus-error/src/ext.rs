use std::{any::Any, error::Error};

use crate::StatusCode;

/// Расширение для ошибок брокера (object-safe).
///
/// Даёт статус-код и безопасное для вызывающего сообщение, не зная
/// конкретного типа ошибки.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Статус для адаптера протокола.
    ///
    /// По умолчанию [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Возвращает ошибку как [`Any`] для downcast к конкретному типу.
    fn as_any(&self) -> &dyn Any;

    /// Сообщение, которое можно отдать вызывающему.
    ///
    /// Для внутренних ошибок детали скрываются.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal => "Internal broker error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, fmt};

    use super::*;

    #[derive(Debug)]
    struct Opaque;

    impl fmt::Display for Opaque {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "secret detail")
        }
    }

    impl Error for Opaque {}

    impl ErrorExt for Opaque {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Missing(&'static str);

    impl fmt::Display for Missing {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "missing: {}", self.0)
        }
    }

    impl Error for Missing {}

    impl ErrorExt for Missing {
        fn status_code(&self) -> StatusCode {
            StatusCode::NotFound
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Тест проверяет, что внутренние ошибки не раскрывают детали.
    #[test]
    fn test_client_message_hides_internal_details() {
        assert_eq!(Opaque.status_code(), StatusCode::Internal);
        assert_eq!(Opaque.client_message(), "Internal broker error");
    }

    #[test]
    fn test_client_message_passes_client_errors() {
        let e = Missing("res://a");
        assert_eq!(e.client_message(), "missing: res://a");
    }

    #[test]
    fn test_as_any_downcast() {
        let e = Missing("y");
        let down = e.as_any().downcast_ref::<Missing>();
        assert_eq!(down.map(|m| m.0), Some("y"));
    }
}
