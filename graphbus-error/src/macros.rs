/// Немедленно возвращает ошибку из функции, возвращающей
/// `Result<_, StackError>`.
///
/// - `bail!(err)` — готовая ошибка, приводимая к `StackError`;
/// - `bail!(code, "msg")` — `GenericError` с кодом и сообщением;
/// - `bail!(code, "fmt {}", arg)` — то же с форматированием.
///
/// ```ignore
/// use graphbus_error::{bail, StatusCode};
///
/// fn check_uri(uri: &str) -> graphbus_error::GraphResult<()> {
///     if uri.is_empty() {
///         bail!(StatusCode::InvalidUri, "Resource uri cannot be empty");
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $msg:expr) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, $msg)
        ))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, format!($fmt, $($arg)*))
        ))
    };
}

/// Расширение `Result` для приклеивания контекста.
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;

    /// Ленивый контекст: замыкание вызывается только при ошибке.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<crate::StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.into().context(ctx))
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrokerError, GenericError, GraphResult, StatusCode};

    #[test]
    fn test_bail_with_format() {
        fn check(ordinal: u32) -> GraphResult<()> {
            bail!(StatusCode::NotFound, "Shard {} not found", ordinal);
        }

        let err = check(7).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NotFound);
        assert!(err.to_string().contains("Shard 7"));
    }

    #[test]
    fn test_result_ext_context() {
        fn inner() -> Result<(), BrokerError> {
            Err(BrokerError::ActorUnavailable {
                address: "catalog/0".to_string(),
            })
        }

        fn outer() -> GraphResult<()> {
            inner().context("catalog scatter")?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.contexts().len(), 1);
        assert_eq!(err.contexts()[0].message, "catalog scatter");
    }

    #[test]
    fn test_with_context_is_lazy() {
        let mut called = false;
        let ok: Result<(), GenericError> = Ok(());
        ok.with_context(|| {
            called = true;
            "never"
        })
        .unwrap();
        assert!(!called);
    }
}
