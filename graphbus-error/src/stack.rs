use std::{fmt, panic::Location};

use crate::{ErrorExt, StatusCode};

/// Ошибка этапа запуска вместе с этапами, через которые она поднялась.
///
/// Горячий путь брокера живёт на `BrokerResult`; `StackError` нужен там,
/// где вызывающему важно, на каком шаге сборки всё сломалось: загрузка
/// настроек, проверка конфигурации, подъём менеджера графа.
pub struct StackError {
    root: Box<dyn ErrorExt>,
    stages: Vec<Stage>,
}

/// Этап, добавленный по пути наверх. Первый в списке ближе всех к причине.
#[derive(Debug, Clone)]
pub struct Stage {
    pub message: String,
    pub location: &'static Location<'static>,
}

impl StackError {
    #[track_caller]
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            root: Box::new(err),
            stages: Vec::new(),
        }
    }

    #[track_caller]
    pub fn context(
        mut self,
        msg: impl Into<String>,
    ) -> Self {
        self.stages.push(Stage {
            message: msg.into(),
            location: Location::caller(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.root.status_code()
    }

    pub fn contexts(&self) -> &[Stage] {
        &self.stages
    }

    pub fn downcast_ref<T: ErrorExt>(&self) -> Option<&T> {
        self.root.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let stages: Vec<String> = self
            .stages
            .iter()
            .map(|s| format!("{} at {}:{}", s.message, s.location.file(), s.location.line()))
            .collect();
        f.debug_struct("StackError")
            .field("code", &self.status_code())
            .field("root", &self.root.to_string())
            .field("stages", &stages)
            .finish()
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        // внешний этап первым
        for stage in self.stages.iter().rev() {
            write!(f, "{}: ", stage.message)?;
        }
        write!(f, "{}", self.root)
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.root.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    #[track_caller]
    fn from(e: E) -> Self {
        StackError::new(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BrokerError;

    /// Тест проверяет порядок этапов: в списке от причины наружу, в
    /// тексте ошибки снаружи внутрь.
    #[test]
    fn test_stages_order() {
        let err = StackError::new(BrokerError::invalid("quantity", "zero"))
            .context("validating broker config")
            .context("starting graph manager");

        assert_eq!(err.contexts()[0].message, "validating broker config");
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
        assert!(err
            .to_string()
            .starts_with("starting graph manager: validating broker config: Invalid quantity"));
        assert!(err.downcast_ref::<BrokerError>().is_some());
    }
}
