//! Порт авторизации публикаций и подписок.
//!
//! Движок политик живёт снаружи; ядро только спрашивает решение перед
//! `publish` и `subscribe`.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{EventMetadata, ResourceId};

/// Утверждения о вызывающем, которые передаёт протокольный адаптер.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub identity: Option<String>,
    /// Пары `(тип, значение)`.
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Publish,
    Subscribe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn authorize(
        &self,
        claims: &Claims,
        resource: &ResourceId,
        operation: Operation,
        metadata: &EventMetadata,
    ) -> Decision;
}

/// Разрешает всё. Используется, когда политика не подключена.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Claims {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            values: Vec::new(),
        }
    }

    pub fn with_claim(
        mut self,
        claim_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.values.push((claim_type.into(), value.into()));
        self
    }

    /// Первое значение утверждения заданного типа.
    pub fn value(
        &self,
        claim_type: &str,
    ) -> Option<&str> {
        self.values
            .iter()
            .find(|(t, _)| t == claim_type)
            .map(|(_, v)| v.as_str())
    }
}

impl Decision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for Operation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Publish => f.write_str("publish"),
            Self::Subscribe => f.write_str("subscribe"),
        }
    }
}

#[async_trait]
impl AccessControl for AllowAll {
    async fn authorize(
        &self,
        _claims: &Claims,
        _resource: &ResourceId,
        _operation: Operation,
        _metadata: &EventMetadata,
    ) -> Decision {
        Decision::Allow
    }
}
