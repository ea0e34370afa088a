use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Конфигурация ресурса. Меняется только самим ресурсом через
/// `upsert_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub resource_uri: String,
    pub enabled: bool,
    pub audit: bool,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_subscription_duration: Option<Duration>,
    #[serde(default)]
    pub publish_policy_uri: Option<String>,
    #[serde(default)]
    pub subscribe_policy_uri: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub discovery_url: Option<String>,
    pub require_encrypted_channel: bool,
}

/// Конфигурация подписки.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionMetadata {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub notify_address: Option<String>,
    #[serde(default)]
    pub symmetric_key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Время жизни сообщений в durable-очереди.
    #[serde(default)]
    pub ttl: Option<Duration>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    /// Сколько сообщений из очереди отдавать за один проход.
    #[serde(default)]
    pub spool_rate: Option<u32>,
    pub durable_messaging: bool,
    pub is_ephemeral: bool,
    /// Фильтры индексов `(ключ, значение)`.
    #[serde(default)]
    pub indexes: Vec<(String, String)>,
    #[serde(default)]
    pub claim_key: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl EventMetadata {
    pub fn new(resource_uri: impl Into<String>) -> Self {
        Self {
            resource_uri: resource_uri.into(),
            enabled: true,
            audit: false,
            expires: None,
            max_subscription_duration: None,
            publish_policy_uri: None,
            subscribe_policy_uri: None,
            description: None,
            discovery_url: None,
            require_encrypted_channel: false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|at| at <= Utc::now())
    }
}

impl SubscriptionMetadata {
    /// Долговременная подписка с идентичностью владельца.
    pub fn durable(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            durable_messaging: true,
            ..Self::default()
        }
    }

    /// Подписка без идентичности и очереди, на один цикл long-poll.
    pub fn ephemeral() -> Self {
        Self {
            is_ephemeral: true,
            ..Self::default()
        }
    }

    pub fn with_identity(
        mut self,
        identity: impl Into<String>,
    ) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_index(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.indexes.push((key.into(), value.into()));
        self
    }

    pub fn with_spool_rate(
        mut self,
        rate: u32,
    ) -> Self {
        self.spool_rate = Some(rate);
        self
    }

    pub fn with_ttl(
        mut self,
        ttl: Duration,
    ) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|at| at <= Utc::now())
    }
}
