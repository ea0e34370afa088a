use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{CommunicationMetrics, EventMetadata, ResourceId, SubscriptionId};

/// Сохраняемое состояние ресурса.
///
/// Подписчики хранятся как связь `id -> identity`: сами подписки живут
/// отдельно, ресурс только знает, кому рассылать.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: ResourceId,
    pub metadata: Option<EventMetadata>,
    pub metrics: CommunicationMetrics,
    #[serde(default)]
    pub subscriptions: BTreeMap<SubscriptionId, Option<String>>,
}

/// Снимок для чтения без ожидания хода актора.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    pub id: ResourceId,
    pub metadata: Option<EventMetadata>,
    pub metrics: CommunicationMetrics,
    pub subscriptions: Vec<SubscriptionId>,
}

/// Итог одной публикации по всем подписчикам.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub message_id: String,
    pub subscribers: usize,
    pub delivered: usize,
    pub enqueued: usize,
    pub filtered: usize,
    /// Не доставлено и не сохранено: нет наблюдателей или подписка истекла.
    pub dropped: usize,
    /// Подписчик не ответил, упал или не уложился в таймаут.
    pub failed: usize,
}

impl ResourceState {
    pub fn new(id: ResourceId) -> Self {
        let metrics = CommunicationMetrics::new(id.as_str());
        Self {
            id,
            metadata: None,
            metrics,
            subscriptions: BTreeMap::new(),
        }
    }

    /// Публикация принимается, пока ресурс не выключен и не истёк.
    /// Ресурс без метаданных открыт.
    pub fn accepts_publish(&self) -> bool {
        self.metadata
            .as_ref()
            .is_none_or(|meta| meta.enabled && !meta.is_expired())
    }

    pub fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            id: self.id.clone(),
            metadata: self.metadata.clone(),
            metrics: self.metrics.clone(),
            subscriptions: self.subscriptions.keys().cloned().collect(),
        }
    }
}
