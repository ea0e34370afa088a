use serde::{Deserialize, Serialize};

use super::DurableQueue;
use crate::model::{CommunicationMetrics, SubscriptionId, SubscriptionMetadata};

/// Жизненный цикл подписки: `Created -> Active -> Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    #[default]
    Created,
    Active,
    /// Конечное состояние: актор остановлен.
    Removed,
}

/// Чем закончилась доставка одного события подписке.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Передано активным Message-наблюдателям.
    Delivered { observers: usize, failed: usize },
    /// Наблюдателей нет, событие сохранено в durable-очередь.
    Enqueued,
    /// Индексы события не прошли фильтры подписки.
    Filtered,
    /// Наблюдателей нет, очередь не включена.
    Dropped,
    /// Срок действия подписки истёк.
    Expired,
}

/// Сохраняемое состояние актора подписки. Аренды сюда не входят: они
/// не переживают перезапуск.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionState {
    pub id: SubscriptionId,
    pub status: SubscriptionStatus,
    pub metadata: Option<SubscriptionMetadata>,
    pub metrics: CommunicationMetrics,
    pub queue: DurableQueue,
}

/// Снимок для чтения без ожидания хода актора.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSnapshot {
    pub id: SubscriptionId,
    pub status: SubscriptionStatus,
    pub metadata: Option<SubscriptionMetadata>,
    pub metrics: CommunicationMetrics,
    pub queue_len: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl NotifyOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

impl SubscriptionState {
    pub fn new(id: SubscriptionId) -> Self {
        let metrics = CommunicationMetrics::new(id.as_str());
        Self {
            id,
            status: SubscriptionStatus::Created,
            metadata: None,
            metrics,
            queue: DurableQueue::new(),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|meta| meta.durable_messaging && !meta.is_ephemeral)
    }

    /// Эфемерные подписки не сохраняются и не попадают в каталог.
    pub fn is_ephemeral(&self) -> bool {
        self.metadata.as_ref().is_some_and(|meta| meta.is_ephemeral)
    }

    pub fn snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            id: self.id.clone(),
            status: self.status,
            metadata: self.metadata.clone(),
            metrics: self.metrics.clone(),
            queue_len: self.queue.len(),
        }
    }
}

impl SubscriptionSnapshot {
    pub fn identity(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.identity.as_deref())
    }
}
