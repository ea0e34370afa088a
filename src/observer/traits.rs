use std::{fmt, sync::Arc};

use async_trait::async_trait;
use graphbus_error::DeliveryError;

use crate::{
    lease::ObserverKind,
    model::{CommunicationMetrics, EventMessage},
};

/// Получатель событий подписки.
#[async_trait]
pub trait MessageObserver: Send + Sync {
    async fn on_message(
        &self,
        message: &EventMessage,
    ) -> Result<(), DeliveryError>;
}

/// Получатель обновлённых метрик ресурса или подписки.
#[async_trait]
pub trait MetricObserver: Send + Sync {
    async fn on_metrics(
        &self,
        metrics: &CommunicationMetrics,
    ) -> Result<(), DeliveryError>;
}

/// Получатель сообщений о сбоях доставки.
#[async_trait]
pub trait ErrorObserver: Send + Sync {
    async fn on_error(
        &self,
        id: &str,
        error: &str,
    ) -> Result<(), DeliveryError>;
}

/// Ссылка на наблюдателя, хранимая в реестре аренды.
///
/// Реестр только записывает связь: живость наблюдателя не предполагается,
/// а сбой доставки не удаляет его.
#[derive(Clone)]
pub enum Observer {
    Message(Arc<dyn MessageObserver>),
    Metric(Arc<dyn MetricObserver>),
    Error(Arc<dyn ErrorObserver>),
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Observer {
    pub fn message(observer: impl MessageObserver + 'static) -> Self {
        Self::Message(Arc::new(observer))
    }

    pub fn metric(observer: impl MetricObserver + 'static) -> Self {
        Self::Metric(Arc::new(observer))
    }

    pub fn error(observer: impl ErrorObserver + 'static) -> Self {
        Self::Error(Arc::new(observer))
    }

    pub fn kind(&self) -> ObserverKind {
        match self {
            Self::Message(_) => ObserverKind::Message,
            Self::Metric(_) => ObserverKind::Metric,
            Self::Error(_) => ObserverKind::Error,
        }
    }

    pub fn as_message(&self) -> Option<&Arc<dyn MessageObserver>> {
        match self {
            Self::Message(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_metric(&self) -> Option<&Arc<dyn MetricObserver>> {
        match self {
            Self::Metric(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&Arc<dyn ErrorObserver>> {
        match self {
            Self::Error(o) => Some(o),
            _ => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Observer
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for Observer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("Observer").field(&self.kind()).finish()
    }
}
