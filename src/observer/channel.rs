use async_trait::async_trait;
use graphbus_error::DeliveryError;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::{ErrorObserver, MessageObserver, MetricObserver};
use crate::model::{CommunicationMetrics, EventMessage};

/// Событие, которое `ChannelObserver` кладёт в канал.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    Message(EventMessage),
    Metrics(CommunicationMetrics),
    Error { id: String, error: String },
}

/// Наблюдатель поверх `mpsc::Sender`.
///
/// Не ждёт получателя: переполненный канал считается сбоем доставки, закрытый
/// канал даёт `DeliveryError::Closed`.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<ObserverEvent>,
}

/// Наблюдатель на одно сообщение, для long-poll.
#[derive(Debug)]
pub struct OneshotObserver {
    tx: Mutex<Option<oneshot::Sender<EventMessage>>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<ObserverEvent>) -> Self {
        Self { tx }
    }

    /// Создаёт наблюдателя вместе с приёмником заданной ёмкости.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ObserverEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn push(
        &self,
        event: ObserverEvent,
    ) -> Result<(), DeliveryError> {
        self.tx.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::failed("observer channel is full"),
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

impl OneshotObserver {
    pub fn channel() -> (Self, oneshot::Receiver<EventMessage>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для ChannelObserver
////////////////////////////////////////////////////////////////////////////////

#[async_trait]
impl MessageObserver for ChannelObserver {
    async fn on_message(
        &self,
        message: &EventMessage,
    ) -> Result<(), DeliveryError> {
        self.push(ObserverEvent::Message(message.clone()))
    }
}

#[async_trait]
impl MetricObserver for ChannelObserver {
    async fn on_metrics(
        &self,
        metrics: &CommunicationMetrics,
    ) -> Result<(), DeliveryError> {
        self.push(ObserverEvent::Metrics(metrics.clone()))
    }
}

#[async_trait]
impl ErrorObserver for ChannelObserver {
    async fn on_error(
        &self,
        id: &str,
        error: &str,
    ) -> Result<(), DeliveryError> {
        self.push(ObserverEvent::Error {
            id: id.to_string(),
            error: error.to_string(),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для OneshotObserver
////////////////////////////////////////////////////////////////////////////////

#[async_trait]
impl MessageObserver for OneshotObserver {
    async fn on_message(
        &self,
        message: &EventMessage,
    ) -> Result<(), DeliveryError> {
        let tx = self.tx.lock().take().ok_or(DeliveryError::Closed)?;
        tx.send(message.clone()).map_err(|_| DeliveryError::Closed)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> EventMessage {
        EventMessage::builder("res://a").payload("x").build()
    }

    #[tokio::test]
    async fn test_channel_observer_forwards_all_kinds() {
        let (obs, mut rx) = ChannelObserver::channel(8);
        let m = msg();

        obs.on_message(&m).await.unwrap();
        obs.on_metrics(&CommunicationMetrics::new("res://a"))
            .await
            .unwrap();
        obs.on_error("res://a", "boom").await.unwrap();

        assert_eq!(rx.recv().await, Some(ObserverEvent::Message(m)));
        assert!(matches!(rx.recv().await, Some(ObserverEvent::Metrics(_))));
        assert_eq!(
            rx.recv().await,
            Some(ObserverEvent::Error {
                id: "res://a".into(),
                error: "boom".into()
            })
        );
    }

    /// Тест проверяет, что переполненный и закрытый каналы дают разные
    /// ошибки.
    #[tokio::test]
    async fn test_channel_observer_full_and_closed() {
        let (obs, rx) = ChannelObserver::channel(1);
        obs.on_message(&msg()).await.unwrap();

        let err = obs.on_message(&msg()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::ObserverFailed { .. }));

        drop(rx);
        let err = obs.on_message(&msg()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Closed));
    }

    #[tokio::test]
    async fn test_oneshot_observer_takes_first_message_only() {
        let (obs, rx) = OneshotObserver::channel();
        let first = msg();

        obs.on_message(&first).await.unwrap();
        assert!(matches!(
            obs.on_message(&msg()).await,
            Err(DeliveryError::Closed)
        ));
        assert_eq!(rx.await.unwrap(), first);
    }
}
