use std::{sync::Arc, time::Duration};

use graphbus_error::BrokerResult;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{
    actor::{SubscriptionActor, SubscriptionCommand},
    NotifyOutcome, SubscriptionSnapshot, SubscriptionState, SubscriptionStatus,
};
use crate::{
    actor::{persist, ActorContext, Mailbox},
    application::state_port::subscription_key,
    lease::LeaseKey,
    model::{CommunicationMetrics, EventMessage, Indexes, SubscriptionId, SubscriptionMetadata},
    observer::{Observer, OneshotObserver},
};

/// Адрес актора подписки.
///
/// Дешёво клонируется. Изменяющие вызовы идут через очередь актора, чтение
/// (`metadata`, `metrics`, `id`, `queue_len`) берёт последний опубликованный
/// снимок и не ждёт хода.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    mailbox: Mailbox<SubscriptionCommand>,
    snapshot: watch::Receiver<Arc<SubscriptionSnapshot>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SubscriptionHandle {
    /// Восстанавливает состояние из хранилища (если есть) и запускает актора.
    pub async fn activate(
        id: SubscriptionId,
        ctx: &ActorContext,
    ) -> Self {
        let key = subscription_key(id.as_str());
        let state = match persist::restore::<SubscriptionState>(ctx.store.as_ref(), &key).await {
            Some(state) if state.id == id => state,
            _ => SubscriptionState::new(id),
        };
        Self::spawn(state, ctx.clone())
    }

    pub(crate) fn spawn(
        state: SubscriptionState,
        ctx: ActorContext,
    ) -> Self {
        let id = state.id.clone();
        let (mailbox, rx) = Mailbox::channel(id.as_str(), ctx.config.mailbox_capacity);
        let (tx, snapshot) = watch::channel(Arc::new(state.snapshot()));
        let actor = SubscriptionActor::new(state, ctx, tx, mailbox.downgrade());
        tokio::spawn(actor.run(rx));
        Self {
            id,
            mailbox,
            snapshot,
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn snapshot(&self) -> Arc<SubscriptionSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn metadata(&self) -> Option<SubscriptionMetadata> {
        self.snapshot.borrow().metadata.clone()
    }

    pub fn metrics(&self) -> CommunicationMetrics {
        self.snapshot.borrow().metrics.clone()
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.snapshot.borrow().status
    }

    pub fn queue_len(&self) -> usize {
        self.snapshot.borrow().queue_len
    }

    pub fn is_stopped(&self) -> bool {
        self.mailbox.is_closed()
    }

    pub async fn upsert_metadata(
        &self,
        metadata: SubscriptionMetadata,
    ) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| SubscriptionCommand::UpsertMetadata { metadata, reply })
            .await
    }

    /// Доставляет событие подписке. Сбои наблюдателей не превращаются в
    /// ошибку: их видно в `NotifyOutcome` и в метриках.
    pub async fn notify(
        &self,
        message: EventMessage,
        indexes: Option<Indexes>,
    ) -> BrokerResult<NotifyOutcome> {
        self.mailbox
            .call(|reply| SubscriptionCommand::Notify {
                message,
                indexes,
                reply,
            })
            .await
    }

    pub async fn add_observer(
        &self,
        observer: Observer,
        ttl: Duration,
    ) -> BrokerResult<LeaseKey> {
        self.mailbox
            .call(|reply| SubscriptionCommand::AddObserver {
                observer,
                ttl,
                reply,
            })
            .await
    }

    pub async fn remove_observer(
        &self,
        key: LeaseKey,
    ) -> BrokerResult<bool> {
        self.mailbox
            .call(|reply| SubscriptionCommand::RemoveObserver { key, reply })
            .await
    }

    /// `false`, если аренда неизвестна или уже истекла.
    pub async fn renew_observer_lease(
        &self,
        key: LeaseKey,
        ttl: Duration,
    ) -> BrokerResult<bool> {
        self.mailbox
            .call(|reply| SubscriptionCommand::RenewLease { key, ttl, reply })
            .await
    }

    /// Забирает до `max` сообщений из durable-очереди.
    pub async fn take_queued(
        &self,
        max: usize,
    ) -> BrokerResult<Vec<EventMessage>> {
        self.mailbox
            .call(|reply| SubscriptionCommand::TakeQueued { max, reply })
            .await
    }

    /// Обнуляет метрики и очищает очередь. Метаданные и аренды остаются.
    pub async fn clear(&self) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| SubscriptionCommand::Clear { reply })
            .await
    }

    pub async fn purge_expired_leases(&self) -> BrokerResult<usize> {
        self.mailbox
            .call(|reply| SubscriptionCommand::PurgeLeases { reply })
            .await
    }

    /// Ждёт следующее событие не дольше `ttl`.
    ///
    /// Сообщение из очереди возвращается сразу. Иначе на время ожидания
    /// регистрируется временный наблюдатель; он снимается при любом исходе,
    /// включая отмену через `cancel`.
    pub async fn poll_next(
        &self,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> BrokerResult<Option<EventMessage>> {
        if let Some(message) = self.take_queued(1).await?.pop() {
            return Ok(Some(message));
        }

        let (observer, rx) = OneshotObserver::channel();
        let key = self
            .add_observer(Observer::message(observer), ttl)
            .await?;

        let received = tokio::select! {
            message = rx => message.ok(),
            _ = tokio::time::sleep(ttl) => None,
            _ = cancel.cancelled() => None,
        };

        self.remove_observer(key).await?;
        Ok(received)
    }

    /// Останавливает актора, сохранив состояние.
    pub(crate) async fn stop(&self) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| SubscriptionCommand::Stop { reply })
            .await
    }

    /// Останавливает актора и стирает сохранённое состояние.
    pub(crate) async fn deactivate(&self) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| SubscriptionCommand::Deactivate { reply })
            .await
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
