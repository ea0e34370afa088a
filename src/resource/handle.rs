use std::{collections::HashMap, sync::Arc, time::Duration};

use graphbus_error::BrokerResult;
use tokio::sync::watch;

use super::{
    actor::{ResourceActor, ResourceCommand},
    PublishReport, ResourceSnapshot, ResourceState,
};
use crate::{
    actor::{persist, ActorContext, Mailbox},
    application::{state_port::resource_key, Claims},
    lease::LeaseKey,
    model::{CommunicationMetrics, EventMessage, EventMetadata, Indexes, ResourceId, SubscriptionId},
    observer::Observer,
    subscription::{SubscriptionDirectory, SubscriptionHandle},
};

/// Адрес актора ресурса.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    id: ResourceId,
    mailbox: Mailbox<ResourceCommand>,
    snapshot: watch::Receiver<Arc<ResourceSnapshot>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ResourceHandle {
    /// Восстанавливает ресурс и заново связывает его с подписками,
    /// активируя их через каталог подписок.
    pub async fn activate(
        id: ResourceId,
        directory: &SubscriptionDirectory,
    ) -> Self {
        let ctx = directory.context().clone();
        let key = resource_key(id.as_str());
        let state = match persist::restore::<ResourceState>(ctx.store.as_ref(), &key).await {
            Some(state) if state.id == id => state,
            _ => ResourceState::new(id),
        };

        let mut subscribers = HashMap::with_capacity(state.subscriptions.len());
        for sub_id in state.subscriptions.keys() {
            let handle = directory.get_or_activate(sub_id).await;
            subscribers.insert(sub_id.clone(), handle);
        }

        Self::spawn(state, subscribers, ctx)
    }

    fn spawn(
        state: ResourceState,
        subscribers: HashMap<SubscriptionId, SubscriptionHandle>,
        ctx: ActorContext,
    ) -> Self {
        let id = state.id.clone();
        let (mailbox, rx) = Mailbox::channel(id.as_str(), ctx.config.mailbox_capacity);
        let (tx, snapshot) = watch::channel(Arc::new(state.snapshot()));
        tokio::spawn(ResourceActor::new(state, subscribers, ctx, tx).run(rx));
        Self {
            id,
            mailbox,
            snapshot,
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn snapshot(&self) -> Arc<ResourceSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn metadata(&self) -> Option<EventMetadata> {
        self.snapshot.borrow().metadata.clone()
    }

    pub fn metrics(&self) -> CommunicationMetrics {
        self.snapshot.borrow().metrics.clone()
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionId> {
        self.snapshot.borrow().subscriptions.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Публикует событие. Ошибкой возвращается только отказ в доступе;
    /// сбои подписчиков видны в отчёте.
    pub async fn publish(
        &self,
        claims: Claims,
        message: EventMessage,
        indexes: Option<Indexes>,
    ) -> BrokerResult<PublishReport> {
        self.mailbox
            .call(|reply| ResourceCommand::Publish {
                claims,
                message,
                indexes,
                reply,
            })
            .await?
    }

    /// `true`, если подписка добавлена впервые.
    pub async fn subscribe(
        &self,
        claims: Claims,
        subscription: SubscriptionHandle,
    ) -> BrokerResult<bool> {
        self.mailbox
            .call(|reply| ResourceCommand::Subscribe {
                claims,
                subscription,
                reply,
            })
            .await?
    }

    pub async fn unsubscribe(
        &self,
        id: SubscriptionId,
        identity: Option<String>,
    ) -> BrokerResult<bool> {
        self.mailbox
            .call(|reply| ResourceCommand::Unsubscribe {
                id,
                identity,
                reply,
            })
            .await
    }

    /// Только Metric и Error наблюдатели, Message даёт `InvalidInput`.
    pub async fn add_observer(
        &self,
        observer: Observer,
        ttl: Duration,
    ) -> BrokerResult<LeaseKey> {
        self.mailbox
            .call(|reply| ResourceCommand::AddObserver {
                observer,
                ttl,
                reply,
            })
            .await?
    }

    pub async fn remove_observer(
        &self,
        key: LeaseKey,
    ) -> BrokerResult<bool> {
        self.mailbox
            .call(|reply| ResourceCommand::RemoveObserver { key, reply })
            .await
    }

    pub async fn renew_observer_lease(
        &self,
        key: LeaseKey,
        ttl: Duration,
    ) -> BrokerResult<bool> {
        self.mailbox
            .call(|reply| ResourceCommand::RenewLease { key, ttl, reply })
            .await
    }

    pub async fn upsert_metadata(
        &self,
        metadata: EventMetadata,
    ) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| ResourceCommand::UpsertMetadata { metadata, reply })
            .await
    }

    /// Сбрасывает подписчиков, метрики и метаданные.
    pub async fn clear(&self) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| ResourceCommand::Clear { reply })
            .await
    }

    pub async fn purge_expired_leases(&self) -> BrokerResult<usize> {
        self.mailbox
            .call(|reply| ResourceCommand::PurgeLeases { reply })
            .await
    }

    pub(crate) async fn stop(&self) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| ResourceCommand::Stop { reply })
            .await
    }

    pub(crate) async fn deactivate(&self) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| ResourceCommand::Deactivate { reply })
            .await
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
