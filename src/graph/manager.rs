use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use graphbus_error::{BrokerError, BrokerResult, GraphResult, ResultExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{spawn_reconcile_task, CatalogReconciler, ReconcileReport, Reconciler};
use crate::{
    actor::ActorContext,
    application::{
        AccessControl, AllFiltersMatch, AllowAll, Claims, IndexMatchPolicy, StateStore,
    },
    catalog::{CatalogChain, ContinuationToken},
    config::BrokerConfig,
    engine::InMemoryStateStore,
    lease::{spawn_lease_sweep_task, LeaseKey, LeaseSweeper},
    model::{EventMessage, EventMetadata, Indexes, ResourceId, SubscriptionId, SubscriptionMetadata},
    observer::Observer,
    resource::{PublishReport, ResourceHandle},
    subscription::{NotifyOutcome, SubscriptionDirectory, SubscriptionHandle},
};

/// Фасад графа: находит акторов по идентификатору (поднимая их при первом
/// обращении) и держит каталог в согласии с ресурсами.
///
/// Создаётся один раз через [`GraphManager::builder`] и передаётся по
/// `Arc` всем, кому нужен. Фоновые задачи (очистка аренд, сверка) держат
/// только слабую ссылку.
pub struct GraphManager {
    ctx: ActorContext,
    catalog: CatalogChain,
    resources: DashMap<ResourceId, ResourceHandle>,
    subscriptions: SubscriptionDirectory,
    reconciler: Arc<dyn Reconciler>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Default)]
pub struct GraphManagerBuilder {
    store: Option<Arc<dyn StateStore>>,
    access: Option<Arc<dyn AccessControl>>,
    policy: Option<Arc<dyn IndexMatchPolicy>>,
    config: Option<BrokerConfig>,
    reconciler: Option<Arc<dyn Reconciler>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl GraphManager {
    pub fn builder() -> GraphManagerBuilder {
        GraphManagerBuilder::default()
    }

    pub fn context(&self) -> &ActorContext {
        &self.ctx
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.ctx.config
    }

    pub fn catalog(&self) -> &CatalogChain {
        &self.catalog
    }

    pub fn subscriptions(&self) -> &SubscriptionDirectory {
        &self.subscriptions
    }

    /// Живой актор ресурса без активации.
    pub fn live_resource(
        &self,
        id: &ResourceId,
    ) -> Option<ResourceHandle> {
        self.resources
            .get(id)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_stopped())
    }

    pub fn live_resources(&self) -> Vec<ResourceHandle> {
        self.resources
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_stopped())
            .collect()
    }

    /// Актор ресурса; поднимается из хранилища при первом обращении.
    pub async fn resource(
        &self,
        id: &ResourceId,
    ) -> ResourceHandle {
        if let Some(handle) = self.live_resource(id) {
            return handle;
        }
        let fresh = ResourceHandle::activate(id.clone(), &self.subscriptions).await;
        let mut entry = self
            .resources
            .entry(id.clone())
            .or_insert_with(|| fresh.clone());
        if entry.is_stopped() {
            *entry = fresh;
        }
        entry.value().clone()
    }

    pub async fn subscription(
        &self,
        id: &SubscriptionId,
    ) -> SubscriptionHandle {
        self.subscriptions.get_or_activate(id).await
    }

    /// Создаёт (или обновляет) ресурс и вносит его в каталог.
    ///
    /// Сначала актор, потом каталог: если второй шаг не удался, запись
    /// вернёт сверка.
    pub async fn create_resource(
        &self,
        metadata: EventMetadata,
    ) -> BrokerResult<ResourceHandle> {
        let id = ResourceId::parse(&metadata.resource_uri)?;
        let handle = self.resource(&id).await;
        handle.upsert_metadata(metadata).await?;

        if self.catalog.add(id.clone()).await? {
            info!(resource = %id, "Resource created");
        }
        Ok(handle)
    }

    /// Убирает ресурс из каталога, останавливает актора и стирает его
    /// состояние. Подписки живут дальше сами по себе.
    pub async fn remove_resource(
        &self,
        id: &ResourceId,
    ) -> BrokerResult<bool> {
        let removed = self.catalog.remove(id).await?;

        let handle = match self.resources.remove(id) {
            Some((_, handle)) if !handle.is_stopped() => handle,
            _ => ResourceHandle::activate(id.clone(), &self.subscriptions).await,
        };
        if let Err(err) = handle.deactivate().await {
            warn!(resource = %id, error = %err, "Resource actor already stopped");
        }

        if removed {
            info!(resource = %id, "Resource removed");
        }
        Ok(removed)
    }

    /// Сбрасывает состояние ресурса и убирает его из каталога. Актор
    /// остаётся живым, подписки не трогаются.
    pub async fn clear_resource(
        &self,
        id: &ResourceId,
    ) -> BrokerResult<bool> {
        self.resource(id).await.clear().await?;
        let removed = self.catalog.remove(id).await?;
        debug!(resource = %id, removed, "Resource cleared");
        Ok(removed)
    }

    pub async fn publish(
        &self,
        claims: Claims,
        resource: &ResourceId,
        message: EventMessage,
        indexes: Option<Indexes>,
    ) -> BrokerResult<PublishReport> {
        self.resource(resource)
            .await
            .publish(claims, message, indexes)
            .await
    }

    /// Создаёт подписку и связывает её с ресурсом.
    ///
    /// Ресурс должен быть в каталоге. Срок подписки урезается до
    /// `max_subscription_duration` ресурса. Если ресурс отказал в доступе,
    /// созданная подписка останавливается и забывается.
    pub async fn subscribe(
        &self,
        claims: Claims,
        resource: &ResourceId,
        mut metadata: SubscriptionMetadata,
    ) -> BrokerResult<SubscriptionId> {
        if !self.catalog.contains(resource) {
            return Err(BrokerError::invalid(
                "resource",
                format!("'{resource}' is not in the catalog"),
            ));
        }
        let res = self.resource(resource).await;

        let max = res
            .metadata()
            .and_then(|meta| meta.max_subscription_duration)
            .and_then(|max| chrono::Duration::from_std(max).ok());
        if let Some(max) = max {
            let cap = Utc::now() + max;
            metadata.expires = Some(metadata.expires.map_or(cap, |at| at.min(cap)));
        }

        let id = SubscriptionId::generate(resource);
        let sub = self.subscriptions.get_or_activate(&id).await;
        sub.upsert_metadata(metadata).await?;

        if let Err(err) = res.subscribe(claims, sub.clone()).await {
            self.subscriptions.remove(&id);
            if let Err(stop_err) = sub.deactivate().await {
                debug!(subscription = %id, error = %stop_err, "Rejected subscription already stopped");
            }
            return Err(err);
        }

        debug!(resource = %resource, subscription = %id, "Subscription created");
        Ok(id)
    }

    /// Отвязывает подписку и удаляет её. С `identity` действует только для
    /// владельца подписки.
    pub async fn unsubscribe(
        &self,
        resource: &ResourceId,
        subscription: &SubscriptionId,
        identity: Option<String>,
    ) -> BrokerResult<bool> {
        let removed = self
            .resource(resource)
            .await
            .unsubscribe(subscription.clone(), identity)
            .await?;
        if !removed {
            return Ok(false);
        }

        let sub = self.subscriptions.get_or_activate(subscription).await;
        self.subscriptions.remove(subscription);
        if let Err(err) = sub.deactivate().await {
            warn!(subscription = %subscription, error = %err, "Subscription actor already stopped");
        }
        Ok(true)
    }

    /// Прямая доставка в подписку, минуя ресурс.
    pub async fn notify(
        &self,
        subscription: &SubscriptionId,
        message: EventMessage,
        indexes: Option<Indexes>,
    ) -> BrokerResult<NotifyOutcome> {
        self.subscription(subscription)
            .await
            .notify(message, indexes)
            .await
    }

    pub fn list_catalog(
        &self,
        index: usize,
        page_size: usize,
        filter: Option<&str>,
    ) -> BrokerResult<ContinuationToken> {
        self.catalog.list(index, page_size, filter)
    }

    /// Страница после `token`. Обход с начала: [`ContinuationToken::start`].
    pub fn get_catalog(
        &self,
        token: &ContinuationToken,
    ) -> BrokerResult<ContinuationToken> {
        self.catalog.next_page(token)
    }

    pub async fn add_resource_observer(
        &self,
        resource: &ResourceId,
        observer: Observer,
        ttl: Duration,
    ) -> BrokerResult<LeaseKey> {
        self.resource(resource)
            .await
            .add_observer(observer, ttl)
            .await
    }

    pub async fn remove_resource_observer(
        &self,
        resource: &ResourceId,
        key: LeaseKey,
    ) -> BrokerResult<bool> {
        self.resource(resource).await.remove_observer(key).await
    }

    pub async fn renew_resource_observer_lease(
        &self,
        resource: &ResourceId,
        key: LeaseKey,
        ttl: Duration,
    ) -> BrokerResult<bool> {
        self.resource(resource)
            .await
            .renew_observer_lease(key, ttl)
            .await
    }

    pub async fn add_subscription_observer(
        &self,
        subscription: &SubscriptionId,
        observer: Observer,
        ttl: Duration,
    ) -> BrokerResult<LeaseKey> {
        self.subscription(subscription)
            .await
            .add_observer(observer, ttl)
            .await
    }

    pub async fn remove_subscription_observer(
        &self,
        subscription: &SubscriptionId,
        key: LeaseKey,
    ) -> BrokerResult<bool> {
        self.subscription(subscription)
            .await
            .remove_observer(key)
            .await
    }

    pub async fn renew_subscription_observer_lease(
        &self,
        subscription: &SubscriptionId,
        key: LeaseKey,
        ttl: Duration,
    ) -> BrokerResult<bool> {
        self.subscription(subscription)
            .await
            .renew_observer_lease(key, ttl)
            .await
    }

    /// Один проход сверки каталога подключённой стратегией.
    pub async fn reconcile(&self) -> ReconcileReport {
        let reconciler = self.reconciler.clone();
        reconciler.reconcile(self).await
    }

    /// Останавливает фоновые задачи и всех живых акторов, сохранив их
    /// состояние.
    pub async fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.abort();
        }

        let resources = self.live_resources();
        self.resources.clear();
        for handle in resources {
            if let Err(err) = handle.stop().await {
                debug!(resource = %handle.id(), error = %err, "Resource actor already stopped");
            }
        }
        for handle in self.subscriptions.drain() {
            if let Err(err) = handle.stop().await {
                debug!(subscription = %handle.id(), error = %err, "Subscription actor already stopped");
            }
        }
        self.catalog.shutdown().await;

        info!("Graph manager stopped");
    }
}

impl GraphManagerBuilder {
    pub fn store(
        mut self,
        store: impl StateStore + 'static,
    ) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn access(
        mut self,
        access: impl AccessControl + 'static,
    ) -> Self {
        self.access = Some(Arc::new(access));
        self
    }

    pub fn policy(
        mut self,
        policy: impl IndexMatchPolicy + 'static,
    ) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn config(
        mut self,
        config: BrokerConfig,
    ) -> Self {
        self.config = Some(config);
        self
    }

    pub fn reconciler(
        mut self,
        reconciler: impl Reconciler + 'static,
    ) -> Self {
        self.reconciler = Some(Arc::new(reconciler));
        self
    }

    /// Открывает каталог и запускает фоновые задачи. Ошибка несёт этап,
    /// на котором сборка остановилась.
    pub async fn build(self) -> GraphResult<Arc<GraphManager>> {
        let config = self.config.unwrap_or_default();
        config.validate().context("validating broker config")?;

        let ctx = ActorContext::new(
            self.store
                .unwrap_or_else(|| Arc::new(InMemoryStateStore::new())),
            self.access.unwrap_or_else(|| Arc::new(AllowAll)),
            self.policy.unwrap_or_else(|| Arc::new(AllFiltersMatch)),
            config,
        );
        let catalog = CatalogChain::open(ctx.clone()).await;

        let graph = Arc::new(GraphManager {
            subscriptions: SubscriptionDirectory::new(ctx.clone()),
            ctx,
            catalog,
            resources: DashMap::new(),
            reconciler: self
                .reconciler
                .unwrap_or_else(|| Arc::new(CatalogReconciler)),
            tasks: Mutex::new(Vec::new()),
        });

        let mut tasks = vec![spawn_lease_sweep_task(
            Arc::downgrade(&graph),
            graph.ctx.config.lease_sweep_interval,
        )];
        if let Some(every) = graph.ctx.config.reconcile_interval {
            tasks.push(spawn_reconcile_task(Arc::downgrade(&graph), every));
        }
        *graph.tasks.lock() = tasks;

        info!(
            shard_capacity = graph.ctx.config.shard_capacity,
            shards = graph.catalog.shard_count(),
            "Graph manager started"
        );
        Ok(graph)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для GraphManager
////////////////////////////////////////////////////////////////////////////////

#[async_trait]
impl LeaseSweeper for GraphManager {
    async fn sweep_expired_leases(&self) -> usize {
        let mut swept = 0;
        for handle in self.live_resources() {
            swept += handle.purge_expired_leases().await.unwrap_or(0);
        }
        for handle in self.subscriptions.handles() {
            swept += handle.purge_expired_leases().await.unwrap_or(0);
        }
        swept
    }
}

impl fmt::Debug for GraphManager {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("GraphManager")
            .field("config", &self.ctx.config)
            .field("resources", &self.resources.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("catalog_shards", &self.catalog.shard_count())
            .finish_non_exhaustive()
    }
}

impl Drop for GraphManager {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
