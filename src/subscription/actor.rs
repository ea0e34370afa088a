use std::{sync::Arc, time::Duration};

use graphbus_error::DeliveryError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use super::{NotifyOutcome, SubscriptionSnapshot, SubscriptionState, SubscriptionStatus};
use crate::{
    actor::{persist, ActorContext, WeakMailbox},
    application::state_port::subscription_key,
    lease::{LeaseKey, LeaseRegistry, ObserverKind},
    model::{EventMessage, Indexes, SubscriptionMetadata},
    observer::{deliver_message, push_error, push_metrics, Observer},
};

/// Команды, изменяющие состояние подписки. Обрабатываются строго по одной.
pub(crate) enum SubscriptionCommand {
    UpsertMetadata {
        metadata: SubscriptionMetadata,
        reply: oneshot::Sender<()>,
    },
    Notify {
        message: EventMessage,
        indexes: Option<Indexes>,
        reply: oneshot::Sender<NotifyOutcome>,
    },
    AddObserver {
        observer: Observer,
        ttl: Duration,
        reply: oneshot::Sender<LeaseKey>,
    },
    RemoveObserver {
        key: LeaseKey,
        reply: oneshot::Sender<bool>,
    },
    RenewLease {
        key: LeaseKey,
        ttl: Duration,
        reply: oneshot::Sender<bool>,
    },
    TakeQueued {
        max: usize,
        reply: oneshot::Sender<Vec<EventMessage>>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    PurgeLeases {
        reply: oneshot::Sender<usize>,
    },
    /// Очередной проход выгрузки durable-очереди. Актор ставит его себе сам.
    Spool,
    /// Сохраняет состояние и останавливает актора.
    Stop {
        reply: oneshot::Sender<()>,
    },
    Deactivate {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) struct SubscriptionActor {
    state: SubscriptionState,
    leases: LeaseRegistry<Observer>,
    ctx: ActorContext,
    snapshot: watch::Sender<Arc<SubscriptionSnapshot>>,
    self_ref: WeakMailbox<SubscriptionCommand>,
    dirty: bool,
    spool_pending: bool,
    /// Сбои хода, о которых Error-наблюдатели узнают после ответа.
    pending_errors: Vec<String>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SubscriptionActor {
    pub(crate) fn new(
        state: SubscriptionState,
        ctx: ActorContext,
        snapshot: watch::Sender<Arc<SubscriptionSnapshot>>,
        self_ref: WeakMailbox<SubscriptionCommand>,
    ) -> Self {
        Self {
            state,
            leases: LeaseRegistry::new(),
            ctx,
            snapshot,
            self_ref,
            dirty: false,
            spool_pending: false,
            pending_errors: Vec::new(),
        }
    }

    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<SubscriptionCommand>,
    ) {
        debug!(subscription = %self.state.id, "Subscription actor started");

        while let Some(command) = rx.recv().await {
            if self.handle(command).await {
                break;
            }
        }

        debug!(subscription = %self.state.id, "Subscription actor stopped");
    }

    /// Обрабатывает одну команду. `true` означает остановку актора.
    async fn handle(
        &mut self,
        command: SubscriptionCommand,
    ) -> bool {
        match command {
            SubscriptionCommand::UpsertMetadata { metadata, reply } => {
                self.state.metadata = Some(metadata);
                if self.state.status == SubscriptionStatus::Created {
                    self.state.status = SubscriptionStatus::Active;
                }
                self.dirty = true;
                self.commit().await;
                let _ = reply.send(());
            }
            SubscriptionCommand::Notify {
                message,
                indexes,
                reply,
            } => {
                let outcome = self.notify(message, indexes).await;
                self.commit().await;
                let _ = reply.send(outcome);
                self.push_to_observers(true).await;
            }
            SubscriptionCommand::AddObserver {
                observer,
                ttl,
                reply,
            } => {
                let kind = observer.kind();
                let key = self.leases.add(kind, observer, ttl);
                if kind == ObserverKind::Message && !self.state.queue.is_empty() {
                    self.spool_pending = false;
                    self.schedule_spool(Duration::ZERO);
                }
                let _ = reply.send(key);
            }
            SubscriptionCommand::RemoveObserver { key, reply } => {
                let _ = reply.send(self.leases.remove(&key));
            }
            SubscriptionCommand::RenewLease { key, ttl, reply } => {
                let _ = reply.send(self.leases.renew(&key, ttl));
            }
            SubscriptionCommand::TakeQueued { max, reply } => {
                self.prune_queue();
                let taken = self.state.queue.take(max);
                if !taken.is_empty() {
                    self.dirty = true;
                }
                self.commit().await;
                let _ = reply.send(taken);
            }
            SubscriptionCommand::Clear { reply } => {
                self.state.metrics.reset();
                self.state.queue.clear();
                self.dirty = true;
                self.commit().await;
                let _ = reply.send(());
            }
            SubscriptionCommand::PurgeLeases { reply } => {
                let purged = self.leases.purge_expired();
                // заодно повторяем несохранённую запись
                self.commit().await;
                let _ = reply.send(purged);
            }
            SubscriptionCommand::Spool => {
                self.spool().await;
                self.commit().await;
                self.push_to_observers(false).await;
            }
            SubscriptionCommand::Stop { reply } => {
                self.commit().await;
                let _ = reply.send(());
                return true;
            }
            SubscriptionCommand::Deactivate { reply } => {
                self.state.status = SubscriptionStatus::Removed;
                self.leases.clear();
                self.publish_snapshot();
                persist::forget(self.ctx.store.as_ref(), &self.key()).await;
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn notify(
        &mut self,
        message: EventMessage,
        indexes: Option<Indexes>,
    ) -> NotifyOutcome {
        self.state.metrics.record_message(message.len());
        self.dirty = true;

        self.route(message, indexes.as_deref()).await
    }

    async fn route(
        &mut self,
        message: EventMessage,
        indexes: Option<&[(String, String)]>,
    ) -> NotifyOutcome {
        if let Some(meta) = &self.state.metadata {
            if meta.is_expired() {
                debug!(subscription = %self.state.id, message = message.id(), "Subscription expired, dropping");
                return NotifyOutcome::Expired;
            }
            if !self.ctx.policy.matches(&meta.indexes, indexes) {
                return NotifyOutcome::Filtered;
            }
        }

        let observers = self.leases.active(ObserverKind::Message);
        if !observers.is_empty() {
            let total = observers.len();
            let failures =
                deliver_message(observers, &message, self.ctx.config.notify_timeout).await;
            let (closed, failed) = self.settle_failures(failures);
            // закрытые наблюдатели не в счёт: если остались только они,
            // событие идёт дальше, как будто наблюдателей нет
            if closed.len() < total {
                return NotifyOutcome::Delivered {
                    observers: total - closed.len(),
                    failed,
                };
            }
        }

        if self.state.is_durable() {
            self.prune_queue();
            let dropped = self
                .state
                .queue
                .push(message, self.ctx.config.max_queue_len);
            if dropped > 0 {
                warn!(subscription = %self.state.id, dropped, "Durable queue full, oldest messages dropped");
                self.record_failure("durable queue overflow");
            }
            return NotifyOutcome::Enqueued;
        }

        NotifyOutcome::Dropped
    }

    /// Выдаёт часть очереди активным наблюдателям и планирует следующий
    /// проход, пока очередь не опустеет.
    async fn spool(&mut self) {
        self.spool_pending = false;
        self.prune_queue();
        if self.state.queue.is_empty() {
            return;
        }

        let mut observers = self.leases.active(ObserverKind::Message);
        if observers.is_empty() {
            return;
        }

        let rate = self
            .state
            .metadata
            .as_ref()
            .and_then(|meta| meta.spool_rate)
            .filter(|rate| *rate > 0)
            .map_or(usize::MAX, |rate| rate as usize);
        let batch = self.state.queue.take(rate);
        self.dirty = true;
        debug!(subscription = %self.state.id, count = batch.len(), "Spooling queued messages");

        let mut batch = batch.into_iter();
        while let Some(message) = batch.next() {
            let failures =
                deliver_message(observers.clone(), &message, self.ctx.config.notify_timeout).await;
            let (closed, _) = self.settle_failures(failures);
            observers.retain(|(key, _)| !closed.contains(key));
            if observers.is_empty() {
                let mut rest = vec![message];
                rest.extend(batch);
                debug!(subscription = %self.state.id, count = rest.len(), "Observers closed, messages returned to queue");
                self.state.queue.requeue_front(rest);
                return;
            }
        }

        if !self.state.queue.is_empty() {
            self.schedule_spool(self.ctx.config.spool_interval);
        }
    }

    fn schedule_spool(
        &mut self,
        delay: Duration,
    ) {
        if self.spool_pending {
            return;
        }
        self.spool_pending = true;

        if delay.is_zero() {
            if !self.self_ref.try_cast(SubscriptionCommand::Spool) {
                self.spool_pending = false;
            }
            return;
        }

        let mailbox = self.self_ref.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            mailbox.try_cast(SubscriptionCommand::Spool);
        });
    }

    fn prune_queue(&mut self) {
        let retention = self
            .state
            .metadata
            .as_ref()
            .and_then(|meta| meta.ttl)
            .unwrap_or(self.ctx.config.queue_retention);
        let pruned = self.state.queue.prune(retention);
        if pruned > 0 {
            self.dirty = true;
            debug!(subscription = %self.state.id, pruned, "Expired queued messages pruned");
        }
    }

    /// Разбирает сбои доставки. Наблюдатели с закрытым каналом снимаются
    /// в этом же ходе и возвращаются первым элементом; прочие сбои
    /// учитываются как ошибки, их число идёт вторым.
    fn settle_failures(
        &mut self,
        failures: Vec<(LeaseKey, DeliveryError)>,
    ) -> (Vec<LeaseKey>, usize) {
        let mut closed = Vec::new();
        let mut failed = 0;
        for (key, err) in failures {
            if matches!(err, DeliveryError::Closed) {
                self.leases.remove(&key);
                debug!(subscription = %self.state.id, lease = %key, "Observer closed, lease dropped");
                closed.push(key);
            } else {
                self.record_failure(err.to_string());
                failed += 1;
            }
        }
        (closed, failed)
    }

    fn record_failure(
        &mut self,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        self.state.metrics.record_error(&reason);
        self.dirty = true;
        self.pending_errors.push(reason);
    }

    /// Рассылает накопленные сбои Error-наблюдателям и, если нужно,
    /// метрики Metric-наблюдателям. Вызывается после ответа, чтобы
    /// медленный наблюдатель не задерживал отправителя.
    async fn push_to_observers(
        &mut self,
        metrics: bool,
    ) {
        let timeout = self.ctx.config.notify_timeout;
        let errors = std::mem::take(&mut self.pending_errors);
        if !errors.is_empty() {
            let observers = self.leases.active(ObserverKind::Error);
            for reason in &errors {
                push_error(observers.clone(), self.state.id.as_str(), reason, timeout).await;
            }
        }
        if metrics {
            let observers = self.leases.active(ObserverKind::Metric);
            push_metrics(observers, &self.state.metrics, timeout).await;
        }
    }

    fn key(&self) -> String {
        subscription_key(self.state.id.as_str())
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(Arc::new(self.state.snapshot()));
    }

    /// Публикует снимок и сохраняет состояние, если оно менялось.
    /// Неудачная запись остаётся помеченной и повторяется следующим ходом.
    async fn commit(&mut self) {
        self.publish_snapshot();
        if !self.dirty || self.state.is_ephemeral() {
            return;
        }
        if persist::persist(self.ctx.store.as_ref(), &self.key(), &self.state).await {
            self.dirty = false;
        }
    }
}
