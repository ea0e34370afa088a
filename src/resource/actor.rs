use std::{collections::HashMap, sync::Arc, time::Duration};

use graphbus_error::{BrokerError, BrokerResult};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use super::{PublishReport, ResourceSnapshot, ResourceState};
use crate::{
    actor::{fan_out, persist, ActorContext, BoxedCall},
    application::{state_port::resource_key, Claims, Decision, Operation},
    lease::{LeaseKey, LeaseRegistry, ObserverKind},
    model::{EventMessage, EventMetadata, Indexes, SubscriptionId},
    observer::{push_error, push_metrics, Observer},
    subscription::{NotifyOutcome, SubscriptionHandle},
};

pub(crate) enum ResourceCommand {
    Publish {
        claims: Claims,
        message: EventMessage,
        indexes: Option<Indexes>,
        reply: oneshot::Sender<BrokerResult<PublishReport>>,
    },
    Subscribe {
        claims: Claims,
        subscription: SubscriptionHandle,
        reply: oneshot::Sender<BrokerResult<bool>>,
    },
    Unsubscribe {
        id: SubscriptionId,
        identity: Option<String>,
        reply: oneshot::Sender<bool>,
    },
    AddObserver {
        observer: Observer,
        ttl: Duration,
        reply: oneshot::Sender<BrokerResult<LeaseKey>>,
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
    UpsertMetadata {
        metadata: EventMetadata,
        reply: oneshot::Sender<()>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    PurgeLeases {
        reply: oneshot::Sender<usize>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Deactivate {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) struct ResourceActor {
    state: ResourceState,
    subscribers: HashMap<SubscriptionId, SubscriptionHandle>,
    leases: LeaseRegistry<Observer>,
    ctx: ActorContext,
    snapshot: watch::Sender<Arc<ResourceSnapshot>>,
    dirty: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ResourceActor {
    pub(crate) fn new(
        state: ResourceState,
        subscribers: HashMap<SubscriptionId, SubscriptionHandle>,
        ctx: ActorContext,
        snapshot: watch::Sender<Arc<ResourceSnapshot>>,
    ) -> Self {
        Self {
            state,
            subscribers,
            leases: LeaseRegistry::new(),
            ctx,
            snapshot,
            dirty: false,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<ResourceCommand>,
    ) {
        debug!(resource = %self.state.id, subscribers = self.subscribers.len(), "Resource actor started");

        while let Some(command) = rx.recv().await {
            if self.handle(command).await {
                break;
            }
        }

        debug!(resource = %self.state.id, "Resource actor stopped");
    }

    async fn handle(
        &mut self,
        command: ResourceCommand,
    ) -> bool {
        match command {
            ResourceCommand::Publish {
                claims,
                message,
                indexes,
                reply,
            } => {
                let report = self.publish(&claims, message, indexes).await;
                self.commit().await;
                let _ = reply.send(report);
            }
            ResourceCommand::Subscribe {
                claims,
                subscription,
                reply,
            } => {
                let result = self.subscribe(&claims, subscription).await;
                self.commit().await;
                let _ = reply.send(result);
            }
            ResourceCommand::Unsubscribe {
                id,
                identity,
                reply,
            } => {
                let removed = self.unsubscribe(&id, identity.as_deref());
                self.commit().await;
                let _ = reply.send(removed);
            }
            ResourceCommand::AddObserver {
                observer,
                ttl,
                reply,
            } => {
                let result = match observer.kind() {
                    ObserverKind::Message => Err(BrokerError::invalid(
                        "observer",
                        "resources accept only metric and error observers",
                    )),
                    kind => Ok(self.leases.add(kind, observer, ttl)),
                };
                let _ = reply.send(result);
            }
            ResourceCommand::RemoveObserver { key, reply } => {
                let _ = reply.send(self.leases.remove(&key));
            }
            ResourceCommand::RenewLease { key, ttl, reply } => {
                let _ = reply.send(self.leases.renew(&key, ttl));
            }
            ResourceCommand::UpsertMetadata { metadata, reply } => {
                self.state.metadata = Some(metadata);
                self.dirty = true;
                self.commit().await;
                let _ = reply.send(());
            }
            ResourceCommand::Clear { reply } => {
                self.state.metadata = None;
                self.state.metrics.reset();
                self.state.subscriptions.clear();
                self.subscribers.clear();
                self.dirty = true;
                self.commit().await;
                let _ = reply.send(());
            }
            ResourceCommand::PurgeLeases { reply } => {
                let purged = self.leases.purge_expired();
                self.commit().await;
                let _ = reply.send(purged);
            }
            ResourceCommand::Stop { reply } => {
                self.commit().await;
                let _ = reply.send(());
                return true;
            }
            ResourceCommand::Deactivate { reply } => {
                self.leases.clear();
                self.subscribers.clear();
                self.state.metadata = None;
                self.state.metrics.reset();
                self.state.subscriptions.clear();
                self.snapshot
                    .send_replace(Arc::new(self.state.snapshot()));
                persist::forget(self.ctx.store.as_ref(), &self.key()).await;
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn authorize(
        &self,
        claims: &Claims,
        operation: Operation,
    ) -> BrokerResult<()> {
        let fallback;
        let metadata = match &self.state.metadata {
            Some(meta) => meta,
            None => {
                fallback = EventMetadata::new(self.state.id.as_str());
                &fallback
            }
        };
        match self
            .ctx
            .access
            .authorize(claims, &self.state.id, operation, metadata)
            .await
        {
            Decision::Allow => Ok(()),
            Decision::Deny { reason } => {
                warn!(resource = %self.state.id, %operation, %reason, "Access denied");
                Err(BrokerError::AuthorizationDenied {
                    resource: self.state.id.to_string(),
                    operation: operation.to_string(),
                    reason,
                })
            }
        }
    }

    /// Рассылает событие всем подписчикам параллельно. Сбой или таймаут
    /// одного подписчика учитывается в отчёте и метриках, но не прерывает
    /// публикацию.
    async fn publish(
        &mut self,
        claims: &Claims,
        message: EventMessage,
        indexes: Option<Indexes>,
    ) -> BrokerResult<PublishReport> {
        self.authorize(claims, Operation::Publish).await?;

        let message = message.normalized();
        let mut report = PublishReport {
            message_id: message.id().to_string(),
            ..PublishReport::default()
        };

        if !self.state.accepts_publish() {
            warn!(resource = %self.state.id, message = message.id(), "Resource is disabled, publish absorbed");
            self.record_failure(self.state.id.to_string(), "resource disabled")
                .await;
            return Ok(report);
        }

        self.state.metrics.record_message(message.len());
        self.dirty = true;

        let calls: Vec<(SubscriptionId, BoxedCall<BrokerResult<NotifyOutcome>>)> = self
            .subscribers
            .iter()
            .map(|(id, handle)| {
                let handle = handle.clone();
                let message = message.clone();
                let indexes = indexes.clone();
                let call: BoxedCall<BrokerResult<NotifyOutcome>> =
                    Box::pin(async move { handle.notify(message, indexes).await });
                (id.clone(), call)
            })
            .collect();
        report.subscribers = calls.len();

        for (id, result) in fan_out(calls, self.ctx.config.subscriber_timeout()).await {
            match result {
                Ok(Ok(outcome)) => match outcome {
                    NotifyOutcome::Delivered { .. } => report.delivered += 1,
                    NotifyOutcome::Enqueued => report.enqueued += 1,
                    NotifyOutcome::Filtered => report.filtered += 1,
                    NotifyOutcome::Dropped | NotifyOutcome::Expired => report.dropped += 1,
                },
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(resource = %self.state.id, subscription = %id, error = %err, "Subscriber unavailable");
                    self.record_failure(id.to_string(), &err.to_string())
                        .await;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(resource = %self.state.id, subscription = %id, error = %err, "Subscriber notify failed");
                    self.record_failure(id.to_string(), &err.to_string())
                        .await;
                }
            }
        }

        let observers = self.leases.active(ObserverKind::Metric);
        push_metrics(observers, &self.state.metrics, self.ctx.config.notify_timeout).await;

        debug!(
            resource = %self.state.id,
            message = %report.message_id,
            subscribers = report.subscribers,
            delivered = report.delivered,
            enqueued = report.enqueued,
            failed = report.failed,
            "Published"
        );
        Ok(report)
    }

    async fn subscribe(
        &mut self,
        claims: &Claims,
        subscription: SubscriptionHandle,
    ) -> BrokerResult<bool> {
        self.authorize(claims, Operation::Subscribe).await?;

        let id = subscription.id().clone();
        let identity = subscription
            .metadata()
            .and_then(|meta| meta.identity);
        let added = self.subscribers.insert(id.clone(), subscription).is_none();
        self.state.subscriptions.insert(id.clone(), identity);
        self.dirty = true;

        if added {
            debug!(resource = %self.state.id, subscription = %id, "Subscribed");
        }
        Ok(added)
    }

    /// Идемпотентно. С `identity` удаляет только подписку того же владельца.
    fn unsubscribe(
        &mut self,
        id: &SubscriptionId,
        identity: Option<&str>,
    ) -> bool {
        let Some(recorded) = self.state.subscriptions.get(id) else {
            return false;
        };
        if let Some(identity) = identity {
            if recorded.as_deref() != Some(identity) {
                warn!(resource = %self.state.id, subscription = %id, "Unsubscribe rejected, identity mismatch");
                return false;
            }
        }

        self.state.subscriptions.remove(id);
        self.subscribers.remove(id);
        self.dirty = true;
        debug!(resource = %self.state.id, subscription = %id, "Unsubscribed");
        true
    }

    async fn record_failure(
        &mut self,
        source: String,
        reason: &str,
    ) {
        self.state.metrics.record_error(reason);
        self.dirty = true;
        let observers = self.leases.active(ObserverKind::Error);
        push_error(observers, &source, reason, self.ctx.config.notify_timeout).await;
    }

    fn key(&self) -> String {
        resource_key(self.state.id.as_str())
    }

    async fn commit(&mut self) {
        self.snapshot
            .send_replace(Arc::new(self.state.snapshot()));
        if !self.dirty {
            return;
        }
        if persist::persist(self.ctx.store.as_ref(), &self.key(), &self.state).await {
            self.dirty = false;
        }
    }
}
