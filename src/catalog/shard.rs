use std::sync::Arc;

use graphbus_error::BrokerResult;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::{
    actor::{persist, ActorContext, Mailbox},
    application::state_port::shard_key,
    model::ResourceId,
};

/// Состояние одного шарда каталога.
///
/// `appended` считает занятые слоты: удаление не освобождает место, шард
/// заполняется только добавлениями.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardState {
    pub ordinal: u32,
    pub capacity: usize,
    pub entries: Vec<ResourceId>,
    pub appended: usize,
    pub next: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Слоты кончились, нужен следующий шард.
    Full,
}

enum ShardCommand {
    Append {
        id: ResourceId,
        reply: oneshot::Sender<AppendOutcome>,
    },
    Remove {
        id: ResourceId,
        reply: oneshot::Sender<bool>,
    },
    Link {
        next: u32,
        reply: oneshot::Sender<()>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Deactivate {
        reply: oneshot::Sender<()>,
    },
}

struct ShardActor {
    state: ShardState,
    ctx: ActorContext,
    snapshot: watch::Sender<Arc<ShardState>>,
    dirty: bool,
}

/// Адрес актора шарда. Членство и перечисление читаются из снимка.
#[derive(Debug, Clone)]
pub struct ShardHandle {
    ordinal: u32,
    mailbox: Mailbox<ShardCommand>,
    snapshot: watch::Receiver<Arc<ShardState>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ShardState {
    pub fn new(
        ordinal: u32,
        capacity: usize,
    ) -> Self {
        Self {
            ordinal,
            capacity: capacity.max(1),
            entries: Vec::new(),
            appended: 0,
            next: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.appended >= self.capacity
    }

    pub fn contains(
        &self,
        id: &ResourceId,
    ) -> bool {
        self.entries.contains(id)
    }

    /// Идентификаторы, подходящие под фильтр подстроки, в порядке добавления.
    pub fn matching<'a>(
        &'a self,
        filter: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ResourceId> + 'a {
        self.entries
            .iter()
            .filter(move |id| filter.is_none_or(|f| id.as_str().contains(f)))
    }
}

impl ShardActor {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<ShardCommand>,
    ) {
        debug!(ordinal = self.state.ordinal, "Catalog shard started");

        while let Some(command) = rx.recv().await {
            match command {
                ShardCommand::Append { id, reply } => {
                    let outcome = if self.state.is_full() {
                        AppendOutcome::Full
                    } else {
                        self.state.entries.push(id);
                        self.state.appended += 1;
                        self.dirty = true;
                        AppendOutcome::Appended
                    };
                    self.commit().await;
                    let _ = reply.send(outcome);
                }
                ShardCommand::Remove { id, reply } => {
                    let before = self.state.entries.len();
                    self.state.entries.retain(|entry| entry != &id);
                    let removed = self.state.entries.len() < before;
                    self.dirty |= removed;
                    self.commit().await;
                    let _ = reply.send(removed);
                }
                ShardCommand::Link { next, reply } => {
                    self.state.next = Some(next);
                    self.dirty = true;
                    self.commit().await;
                    let _ = reply.send(());
                }
                ShardCommand::Clear { reply } => {
                    self.state.entries.clear();
                    self.state.appended = 0;
                    self.state.next = None;
                    self.dirty = true;
                    self.commit().await;
                    let _ = reply.send(());
                }
                ShardCommand::Stop { reply } => {
                    self.commit().await;
                    let _ = reply.send(());
                    break;
                }
                ShardCommand::Deactivate { reply } => {
                    persist::forget(self.ctx.store.as_ref(), &shard_key(self.state.ordinal)).await;
                    let _ = reply.send(());
                    break;
                }
            }
        }

        debug!(ordinal = self.state.ordinal, "Catalog shard stopped");
    }

    async fn commit(&mut self) {
        self.snapshot
            .send_replace(Arc::new(self.state.clone()));
        if self.dirty
            && persist::persist(
                self.ctx.store.as_ref(),
                &shard_key(self.state.ordinal),
                &self.state,
            )
            .await
        {
            self.dirty = false;
        }
    }
}

impl ShardHandle {
    /// Поднимает шард из хранилища. `None`, если сохранённого состояния нет.
    pub async fn restore(
        ordinal: u32,
        ctx: &ActorContext,
    ) -> Option<Self> {
        let state =
            persist::restore::<ShardState>(ctx.store.as_ref(), &shard_key(ordinal)).await?;
        (state.ordinal == ordinal).then(|| Self::spawn(state, ctx.clone()))
    }

    pub fn spawn(
        state: ShardState,
        ctx: ActorContext,
    ) -> Self {
        let ordinal = state.ordinal;
        let address = format!("catalog://shard/{ordinal}");
        let (mailbox, rx) = Mailbox::channel(address, ctx.config.mailbox_capacity);
        let (tx, snapshot) = watch::channel(Arc::new(state.clone()));
        let actor = ShardActor {
            state,
            ctx,
            snapshot: tx,
            dirty: false,
        };
        tokio::spawn(actor.run(rx));
        Self {
            ordinal,
            mailbox,
            snapshot,
        }
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn snapshot(&self) -> Arc<ShardState> {
        self.snapshot.borrow().clone()
    }

    pub async fn append(
        &self,
        id: ResourceId,
    ) -> BrokerResult<AppendOutcome> {
        self.mailbox
            .call(|reply| ShardCommand::Append { id, reply })
            .await
    }

    pub async fn remove(
        &self,
        id: ResourceId,
    ) -> BrokerResult<bool> {
        self.mailbox
            .call(|reply| ShardCommand::Remove { id, reply })
            .await
    }

    pub async fn link(
        &self,
        next: u32,
    ) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| ShardCommand::Link { next, reply })
            .await
    }

    pub async fn clear(&self) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| ShardCommand::Clear { reply })
            .await
    }

    pub async fn stop(&self) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| ShardCommand::Stop { reply })
            .await
    }

    pub async fn deactivate(&self) -> BrokerResult<()> {
        self.mailbox
            .call(|reply| ShardCommand::Deactivate { reply })
            .await
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
