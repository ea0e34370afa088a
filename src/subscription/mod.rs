//! Актор подписки: метаданные, метрики, durable-очередь и наблюдатели
//! одного подписчика.

pub(crate) mod actor;
pub mod directory;
pub mod handle;
pub mod queue;
pub mod state;

pub use directory::SubscriptionDirectory;
pub use handle::SubscriptionHandle;
pub use queue::{DurableQueue, QueuedMessage};
pub use state::*;
