//! Общие части акторов: очередь команд, контекст запуска, параллельная
//! рассылка и сохранение состояния.

pub mod context;
pub mod fanout;
pub mod mailbox;
pub mod persist;

pub use context::ActorContext;
pub use fanout::{fan_out, BoxedCall};
pub use mailbox::{Mailbox, WeakMailbox};
