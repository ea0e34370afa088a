//! Модель данных брокера: идентификаторы, события, метаданные, метрики.
//!
//! - `ids`: `ResourceId` / `SubscriptionId` — абсолютные URI-адреса акторов.
//! - `message`: `EventMessage` и его builder.
//! - `metadata`: конфигурация ресурса и подписки.
//! - `metrics`: счётчики трафика.

pub mod ids;
pub mod message;
pub mod metadata;
pub mod metrics;

pub use ids::*;
pub use message::*;
pub use metadata::*;
pub use metrics::*;

/// Индексы события или фильтры подписки: пары `(ключ, значение)`.
pub type Indexes = Vec<(String, String)>;
