/// Общие части акторов: очередь команд, контекст, рассылка, сохранение.
pub mod actor;
/// Порты внешних соседей: авторизация, хранилище состояния, политика индексов.
pub mod application;
/// Каталог ресурсов на цепочке шардов.
pub mod catalog;
/// Загрузка настроек и конфигурация брокера.
pub mod config;
/// Привязки хранилища состояния.
pub mod engine;
/// Фасад графа и сверка каталога.
pub mod graph;
/// Реестр аренд наблюдателей и фоновая очистка.
pub mod lease;
/// Логирование (форматы, фильтры, консоль и файл).
pub mod logging;
/// Модель данных: идентификаторы, события, метаданные, метрики.
pub mod model;
/// Наблюдатели и рассылка им.
pub mod observer;
/// Актор ресурса.
pub mod resource;
/// Актор подписки, durable-очередь, long-poll.
pub mod subscription;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use application::{
    AccessControl, AllFiltersMatch, AllowAll, AnyFilterMatches, Claims, Decision,
    IndexMatchPolicy, Operation, StateStore,
};
pub use catalog::{CatalogChain, ContinuationToken};
pub use config::{BrokerConfig, BrokerConfigBuilder, Settings};
pub use engine::InMemoryStateStore;
/// Ошибки ядра брокера.
pub use graphbus_error::{
    BrokerError, BrokerResult, DeliveryError, GraphResult, StackError, StorageError,
};
pub use graph::{CatalogReconciler, GraphManager, GraphManagerBuilder, ReconcileReport, Reconciler};
pub use lease::{LeaseKey, LeaseRegistry, ObserverKind};
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
pub use model::{
    CommunicationMetrics, EventMessage, EventMetadata, Indexes, ProtocolTag, ResourceId,
    SubscriptionId, SubscriptionMetadata,
};
pub use observer::{
    ChannelObserver, ErrorObserver, MessageObserver, MetricObserver, Observer, ObserverEvent,
    OneshotObserver,
};
pub use resource::{PublishReport, ResourceHandle};
pub use subscription::{NotifyOutcome, SubscriptionHandle, SubscriptionStatus};
