//! Актор ресурса: цель публикации, множество подписчиков и наблюдатели
//! уровня ресурса (метрики, ошибки).

pub(crate) mod actor;
pub mod handle;
pub mod state;

pub use handle::ResourceHandle;
pub use state::{PublishReport, ResourceSnapshot, ResourceState};
