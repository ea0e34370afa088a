//! Фасад графа ресурсов и подписок.
//!
//! `GraphManager` — единственная точка входа для протокольных адаптеров:
//! публикация, подписка, аренды наблюдателей, постраничный каталог.

pub mod manager;
pub mod reconcile;

pub use manager::{GraphManager, GraphManagerBuilder};
pub use reconcile::{spawn_reconcile_task, CatalogReconciler, ReconcileReport, Reconciler};
