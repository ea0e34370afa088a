//! Сверка каталога с ресурсами.
//!
//! Создание актора ресурса и запись в каталог не связаны транзакцией, и
//! после частичного сбоя они могут разойтись. Сверка исправляет расхождение
//! в меру возможного: она не блокирует изменения и может пропустить ресурс,
//! который создаётся прямо во время прохода.

use std::{collections::HashSet, sync::Weak, time::Duration};

use async_trait::async_trait;
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, warn};

use super::GraphManager;
use crate::model::ResourceId;

/// Итог прохода сверки.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ресурсы с метаданными, которых не было в каталоге.
    pub added: usize,
    /// Записи каталога без ресурса за ними.
    pub removed: usize,
}

/// Подключаемая стратегия сверки.
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(
        &self,
        graph: &GraphManager,
    ) -> ReconcileReport;
}

/// Сверка по умолчанию.
///
/// - запись каталога удаляется, если у ресурса (живого или поднятого из
///   хранилища) нет метаданных;
/// - ресурс с метаданными (живой или сохранённый) добавляется в каталог,
///   если его там нет.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogReconciler;

const RESOURCE_PREFIX: &str = "resource/";

#[async_trait]
impl Reconciler for CatalogReconciler {
    async fn reconcile(
        &self,
        graph: &GraphManager,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let stored: HashSet<ResourceId> = match graph.context().store.keys(RESOURCE_PREFIX).await {
            Ok(keys) => keys
                .iter()
                .filter_map(|key| key.strip_prefix(RESOURCE_PREFIX))
                .filter_map(|raw| ResourceId::parse(raw).ok())
                .collect(),
            Err(err) => {
                warn!(error = %err, "Reconcile skipped, state store unavailable");
                return report;
            }
        };

        for id in graph.catalog().entries() {
            let has_metadata = match graph.live_resource(&id) {
                Some(handle) => handle.metadata().is_some(),
                None if stored.contains(&id) => graph.resource(&id).await.metadata().is_some(),
                None => false,
            };
            if has_metadata {
                continue;
            }
            match graph.catalog().remove(&id).await {
                Ok(true) => {
                    debug!(resource = %id, "Reconcile removed orphaned catalog entry");
                    report.removed += 1;
                }
                Ok(false) => {}
                Err(err) => warn!(resource = %id, error = %err, "Reconcile remove failed"),
            }
        }

        let mut candidates: HashSet<ResourceId> = stored;
        candidates.extend(graph.live_resources().into_iter().map(|h| h.id().clone()));
        for id in candidates {
            if graph.catalog().contains(&id) {
                continue;
            }
            let handle = graph.resource(&id).await;
            if handle.metadata().is_none() {
                continue;
            }
            match graph.catalog().add(id.clone()).await {
                Ok(true) => {
                    debug!(resource = %id, "Reconcile restored catalog entry");
                    report.added += 1;
                }
                Ok(false) => {}
                Err(err) => warn!(resource = %id, error = %err, "Reconcile add failed"),
            }
        }

        report
    }
}

/// Запускает периодическую сверку. Держит слабую ссылку и завершается
/// вместе с менеджером.
pub fn spawn_reconcile_task(
    graph: Weak<GraphManager>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(graph) = graph.upgrade() else {
                debug!("Graph manager dropped, stopping reconcile task");
                break;
            };
            let report = graph.reconcile().await;
            if report != ReconcileReport::default() {
                debug!(added = report.added, removed = report.removed, "Catalog reconciled");
            }
        }
    })
}
