use dashmap::DashMap;

use super::SubscriptionHandle;
use crate::{actor::ActorContext, model::SubscriptionId};

/// Живые акторы подписок, по одному на идентификатор.
///
/// Ресурс при восстановлении и менеджер графа находят подписку здесь;
/// отсутствующая активируется из хранилища.
#[derive(Debug)]
pub struct SubscriptionDirectory {
    ctx: ActorContext,
    handles: DashMap<SubscriptionId, SubscriptionHandle>,
}

impl SubscriptionDirectory {
    pub fn new(ctx: ActorContext) -> Self {
        Self {
            ctx,
            handles: DashMap::new(),
        }
    }

    pub fn context(&self) -> &ActorContext {
        &self.ctx
    }

    pub fn get(
        &self,
        id: &SubscriptionId,
    ) -> Option<SubscriptionHandle> {
        self.handles
            .get(id)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_stopped())
    }

    /// Возвращает живого актора или активирует нового.
    ///
    /// Если две активации гонятся за один id, в каталоге остаётся первая,
    /// второй актор останавливается вместе с последним адресом.
    pub async fn get_or_activate(
        &self,
        id: &SubscriptionId,
    ) -> SubscriptionHandle {
        if let Some(handle) = self.get(id) {
            return handle;
        }
        let fresh = SubscriptionHandle::activate(id.clone(), &self.ctx).await;
        let mut entry = self.handles.entry(id.clone()).or_insert_with(|| fresh.clone());
        if entry.is_stopped() {
            *entry = fresh;
        }
        entry.value().clone()
    }

    pub fn insert(
        &self,
        handle: SubscriptionHandle,
    ) {
        self.handles.insert(handle.id().clone(), handle);
    }

    pub fn remove(
        &self,
        id: &SubscriptionId,
    ) -> Option<SubscriptionHandle> {
        self.handles.remove(id).map(|(_, handle)| handle)
    }

    pub fn handles(&self) -> Vec<SubscriptionHandle> {
        self.handles
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Забирает все адреса, оставляя каталог пустым.
    pub fn drain(&self) -> Vec<SubscriptionHandle> {
        let ids: Vec<_> = self.handles.iter().map(|entry| entry.key().clone()).collect();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubscriptionMetadata;

    #[tokio::test]
    async fn test_get_or_activate_reuses_live_actor() {
        let dir = SubscriptionDirectory::new(ActorContext::default());
        let id = SubscriptionId::parse("sub://a/1").unwrap();

        let first = dir.get_or_activate(&id).await;
        first
            .upsert_metadata(SubscriptionMetadata::durable("alice"))
            .await
            .unwrap();
        let second = dir.get_or_activate(&id).await;

        assert_eq!(dir.len(), 1);
        assert!(second.metadata().is_some());
    }

    /// Тест проверяет, что остановленный актор заменяется новым,
    /// восстановленным из хранилища.
    #[tokio::test]
    async fn test_stopped_actor_is_replaced() {
        let dir = SubscriptionDirectory::new(ActorContext::default());
        let id = SubscriptionId::parse("sub://a/1").unwrap();

        let handle = dir.get_or_activate(&id).await;
        handle.deactivate().await.unwrap();
        while !handle.is_stopped() {
            tokio::task::yield_now().await;
        }

        assert!(dir.get(&id).is_none());
        let fresh = dir.get_or_activate(&id).await;
        assert!(!fresh.is_stopped());
        assert!(fresh.metadata().is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = SubscriptionDirectory::new(ActorContext::default());
        let id = SubscriptionId::parse("sub://a/1").unwrap();
        dir.get_or_activate(&id).await;

        assert!(dir.remove(&id).is_some());
        assert!(dir.is_empty());
        assert!(dir.remove(&id).is_none());
    }
}
