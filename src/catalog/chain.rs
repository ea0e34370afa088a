use std::sync::Arc;

use graphbus_error::{BrokerError, BrokerResult};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::{AppendOutcome, ContinuationToken, ShardHandle, ShardState};
use crate::{actor::ActorContext, model::ResourceId};

/// Каталог всех известных ресурсов, разложенный по цепочке шардов.
///
/// Шард 0 — голова. Когда хвост заполнен, добавление создаёт следующий шард
/// (chain-up) и связывает его с предыдущим. Шарды не удаляются и не
/// уплотняются, кроме явного `clear`.
///
/// Изменения идут под одним писателем цепочки, иначе проверка уникальности
/// и добавление в хвост разошлись бы. Чтение (`contains`, `count`, `list`)
/// собирает снимки шардов и не ждёт писателя; согласованность между шардами
/// во время конкурентных изменений не гарантируется.
#[derive(Debug)]
pub struct CatalogChain {
    ctx: ActorContext,
    shards: RwLock<Vec<ShardHandle>>,
    writer: Mutex<()>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl CatalogChain {
    /// Поднимает цепочку из хранилища, начиная с головы и следуя ссылкам
    /// `next`. Пустое хранилище даёт новую пустую голову.
    pub async fn open(ctx: ActorContext) -> Self {
        let capacity = ctx.config.shard_capacity;
        let head = match ShardHandle::restore(0, &ctx).await {
            Some(head) => head,
            None => ShardHandle::spawn(ShardState::new(0, capacity), ctx.clone()),
        };

        let mut shards = vec![head];
        while let Some(next) = shards.last().and_then(|tail| tail.snapshot().next) {
            match ShardHandle::restore(next, &ctx).await {
                Some(shard) => shards.push(shard),
                None => {
                    // следующий chain-up займёт тот же ordinal и перезапишет ссылку
                    error!(ordinal = next, "Catalog shard vanished mid-chain, truncating");
                    break;
                }
            }
        }
        debug!(shards = shards.len(), capacity, "Catalog opened");

        Self {
            ctx,
            shards: RwLock::new(shards),
            writer: Mutex::new(()),
        }
    }

    fn shards(&self) -> Vec<ShardHandle> {
        self.shards.read().clone()
    }

    fn snapshots(&self) -> Vec<Arc<ShardState>> {
        self.shards
            .read()
            .iter()
            .map(ShardHandle::snapshot)
            .collect()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.read().len()
    }

    /// Добавляет ресурс. `false`, если он уже есть в любом шарде.
    pub async fn add(
        &self,
        id: ResourceId,
    ) -> BrokerResult<bool> {
        let _writer = self.writer.lock().await;
        if self.contains(&id) {
            return Ok(false);
        }

        let Some(tail) = self.shards.read().last().cloned() else {
            return Err(BrokerError::unavailable("catalog://shard/0"));
        };
        if tail.append(id.clone()).await? == AppendOutcome::Full {
            self.chain_up(&tail, id.clone()).await?;
        }

        debug!(resource = %id, "Catalog entry added");
        Ok(true)
    }

    /// Создаёт следующий шард, кладёт в него `id` и только потом связывает
    /// с хвостом.
    async fn chain_up(
        &self,
        tail: &ShardHandle,
        id: ResourceId,
    ) -> BrokerResult<()> {
        let ordinal = tail.ordinal() + 1;
        let capacity = self.ctx.config.shard_capacity;
        let shard = ShardHandle::spawn(ShardState::new(ordinal, capacity), self.ctx.clone());

        shard.append(id).await?;
        tail.link(ordinal).await?;
        self.shards.write().push(shard);

        debug!(ordinal, capacity, "Catalog chain-up");
        Ok(())
    }

    /// Удаляет ресурс из шарда, где он лежит. Слот не освобождается.
    pub async fn remove(
        &self,
        id: &ResourceId,
    ) -> BrokerResult<bool> {
        let _writer = self.writer.lock().await;
        for shard in self.shards() {
            if shard.snapshot().contains(id) {
                let removed = shard.remove(id.clone()).await?;
                if removed {
                    debug!(resource = %id, ordinal = shard.ordinal(), "Catalog entry removed");
                }
                return Ok(removed);
            }
        }
        Ok(false)
    }

    pub fn contains(
        &self,
        id: &ResourceId,
    ) -> bool {
        self.snapshots().iter().any(|shard| shard.contains(id))
    }

    /// Число ресурсов, при наличии фильтра — содержащих подстроку.
    pub fn count(
        &self,
        filter: Option<&str>,
    ) -> BrokerResult<usize> {
        validate_filter(filter)?;
        Ok(self
            .snapshots()
            .iter()
            .map(|shard| shard.matching(filter).count())
            .sum())
    }

    /// Все ресурсы каталога в порядке шардов.
    pub fn entries(&self) -> Vec<ResourceId> {
        self.snapshots()
            .iter()
            .flat_map(|shard| shard.entries.iter().cloned())
            .collect()
    }

    /// Страница из не более чем `page_size` ресурсов, начиная с абсолютной
    /// позиции `index` в отфильтрованной последовательности.
    pub fn list(
        &self,
        index: usize,
        page_size: usize,
        filter: Option<&str>,
    ) -> BrokerResult<ContinuationToken> {
        if page_size == 0 {
            return Err(BrokerError::invalid("quantity", "page size must be positive"));
        }
        validate_filter(filter)?;

        let snapshots = self.snapshots();
        let mut quantity = 0;
        let mut items = Vec::with_capacity(page_size.min(1024));
        for id in snapshots.iter().flat_map(|shard| shard.matching(filter)) {
            if quantity >= index && items.len() < page_size {
                items.push(id.clone());
            }
            quantity += 1;
        }

        Ok(ContinuationToken {
            index: index + items.len(),
            quantity,
            page_size,
            filter: filter.map(str::to_string),
            items,
        })
    }

    /// Следующая страница после `token`.
    pub fn next_page(
        &self,
        token: &ContinuationToken,
    ) -> BrokerResult<ContinuationToken> {
        self.list(token.index, token.page_size, token.filter.as_deref())
    }

    /// Очищает голову и останавливает остальные шарды, стирая их состояние.
    pub async fn clear(&self) -> BrokerResult<()> {
        let _writer = self.writer.lock().await;
        let shards = self.shards();
        for shard in shards.iter().skip(1) {
            shard.deactivate().await?;
        }
        if let Some(head) = shards.first() {
            head.clear().await?;
        }
        self.shards.write().truncate(1);

        debug!(dropped_shards = shards.len().saturating_sub(1), "Catalog cleared");
        Ok(())
    }

    /// Останавливает все шарды, сохранив их состояние.
    pub async fn shutdown(&self) {
        for shard in self.shards() {
            if let Err(err) = shard.stop().await {
                warn!(ordinal = shard.ordinal(), error = %err, "Catalog shard already stopped");
            }
        }
    }
}

fn validate_filter(filter: Option<&str>) -> BrokerResult<()> {
    match filter {
        Some(f) if f.is_empty() => Err(BrokerError::invalid("filter", "must not be empty")),
        _ => Ok(()),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::BrokerConfig, engine::InMemoryStateStore};

    fn ctx_with_capacity(capacity: usize) -> ActorContext {
        let config = BrokerConfig::builder()
            .shard_capacity(capacity)
            .build()
            .unwrap();
        ActorContext {
            config: Arc::new(config),
            ..ActorContext::default()
        }
    }

    fn rid(raw: &str) -> ResourceId {
        ResourceId::parse(raw).unwrap()
    }

    /// Тест проверяет сценарий с ёмкостью 2: третий ресурс создаёт шард 1.
    #[tokio::test]
    async fn test_chain_up_on_full_tail() {
        let chain = CatalogChain::open(ctx_with_capacity(2)).await;

        assert!(chain.add(rid("res://r1")).await.unwrap());
        assert!(chain.add(rid("res://r2")).await.unwrap());
        assert_eq!(chain.shard_count(), 1);
        assert!(chain.add(rid("res://r3")).await.unwrap());

        assert_eq!(chain.shard_count(), 2);
        assert_eq!(chain.count(None).unwrap(), 3);
        let page = chain.list(0, 3, None).unwrap();
        assert_eq!(page.items, vec![rid("res://r1"), rid("res://r2"), rid("res://r3")]);
    }

    #[tokio::test]
    async fn test_add_is_idempotent_across_shards() {
        let chain = CatalogChain::open(ctx_with_capacity(1)).await;
        chain.add(rid("res://a")).await.unwrap();
        chain.add(rid("res://b")).await.unwrap();

        assert!(!chain.add(rid("res://a")).await.unwrap());
        assert!(!chain.add(rid("res://b")).await.unwrap());
        assert_eq!(chain.count(None).unwrap(), 2);
        assert_eq!(chain.shard_count(), 2);
    }

    #[tokio::test]
    async fn test_remove_leaves_gap() {
        let chain = CatalogChain::open(ctx_with_capacity(2)).await;
        chain.add(rid("res://a")).await.unwrap();
        chain.add(rid("res://b")).await.unwrap();

        assert!(chain.remove(&rid("res://a")).await.unwrap());
        assert!(!chain.remove(&rid("res://a")).await.unwrap());
        assert!(!chain.contains(&rid("res://a")));

        chain.add(rid("res://c")).await.unwrap();
        assert_eq!(chain.shard_count(), 2);
        assert_eq!(chain.entries(), vec![rid("res://b"), rid("res://c")]);
    }

    /// Тест проверяет, что постраничный обход с фильтром проходит шарды
    /// насквозь без повторов.
    #[tokio::test]
    async fn test_paging_with_filter() {
        let chain = CatalogChain::open(ctx_with_capacity(2)).await;
        for raw in ["res://eu/1", "res://us/1", "res://eu/2", "res://eu/3", "res://us/2"] {
            chain.add(rid(raw)).await.unwrap();
        }

        let mut token = chain.list(0, 2, Some("eu")).unwrap();
        assert_eq!(token.quantity, 3);
        let mut seen = Vec::new();
        while !token.is_empty() {
            seen.extend(token.items.iter().map(|id| id.to_string()));
            token = chain.next_page(&token).unwrap();
        }

        assert_eq!(seen, vec!["res://eu/1", "res://eu/2", "res://eu/3"]);
        assert_eq!(chain.count(Some("us")).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_paging_arguments() {
        let chain = CatalogChain::open(ActorContext::default()).await;

        assert!(matches!(
            chain.list(0, 0, None),
            Err(BrokerError::InvalidInput { .. })
        ));
        assert!(matches!(
            chain.count(Some("")),
            Err(BrokerError::InvalidInput { .. })
        ));
        assert!(chain.list(10, 5, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_restores_chain() {
        let store = InMemoryStateStore::new();
        let ctx = ActorContext {
            store: Arc::new(store),
            ..ctx_with_capacity(2)
        };
        let chain = CatalogChain::open(ctx.clone()).await;
        for raw in ["res://1", "res://2", "res://3", "res://4", "res://5"] {
            chain.add(rid(raw)).await.unwrap();
        }
        drop(chain);

        let reopened = CatalogChain::open(ctx).await;
        assert_eq!(reopened.shard_count(), 3);
        assert_eq!(reopened.count(None).unwrap(), 5);
        assert!(!reopened.add(rid("res://3")).await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_resets_to_single_shard() {
        let chain = CatalogChain::open(ctx_with_capacity(1)).await;
        for raw in ["res://1", "res://2", "res://3"] {
            chain.add(rid(raw)).await.unwrap();
        }

        chain.clear().await.unwrap();

        assert_eq!(chain.shard_count(), 1);
        assert_eq!(chain.count(None).unwrap(), 0);
        assert!(chain.add(rid("res://1")).await.unwrap());
        assert!(chain.add(rid("res://2")).await.unwrap());
        assert_eq!(chain.shard_count(), 2);
    }
}
