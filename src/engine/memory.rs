use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use graphbus_error::StorageError;

use crate::application::StateStore;

/// Хранилище состояния в памяти процесса.
///
/// Клон разделяет те же данные, поэтому один экземпляр можно отдать
/// менеджеру графа и оставить себе для проверок.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    pub data: Arc<DashMap<String, Bytes>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn write(
        &self,
        key: &str,
        state: Bytes,
    ) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), state);
        Ok(())
    }

    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<Bytes>, StorageError> {
        Ok(self.data.get(key).map(|entry| entry.clone()))
    }

    async fn clear(
        &self,
        key: &str,
    ) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    async fn keys(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_clear() {
        let store = InMemoryStateStore::new();
        store
            .write("resource/res://a", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        let got = store.read("resource/res://a").await.unwrap();
        assert_eq!(got, Some(Bytes::from_static(b"{}")));

        store.clear("resource/res://a").await.unwrap();
        assert_eq!(store.read("resource/res://a").await.unwrap(), None);
        // повторная очистка не ошибка
        store.clear("resource/res://a").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_by_prefix_sorted() {
        let store = InMemoryStateStore::new();
        for key in ["resource/b", "catalog/shard/0", "resource/a"] {
            store.write(key, Bytes::new()).await.unwrap();
        }

        let keys = store.keys("resource/").await.unwrap();
        assert_eq!(keys, vec!["resource/a", "resource/b"]);
        assert_eq!(store.len(), 3);
    }
}
