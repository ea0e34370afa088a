use bytes::Bytes;
use graphbus_error::{ErrorExt, StorageError};
use serde::{de::DeserializeOwned, Serialize};

use crate::application::StateStore;

/// Сохраняет состояние актора. Сбой логируется и возвращает `false`:
/// операция в памяти уже завершена, повтор делает следующий ход актора.
pub async fn persist<S: Serialize>(
    store: &dyn StateStore,
    key: &str,
    state: &S,
) -> bool {
    let bytes = match serde_json::to_vec(state) {
        Ok(bytes) => bytes,
        Err(err) => {
            let err = StorageError::Serialize {
                key: key.to_string(),
                reason: err.to_string(),
            };
            tracing::warn!(key, code = err.status_code().code(), error = %err, "State serialization failed");
            return false;
        }
    };
    match store.write(key, Bytes::from(bytes)).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                key,
                code = err.status_code().code(),
                retryable = err.status_code().is_retryable(),
                error = %err,
                "State write failed, will retry"
            );
            false
        }
    }
}

/// Восстанавливает состояние актора при активации. Отсутствие, сбой чтения
/// и повреждённые данные дают `None`.
pub async fn restore<S: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> Option<S> {
    let bytes = match store.read(key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(key, code = err.status_code().code(), error = %err, "State read failed, starting empty");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(state) => Some(state),
        Err(err) => {
            let err = StorageError::Deserialize {
                key: key.to_string(),
                reason: err.to_string(),
            };
            tracing::warn!(key, code = err.status_code().code(), error = %err, "Stored state is corrupted, starting empty");
            None
        }
    }
}

/// Удаляет сохранённое состояние.
pub async fn forget(
    store: &dyn StateStore,
    key: &str,
) -> bool {
    match store.clear(key).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(key, error = %err, "State clear failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;
    use crate::engine::InMemoryStateStore;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: u32,
    }

    struct BrokenStore;

    #[async_trait]
    impl StateStore for BrokenStore {
        async fn write(
            &self,
            key: &str,
            _state: Bytes,
        ) -> Result<(), StorageError> {
            Err(StorageError::Backend {
                key: key.into(),
                reason: "disk on fire".into(),
            })
        }

        async fn read(
            &self,
            key: &str,
        ) -> Result<Option<Bytes>, StorageError> {
            Err(StorageError::Backend {
                key: key.into(),
                reason: "disk on fire".into(),
            })
        }

        async fn clear(
            &self,
            _key: &str,
        ) -> Result<(), StorageError> {
            Ok(())
        }

        async fn keys(
            &self,
            _prefix: &str,
        ) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_persist_and_restore() {
        let store = InMemoryStateStore::new();
        assert!(persist(&store, "k", &Counter { n: 7 }).await);
        assert_eq!(restore::<Counter>(&store, "k").await, Some(Counter { n: 7 }));

        assert!(forget(&store, "k").await);
        assert_eq!(restore::<Counter>(&store, "k").await, None);
    }

    /// Тест проверяет, что сбой хранилища не превращается в ошибку.
    #[tokio::test]
    async fn test_backend_failures_are_absorbed() {
        assert!(!persist(&BrokenStore, "k", &Counter { n: 1 }).await);
        assert_eq!(restore::<Counter>(&BrokenStore, "k").await, None);
    }

    #[tokio::test]
    async fn test_corrupted_state_is_ignored() {
        let store = InMemoryStateStore::new();
        store
            .write("k", Bytes::from_static(b"not json"))
            .await
            .unwrap();
        assert_eq!(restore::<Counter>(&store, "k").await, None);
    }
}
