//! Порт хранилища состояния акторов.
//!
//! Акторы сохраняют своё состояние под ключами `resource/{id}`,
//! `subscription/{id}` и `catalog/shard/{ordinal}` и восстанавливают его при
//! активации. Сбой хранилища не прерывает операцию в памяти.

use async_trait::async_trait;
use bytes::Bytes;
use graphbus_error::StorageError;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn write(
        &self,
        key: &str,
        state: Bytes,
    ) -> Result<(), StorageError>;

    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<Bytes>, StorageError>;

    async fn clear(
        &self,
        key: &str,
    ) -> Result<(), StorageError>;

    /// Все ключи с заданным префиксом. Нужен для сверки каталога.
    async fn keys(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>, StorageError>;
}

pub fn resource_key(id: &str) -> String {
    format!("resource/{id}")
}

pub fn subscription_key(id: &str) -> String {
    format!("subscription/{id}")
}

pub fn shard_key(ordinal: u32) -> String {
    format!("catalog/shard/{ordinal}")
}
