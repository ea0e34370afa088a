use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

use super::{LeaseEntry, LeaseKey, ObserverKind};

/// Реестр наблюдателей с ограниченным временем жизни.
///
/// Встраивается в состояние актора и живёт под его очередью команд, поэтому
/// сам по себе не синхронизирован. Истёкшие записи невидимы для доставки и
/// удаляются лениво, при обращении; периодическая очистка нужна только для
/// освобождения памяти.
#[derive(Debug)]
pub struct LeaseRegistry<T> {
    entries: HashMap<LeaseKey, LeaseEntry<T>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T: Clone> LeaseRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Регистрирует наблюдателя и возвращает новый ключ аренды.
    pub fn add(
        &mut self,
        kind: ObserverKind,
        observer: T,
        ttl: Duration,
    ) -> LeaseKey {
        let key = LeaseKey::new();
        self.entries
            .insert(key, LeaseEntry::new(kind, observer, ttl));
        tracing::debug!(lease = %key, %kind, ttl_ms = ttl.as_millis() as u64, "Lease added");
        key
    }

    /// Продлевает аренду. `false`, если ключ неизвестен или аренда уже
    /// истекла: вызывающему нужно зарегистрироваться заново.
    pub fn renew(
        &mut self,
        key: &LeaseKey,
        ttl: Duration,
    ) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.extend(ttl);
                true
            }
            Some(_) => {
                self.entries.remove(key);
                tracing::debug!(lease = %key, "Lease expired before renewal");
                false
            }
            None => false,
        }
    }

    /// Идемпотентное удаление. Возвращает `true`, если запись была.
    pub fn remove(
        &mut self,
        key: &LeaseKey,
    ) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Активные наблюдатели заданного вида. Заодно выбрасывает истёкшие
    /// записи любого вида.
    pub fn active(
        &mut self,
        kind: ObserverKind,
    ) -> Vec<(LeaseKey, T)> {
        self.purge_expired();
        self.entries
            .iter()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(key, entry)| (*key, entry.observer.clone()))
            .collect()
    }

    pub fn has_active(
        &self,
        kind: ObserverKind,
    ) -> bool {
        let now = Instant::now();
        self.entries
            .values()
            .any(|entry| entry.kind == kind && !entry.is_expired_at(now))
    }

    /// Удаляет истёкшие записи, возвращает их количество.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                tracing::debug!(lease = %key, kind = %entry.kind, "Lease expired");
            }
            keep
        });
        before - self.entries.len()
    }

    /// Число записей, включая ещё не вычищенные истёкшие.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для LeaseRegistry
////////////////////////////////////////////////////////////////////////////////

impl<T: Clone> Default for LeaseRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
