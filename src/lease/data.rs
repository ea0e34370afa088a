use std::{fmt, str::FromStr, time::Duration};

use graphbus_error::BrokerError;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

/// Ключ аренды наблюдателя. Непрозрачен для вызывающего.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseKey(Uuid);

/// Вид наблюдателя, зарегистрированного через аренду.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObserverKind {
    Message,
    Metric,
    Error,
}

/// Запись реестра: наблюдатель и момент, после которого он невидим для
/// доставки.
#[derive(Debug, Clone)]
pub struct LeaseEntry<T> {
    pub kind: ObserverKind,
    pub observer: T,
    pub registered_at: Instant,
    pub expires_at: Instant,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LeaseKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl<T> LeaseEntry<T> {
    pub fn new(
        kind: ObserverKind,
        observer: T,
        ttl: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            kind,
            observer,
            registered_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn is_expired_at(
        &self,
        now: Instant,
    ) -> bool {
        now >= self.expires_at
    }

    /// Продлевает аренду. Срок никогда не сдвигается назад.
    pub fn extend(
        &mut self,
        ttl: Duration,
    ) {
        let candidate = Instant::now() + ttl;
        if candidate > self.expires_at {
            self.expires_at = candidate;
        }
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at
            .checked_duration_since(Instant::now())
            .unwrap_or(Duration::ZERO)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для LeaseKey
////////////////////////////////////////////////////////////////////////////////

impl Default for LeaseKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LeaseKey {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(LeaseKey)
            .map_err(|_| BrokerError::invalid("lease key", format!("'{s}' is not a lease key")))
    }
}

impl fmt::Display for ObserverKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Message => "message",
            Self::Metric => "metric",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_key_parsing() {
        let key = LeaseKey::new();
        let parsed = LeaseKey::from_str(&key.to_string()).unwrap();
        assert_eq!(key, parsed);
        assert!(LeaseKey::from_str("not-a-key").is_err());
    }

    /// Тест проверяет, что продление не может сократить срок аренды.
    #[tokio::test]
    async fn test_extend_is_monotonic() {
        tokio::time::pause();

        let mut entry = LeaseEntry::new(ObserverKind::Metric, (), Duration::from_secs(60));
        let before = entry.expires_at;

        entry.extend(Duration::from_secs(1));
        assert_eq!(entry.expires_at, before);

        tokio::time::advance(Duration::from_secs(10)).await;
        entry.extend(Duration::from_secs(60));
        assert!(entry.expires_at > before);
    }

    #[tokio::test]
    async fn test_entry_expiry() {
        tokio::time::pause();

        let entry = LeaseEntry::new(ObserverKind::Error, (), Duration::from_secs(5));
        assert!(!entry.is_expired());
        assert_eq!(entry.time_until_expiry(), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(entry.is_expired());
        assert_eq!(entry.time_until_expiry(), Duration::ZERO);
    }
}
