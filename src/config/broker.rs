use std::time::Duration;

use graphbus_error::{BrokerError, BrokerResult};

/// Рабочие параметры брокера, которые получают акторы.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub shard_capacity: usize,
    pub default_lease_ttl: Duration,
    pub lease_sweep_interval: Duration,
    pub notify_timeout: Duration,
    pub max_queue_len: usize,
    pub queue_retention: Duration,
    pub mailbox_capacity: usize,
    /// `None` отключает периодическую сверку каталога.
    pub reconcile_interval: Option<Duration>,
    /// Пауза между повторными проходами выгрузки очереди.
    pub spool_interval: Duration,
}

#[derive(Debug, Default)]
pub struct BrokerConfigBuilder {
    shard_capacity: Option<usize>,
    default_lease_ttl: Option<Duration>,
    lease_sweep_interval: Option<Duration>,
    notify_timeout: Option<Duration>,
    max_queue_len: Option<usize>,
    queue_retention: Option<Duration>,
    mailbox_capacity: Option<usize>,
    reconcile_interval: Option<Option<Duration>>,
    spool_interval: Option<Duration>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl BrokerConfig {
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Отклоняет нулевые ёмкости и таймауты.
    pub fn validate(&self) -> BrokerResult<()> {
        let checks = [
            ("catalog.shard_capacity", self.shard_capacity == 0),
            ("lease.default_ttl_secs", self.default_lease_ttl.is_zero()),
            ("lease.sweep_interval_secs", self.lease_sweep_interval.is_zero()),
            ("delivery.notify_timeout_ms", self.notify_timeout.is_zero()),
            ("delivery.max_queue_len", self.max_queue_len == 0),
            ("delivery.queue_retention_secs", self.queue_retention.is_zero()),
            ("actor.mailbox_capacity", self.mailbox_capacity == 0),
            ("delivery.spool_interval", self.spool_interval.is_zero()),
        ];
        match checks.iter().find(|(_, bad)| *bad) {
            Some((field, _)) => Err(BrokerError::invalid(*field, "must be greater than zero")),
            None => Ok(()),
        }
    }

    /// Сколько ресурс ждёт ответа подписчика при рассылке.
    ///
    /// Подписчик сам тратит до `notify_timeout` на своих наблюдателей,
    /// поэтому ресурсу нужен запас сверх этого.
    pub fn subscriber_timeout(&self) -> Duration {
        self.notify_timeout.saturating_mul(2)
    }
}

impl BrokerConfigBuilder {
    pub fn shard_capacity(
        mut self,
        capacity: usize,
    ) -> Self {
        self.shard_capacity = Some(capacity);
        self
    }

    pub fn default_lease_ttl(
        mut self,
        ttl: Duration,
    ) -> Self {
        self.default_lease_ttl = Some(ttl);
        self
    }

    pub fn lease_sweep_interval(
        mut self,
        interval: Duration,
    ) -> Self {
        self.lease_sweep_interval = Some(interval);
        self
    }

    pub fn notify_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.notify_timeout = Some(timeout);
        self
    }

    pub fn max_queue_len(
        mut self,
        len: usize,
    ) -> Self {
        self.max_queue_len = Some(len);
        self
    }

    pub fn queue_retention(
        mut self,
        retention: Duration,
    ) -> Self {
        self.queue_retention = Some(retention);
        self
    }

    pub fn mailbox_capacity(
        mut self,
        capacity: usize,
    ) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    pub fn reconcile_every(
        mut self,
        interval: Duration,
    ) -> Self {
        self.reconcile_interval = Some(Some(interval));
        self
    }

    pub fn no_reconcile(mut self) -> Self {
        self.reconcile_interval = Some(None);
        self
    }

    pub fn spool_interval(
        mut self,
        interval: Duration,
    ) -> Self {
        self.spool_interval = Some(interval);
        self
    }

    pub fn build(self) -> BrokerResult<BrokerConfig> {
        let default = BrokerConfig::default();
        let config = BrokerConfig {
            shard_capacity: self.shard_capacity.unwrap_or(default.shard_capacity),
            default_lease_ttl: self.default_lease_ttl.unwrap_or(default.default_lease_ttl),
            lease_sweep_interval: self
                .lease_sweep_interval
                .unwrap_or(default.lease_sweep_interval),
            notify_timeout: self.notify_timeout.unwrap_or(default.notify_timeout),
            max_queue_len: self.max_queue_len.unwrap_or(default.max_queue_len),
            queue_retention: self.queue_retention.unwrap_or(default.queue_retention),
            mailbox_capacity: self.mailbox_capacity.unwrap_or(default.mailbox_capacity),
            reconcile_interval: self
                .reconcile_interval
                .unwrap_or(default.reconcile_interval),
            spool_interval: self.spool_interval.unwrap_or(default.spool_interval),
        };
        config.validate()?;
        Ok(config)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для BrokerConfig
////////////////////////////////////////////////////////////////////////////////

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            shard_capacity: 1000,
            default_lease_ttl: Duration::from_secs(60),
            lease_sweep_interval: Duration::from_secs(30),
            notify_timeout: Duration::from_millis(5000),
            max_queue_len: 10_000,
            queue_retention: Duration::from_secs(86_400), // сутки
            mailbox_capacity: 256,
            reconcile_interval: None,
            spool_interval: Duration::from_secs(1),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrokerConfig::default();
        assert_eq!(config.shard_capacity, 1000);
        assert_eq!(config.default_lease_ttl, Duration::from_secs(60));
        assert_eq!(config.notify_timeout, Duration::from_secs(5));
        assert!(config.subscriber_timeout() > config.notify_timeout);
        assert_eq!(config.reconcile_interval, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_partial() {
        let config = BrokerConfig::builder()
            .shard_capacity(2)
            .reconcile_every(Duration::from_secs(10))
            .build()
            .unwrap();

        assert_eq!(config.shard_capacity, 2);
        assert_eq!(config.reconcile_interval, Some(Duration::from_secs(10)));
        // Остальные параметры из default
        assert_eq!(config.max_queue_len, 10_000);
        assert_eq!(config.mailbox_capacity, 256);
    }

    /// Тест проверяет, что builder отклоняет нулевую ёмкость и называет поле.
    #[test]
    fn test_builder_rejects_zero() {
        let err = BrokerConfig::builder()
            .max_queue_len(0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            BrokerError::InvalidInput { ref field, .. } if field == "delivery.max_queue_len"
        ));
    }
}
