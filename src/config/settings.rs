use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use graphbus_error::{bail, BrokerResult, GraphResult, ResultExt, StatusCode};
use serde::{Deserialize, Serialize};

use super::BrokerConfig;
use crate::logging::LoggingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub shard_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseSettings {
    pub default_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettings {
    pub notify_timeout_ms: u64,
    pub max_queue_len: usize,
    pub queue_retention_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSettings {
    pub mailbox_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// 0 отключает сверку.
    pub interval_secs: u64,
}

/// Настройки брокера: значения по умолчанию, необязательный файл
/// (`GRAPHBUS_CONFIG`) и переменные окружения `GRAPHBUS_*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub lease: LeaseSettings,
    pub delivery: DeliverySettings,
    pub actor: ActorSettings,
    pub reconcile: ReconcileSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("GRAPHBUS_CONFIG").ok();
        Self::load_from(path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("catalog.shard_capacity", 1000)?
            .set_default("lease.default_ttl_secs", 60)?
            .set_default("lease.sweep_interval_secs", 30)?
            .set_default("delivery.notify_timeout_ms", 5000)?
            .set_default("delivery.max_queue_len", 10_000)?
            .set_default("delivery.queue_retention_secs", 86_400)?
            .set_default("actor.mailbox_capacity", 256)?
            .set_default("reconcile.interval_secs", 0)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        // GRAPHBUS_CATALOG__SHARD_CAPACITY -> catalog.shard_capacity
        let cfg = builder
            .add_source(
                Environment::with_prefix("GRAPHBUS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }

    /// Рабочая конфигурация акторов. Нулевые значения отклоняются.
    pub fn broker_config(&self) -> BrokerResult<BrokerConfig> {
        let builder = BrokerConfig::builder()
            .shard_capacity(self.catalog.shard_capacity)
            .default_lease_ttl(Duration::from_secs(self.lease.default_ttl_secs))
            .lease_sweep_interval(Duration::from_secs(self.lease.sweep_interval_secs))
            .notify_timeout(Duration::from_millis(self.delivery.notify_timeout_ms))
            .max_queue_len(self.delivery.max_queue_len)
            .queue_retention(Duration::from_secs(self.delivery.queue_retention_secs))
            .mailbox_capacity(self.actor.mailbox_capacity);
        let builder = match self.reconcile.interval_secs {
            0 => builder.no_reconcile(),
            secs => builder.reconcile_every(Duration::from_secs(secs)),
        };
        builder.build()
    }

    pub fn validate(&self) -> BrokerResult<()> {
        self.broker_config().map(|_| ())
    }

    /// Загружает настройки из окружения и сразу собирает рабочую
    /// конфигурацию. Ошибка несёт контекст этапа, на котором упала.
    pub fn load_broker_config() -> GraphResult<(Self, BrokerConfig)> {
        let settings = match Self::load() {
            Ok(settings) => settings,
            Err(err) => bail!(StatusCode::InvalidArgs, "Failed to load settings: {}", err),
        };
        let broker = settings
            .broker_config()
            .context("validating broker settings")?;
        Ok((settings, broker))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = Settings::load_from(None).unwrap();
        assert_eq!(settings.catalog.shard_capacity, 1000);
        assert_eq!(settings.lease.default_ttl_secs, 60);
        assert_eq!(settings.delivery.notify_timeout_ms, 5000);
        assert_eq!(settings.reconcile.interval_secs, 0);
        assert_eq!(settings.logging.level, "info");

        let broker = settings.broker_config().unwrap();
        assert_eq!(broker, BrokerConfig::default());
    }

    /// Тест проверяет, что переменные окружения перекрывают значения по
    /// умолчанию, а вложенность задаётся через `__`.
    #[test]
    #[serial]
    fn test_env_overrides_nested_keys() {
        std::env::set_var("GRAPHBUS_CATALOG__SHARD_CAPACITY", "2");
        std::env::set_var("GRAPHBUS_RECONCILE__INTERVAL_SECS", "15");
        let settings = Settings::load_from(None);
        std::env::remove_var("GRAPHBUS_CATALOG__SHARD_CAPACITY");
        std::env::remove_var("GRAPHBUS_RECONCILE__INTERVAL_SECS");

        let settings = settings.unwrap();
        assert_eq!(settings.catalog.shard_capacity, 2);
        let broker = settings.broker_config().unwrap();
        assert_eq!(broker.reconcile_interval, Some(Duration::from_secs(15)));
    }

    #[test]
    #[serial]
    fn test_file_source() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[lease]\ndefault_ttl_secs = 5\n\n[logging]\nlevel = \"debug\"").unwrap();

        let settings = Settings::load_from(Some(file.path())).unwrap();
        assert_eq!(settings.lease.default_ttl_secs, 5);
        assert_eq!(settings.lease.sweep_interval_secs, 30);
        assert_eq!(settings.logging.level, "debug");
    }

    /// Тест проверяет, что ошибка проверки приходит со статусом и
    /// контекстом этапа.
    #[test]
    #[serial]
    fn test_load_broker_config_reports_context() {
        std::env::set_var("GRAPHBUS_ACTOR__MAILBOX_CAPACITY", "0");
        let result = Settings::load_broker_config();
        std::env::remove_var("GRAPHBUS_ACTOR__MAILBOX_CAPACITY");

        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
        assert_eq!(err.contexts()[0].message, "validating broker settings");
        assert!(err.to_string().contains("actor.mailbox_capacity"));

        let (settings, broker) = Settings::load_broker_config().unwrap();
        assert_eq!(broker.mailbox_capacity, settings.actor.mailbox_capacity);
    }

    #[test]
    #[serial]
    fn test_validate_rejects_zero_timeout() {
        let mut settings = Settings::load_from(None).unwrap();
        settings.delivery.notify_timeout_ms = 0;
        assert!(settings.validate().is_err());
    }
}
