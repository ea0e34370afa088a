use std::{fmt, fs, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

/// Формат вывода событий.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Настройки консольного вывода.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Настройки файлового вывода (ежедневная ротация).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub filename: String,
}

/// Конфигурация логирования брокера.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень: trace, debug, info, warn, error.
    pub level: String,
    pub log_dir: PathBuf,
    pub console_enabled: bool,
    pub file_enabled: bool,
    pub console: ConsoleConfig,
    pub file: FileConfig,
    /// Дополнительные директивы `target=level`.
    pub directives: Vec<String>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    /// Применяет `GRAPHBUS_LOG_LEVEL` и `GRAPHBUS_LOG_FORMAT`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("GRAPHBUS_LOG_LEVEL") {
            self.level = level.to_lowercase();
        }
        if let Ok(format) = std::env::var("GRAPHBUS_LOG_FORMAT") {
            match LogFormat::from_str(&format) {
                Ok(format) => {
                    self.console.format = format;
                    self.file.format = format;
                }
                Err(e) => eprintln!("Ignoring GRAPHBUS_LOG_FORMAT: {e}"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !Self::LEVELS.contains(&self.level.as_str()) {
            return Err(format!("unknown log level '{}'", self.level));
        }
        if self.file_enabled && self.file.enabled && self.file.filename.trim().is_empty() {
            return Err("log file name is empty".to_string());
        }
        Ok(())
    }

    pub fn ensure_log_dir(&self) -> std::io::Result<()> {
        if self.file_enabled && self.file.enabled {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Директива для `EnvFilter`: `graphbus={level},{extra...}`.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = vec![
            self.level.clone(),
            format!("graphbus={}", self.level),
        ];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }

    pub fn console_format(&self) -> LogFormat {
        self.console.format
    }

    pub fn file_format(&self) -> LogFormat {
        self.file.format
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Pretty,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Json,
            filename: "graphbus.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            console_enabled: true,
            file_enabled: false,
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
            directives: Vec::new(),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = LoggingConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.build_filter_directive(), "info,graphbus=info");
    }

    #[test]
    fn test_rejects_unknown_level() {
        let cfg = LoggingConfig {
            level: "loud".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_extra_directives_are_appended() {
        let cfg = LoggingConfig {
            level: "warn".into(),
            directives: vec!["graphbus::catalog=trace".into()],
            ..Default::default()
        };
        assert_eq!(
            cfg.build_filter_directive(),
            "warn,graphbus=warn,graphbus::catalog=trace"
        );
    }

    /// Тест проверяет переопределение уровня и формата через окружение.
    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("GRAPHBUS_LOG_LEVEL", "DEBUG");
        std::env::set_var("GRAPHBUS_LOG_FORMAT", "compact");

        let mut cfg = LoggingConfig::default();
        cfg.apply_env_overrides();

        std::env::remove_var("GRAPHBUS_LOG_LEVEL");
        std::env::remove_var("GRAPHBUS_LOG_FORMAT");

        assert_eq!(cfg.level, "debug");
        assert_eq!(cfg.console_format(), LogFormat::Compact);
        assert_eq!(cfg.file_format(), LogFormat::Compact);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
