use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Счётчики трафика ресурса или подписки.
///
/// Монотонно не убывают; обнуляются только явным `clear`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationMetrics {
    pub id: String,
    pub message_count: u64,
    pub byte_count: u64,
    pub error_count: u64,
    pub last_message_timestamp: Option<DateTime<Utc>>,
    pub last_error_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl CommunicationMetrics {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn record_message(
        &mut self,
        bytes: usize,
    ) {
        self.message_count = self.message_count.saturating_add(1);
        self.byte_count = self.byte_count.saturating_add(bytes as u64);
        self.last_message_timestamp = Some(Utc::now());
    }

    pub fn record_error(
        &mut self,
        reason: impl Into<String>,
    ) {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error_timestamp = Some(Utc::now());
        self.last_error = Some(reason.into());
    }

    /// Обнуляет счётчики, сохраняя идентификатор.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.id));
    }
}
