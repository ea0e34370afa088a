use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Протокол, через который событие попало в брокер.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolTag {
    Mqtt,
    Coap,
    Http,
    WebSocket,
    Tcp,
    Udp,
}

/// Событие, публикуемое в ресурс.
///
/// Неизменяемо после создания: поля доступны только на чтение, а клон
/// дешёвый (`Bytes` разделяет буфер).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    id: String,
    content_type: String,
    resource_uri: String,
    protocol: ProtocolTag,
    payload: Bytes,
    timestamp: DateTime<Utc>,
    audit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventMessageBuilder {
    id: Option<String>,
    content_type: String,
    resource_uri: String,
    protocol: ProtocolTag,
    payload: Bytes,
    timestamp: Option<DateTime<Utc>>,
    audit: bool,
    cache_key: Option<String>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl EventMessage {
    pub fn builder(resource_uri: impl Into<String>) -> EventMessageBuilder {
        EventMessageBuilder {
            id: None,
            content_type: "application/octet-stream".to_string(),
            resource_uri: resource_uri.into(),
            protocol: ProtocolTag::Http,
            payload: Bytes::new(),
            timestamp: None,
            audit: false,
            cache_key: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn resource_uri(&self) -> &str {
        &self.resource_uri
    }

    pub fn protocol(&self) -> ProtocolTag {
        self.protocol
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn audit(&self) -> bool {
        self.audit
    }

    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Заполняет пустой `id` и нулевую метку времени.
    ///
    /// Адаптеры, которые десериализуют событие из сети, могут прислать их
    /// пустыми; ресурс вызывает это перед рассылкой.
    pub fn normalized(mut self) -> Self {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        if self.timestamp.timestamp() == 0 {
            self.timestamp = Utc::now();
        }
        self
    }
}

impl EventMessageBuilder {
    pub fn id(
        mut self,
        id: impl Into<String>,
    ) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn content_type(
        mut self,
        content_type: impl Into<String>,
    ) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn protocol(
        mut self,
        protocol: ProtocolTag,
    ) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn payload(
        mut self,
        payload: impl Into<Bytes>,
    ) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn timestamp(
        mut self,
        timestamp: DateTime<Utc>,
    ) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn audit(
        mut self,
        audit: bool,
    ) -> Self {
        self.audit = audit;
        self
    }

    pub fn cache_key(
        mut self,
        key: impl Into<String>,
    ) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn build(self) -> EventMessage {
        EventMessage {
            id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            content_type: self.content_type,
            resource_uri: self.resource_uri,
            protocol: self.protocol,
            payload: self.payload,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            audit: self.audit,
            cache_key: self.cache_key,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    /// Тест проверяет, что builder заполняет id и время, если их не задали.
    #[test]
    fn test_builder_fills_identity() {
        let msg = EventMessage::builder("res://a")
            .payload(Bytes::from_static(b"hello"))
            .build();

        assert!(!msg.id().is_empty());
        assert_eq!(msg.resource_uri(), "res://a");
        assert_eq!(msg.len(), 5);
        assert_eq!(msg.protocol(), ProtocolTag::Http);
        assert!(msg.timestamp() <= Utc::now());
    }

    #[test]
    fn test_builder_keeps_explicit_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let msg = EventMessage::builder("res://a")
            .id("m-1")
            .content_type("text/plain")
            .protocol(ProtocolTag::Mqtt)
            .timestamp(ts)
            .audit(true)
            .cache_key("k")
            .build();

        assert_eq!(msg.id(), "m-1");
        assert_eq!(msg.content_type(), "text/plain");
        assert_eq!(msg.timestamp(), ts);
        assert!(msg.audit());
        assert_eq!(msg.cache_key(), Some("k"));
    }

    /// Тест проверяет, что событие из сети с пустым id и нулевым временем
    /// нормализуется.
    #[test]
    fn test_normalized_fills_missing_fields() {
        let json = r#"{
            "id": "",
            "content_type": "text/plain",
            "resource_uri": "res://a",
            "protocol": "udp",
            "payload": [1, 2, 3],
            "timestamp": "1970-01-01T00:00:00Z",
            "audit": false
        }"#;
        let msg: EventMessage = serde_json::from_str(json).unwrap();
        assert!(msg.id().is_empty());

        let msg = msg.normalized();
        assert!(!msg.id().is_empty());
        assert!(msg.timestamp().timestamp() > 0);
        assert_eq!(msg.payload().as_ref(), &[1, 2, 3]);
    }
}
