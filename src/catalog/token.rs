use serde::{Deserialize, Serialize};

use crate::model::ResourceId;

/// Курсор постраничного обхода каталога.
///
/// `index` — абсолютная позиция следующего элемента в отфильтрованной
/// последовательности, `quantity` — сколько всего элементов подходило под
/// фильтр на момент выдачи страницы. Границы шардов наружу не видны.
/// Обход закончен, когда страница пришла пустой.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    pub index: usize,
    pub quantity: usize,
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default)]
    pub items: Vec<ResourceId>,
}

impl ContinuationToken {
    /// Курсор на начало каталога, ещё без элементов. Передаётся в
    /// `GraphManager::get_catalog` вместо первого `list_catalog`.
    pub fn start(
        page_size: usize,
        filter: Option<String>,
    ) -> Self {
        Self {
            index: 0,
            quantity: 0,
            page_size,
            filter,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Остались ли элементы за этой страницей (по данным на момент выдачи).
    pub fn has_more(&self) -> bool {
        self.index < self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_token() {
        let token = ContinuationToken::start(10, Some("eu".into()));
        assert!(token.is_empty());
        assert!(!token.has_more());
        assert_eq!(token.page_size, 10);
    }

    /// Тест проверяет, что токен можно отдать клиенту в JSON и принять
    /// обратно.
    #[test]
    fn test_token_json_shape() {
        let token = ContinuationToken {
            index: 2,
            quantity: 5,
            page_size: 2,
            filter: None,
            items: vec![ResourceId::parse("res://a").unwrap()],
        };
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["items"][0], "res://a");
        assert!(json.get("filter").is_none());

        let back: ContinuationToken = serde_json::from_value(json).unwrap();
        assert_eq!(back, token);
        assert!(back.has_more());
    }
}
