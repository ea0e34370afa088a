//! Правило сопоставления индексов публикации с фильтрами подписки.

use std::fmt;

/// Решает, проходит ли событие с индексами `message` через фильтры
/// подписки `filters`.
///
/// `message == None` означает, что публикация шла без индексов: такие
/// события фильтрами не отсекаются.
pub trait IndexMatchPolicy: Send + Sync + fmt::Debug {
    fn matches(
        &self,
        filters: &[(String, String)],
        message: Option<&[(String, String)]>,
    ) -> bool;
}

/// Каждый ключ фильтра подписки обязан иметь равное значение в индексах
/// события. Подписка без фильтров принимает всё.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFiltersMatch;

/// Достаточно совпадения хотя бы одного фильтра.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyFilterMatches;

fn has_pair(
    indexes: &[(String, String)],
    key: &str,
    value: &str,
) -> bool {
    indexes.iter().any(|(k, v)| k == key && v == value)
}

impl IndexMatchPolicy for AllFiltersMatch {
    fn matches(
        &self,
        filters: &[(String, String)],
        message: Option<&[(String, String)]>,
    ) -> bool {
        match message {
            None => true,
            Some(indexes) => filters.iter().all(|(k, v)| has_pair(indexes, k, v)),
        }
    }
}

impl IndexMatchPolicy for AnyFilterMatches {
    fn matches(
        &self,
        filters: &[(String, String)],
        message: Option<&[(String, String)]>,
    ) -> bool {
        match message {
            None => true,
            Some(_) if filters.is_empty() => true,
            Some(indexes) => filters.iter().any(|(k, v)| has_pair(indexes, k, v)),
        }
    }
}
