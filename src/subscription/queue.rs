use std::{collections::VecDeque, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::EventMessage;

/// Сообщение, ожидающее выдачи подписчику.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub message: EventMessage,
    pub enqueued_at: DateTime<Utc>,
}

/// Очередь durable-подписки.
///
/// FIFO с ограничением длины: при переполнении выбрасывается самое старое
/// сообщение. Время хранения проверяется по настенным часам, потому что
/// очередь переживает перезапуск актора вместе с сохранённым состоянием.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurableQueue {
    entries: VecDeque<QueuedMessage>,
}

impl DurableQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Кладёт сообщение в хвост. Возвращает число вытесненных сообщений.
    pub fn push(
        &mut self,
        message: EventMessage,
        max_len: usize,
    ) -> usize {
        self.push_at(message, Utc::now(), max_len)
    }

    pub(crate) fn push_at(
        &mut self,
        message: EventMessage,
        enqueued_at: DateTime<Utc>,
        max_len: usize,
    ) -> usize {
        self.entries.push_back(QueuedMessage {
            message,
            enqueued_at,
        });
        let mut dropped = 0;
        while self.entries.len() > max_len.max(1) {
            self.entries.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Удаляет сообщения старше `retention`. Возвращает их число.
    pub fn prune(
        &mut self,
        retention: Duration,
    ) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = Utc::now() - retention;
        let before = self.entries.len();
        self.entries.retain(|entry| entry.enqueued_at > cutoff);
        before - self.entries.len()
    }

    /// Снимает до `max` сообщений с головы.
    pub fn take(
        &mut self,
        max: usize,
    ) -> Vec<EventMessage> {
        let n = max.min(self.entries.len());
        self.entries
            .drain(..n)
            .map(|entry| entry.message)
            .collect()
    }

    /// Возвращает снятые сообщения в голову очереди, сохраняя их порядок.
    pub fn requeue_front(
        &mut self,
        messages: Vec<EventMessage>,
    ) {
        let now = Utc::now();
        for message in messages.into_iter().rev() {
            self.entries.push_front(QueuedMessage {
                message,
                enqueued_at: now,
            });
        }
    }

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
