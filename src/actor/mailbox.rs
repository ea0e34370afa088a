use std::sync::Arc;

use graphbus_error::{BrokerError, BrokerResult};
use tokio::sync::{mpsc, oneshot};

/// Входящая очередь актора.
///
/// Все изменяющие команды проходят через неё по одной: актор обрабатывает
/// следующую только после завершения предыдущей. Закрытая очередь
/// превращается в `BrokerError::ActorUnavailable` с адресом актора.
pub struct Mailbox<C> {
    address: Arc<str>,
    tx: mpsc::Sender<C>,
}

/// Слабая ссылка на очередь: не удерживает актора в живых.
pub struct WeakMailbox<C> {
    address: Arc<str>,
    tx: mpsc::WeakSender<C>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<C: Send + 'static> Mailbox<C> {
    /// Создаёт очередь и возвращает её вместе с приёмником для актора.
    pub fn channel(
        address: impl Into<Arc<str>>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<C>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                address: address.into(),
                tx,
            },
            rx,
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Отправляет команду и ждёт ответа.
    pub async fn call<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> C,
    ) -> BrokerResult<R> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| BrokerError::unavailable(self.address.as_ref()))?;
        rx.await
            .map_err(|_| BrokerError::unavailable(self.address.as_ref()))
    }

    /// Отправляет команду без ожидания ответа.
    pub async fn cast(
        &self,
        command: C,
    ) -> BrokerResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| BrokerError::unavailable(self.address.as_ref()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn downgrade(&self) -> WeakMailbox<C> {
        WeakMailbox {
            address: self.address.clone(),
            tx: self.tx.downgrade(),
        }
    }
}

impl<C: Send + 'static> WeakMailbox<C> {
    pub fn upgrade(&self) -> Option<Mailbox<C>> {
        self.tx.upgrade().map(|tx| Mailbox {
            address: self.address.clone(),
            tx,
        })
    }

    /// Кладёт команду, не дожидаясь места в очереди. `false`, если актор
    /// остановлен или очередь полна.
    pub fn try_cast(
        &self,
        command: C,
    ) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.try_send(command).is_ok(),
            None => false,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<C> Clone for Mailbox<C> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<C> Clone for WeakMailbox<C> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Mailbox<C> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("address", &self.address)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
