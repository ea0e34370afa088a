use std::{sync::Weak, time::Duration};

use async_trait::async_trait;
use tokio::{task::JoinHandle, time::interval};

/// Владелец реестров аренды, который умеет вычищать истёкшие записи.
#[async_trait]
pub trait LeaseSweeper: Send + Sync {
    /// Удаляет истёкшие аренды, возвращает их количество.
    async fn sweep_expired_leases(&self) -> usize;
}

////////////////////////////////////////////////////////////////////////////////
// Внешние функции
////////////////////////////////////////////////////////////////////////////////

/// Запускает фоновую задачу периодической очистки истёкших аренд.
///
/// Держит только слабую ссылку: задача завершается сама, когда владелец
/// уничтожен. Возвращает `JoinHandle` для досрочной отмены.
pub fn spawn_lease_sweep_task<S>(
    sweeper: Weak<S>,
    sweep_interval: Duration,
) -> JoinHandle<()>
where
    S: LeaseSweeper + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(sweep_interval);
        // первый тик срабатывает сразу
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(sweeper) = sweeper.upgrade() else {
                tracing::debug!("Lease sweeper dropped, stopping sweep task");
                break;
            };
            let cleaned = sweeper.sweep_expired_leases().await;

            if cleaned > 0 {
                tracing::debug!(cleaned, "Swept expired leases");
            }
        }
    })
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[derive(Default)]
    struct CountingSweeper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LeaseSweeper for CountingSweeper {
        async fn sweep_expired_leases(&self) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            1
        }
    }

    #[tokio::test]
    async fn test_sweep_task_multiple_cycles() {
        tokio::time::pause();

        let sweeper = Arc::new(CountingSweeper::default());
        let handle = spawn_lease_sweep_task(Arc::downgrade(&sweeper), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sweeper.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sweeper.calls.load(Ordering::SeqCst), 2);

        handle.abort();
    }

    /// Тест проверяет, что задача завершается, когда владелец уничтожен.
    #[tokio::test]
    async fn test_sweep_task_stops_when_owner_dropped() {
        tokio::time::pause();

        let sweeper = Arc::new(CountingSweeper::default());
        let handle = spawn_lease_sweep_task(Arc::downgrade(&sweeper), Duration::from_secs(1));
        drop(sweeper);

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep task should stop")
            .unwrap();
    }
}
