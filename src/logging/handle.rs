use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing_appender::non_blocking::WorkerGuard;

/// Счётчики жизненного цикла логирования.
#[derive(Debug, Default)]
pub struct LoggingMetrics {
    pub flush_count: AtomicU64,
    pub shutdown_in_progress: AtomicBool,
}

/// Handle для управления жизненным циклом логирования.
///
/// Держит guard файлового writer'а: пока handle жив, фоновый поток
/// дописывает буфер в файл.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    pub metrics: Arc<LoggingMetrics>,
    flush_timeout: Duration,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LoggingMetrics {
    pub fn record_flush(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count.load(Ordering::Relaxed)
    }

    pub fn is_shutdown_in_progress(&self) -> bool {
        self.shutdown_in_progress.load(Ordering::Acquire)
    }

    fn start_shutdown(&self) {
        self.shutdown_in_progress.store(true, Ordering::Release);
    }
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            metrics: Arc::new(LoggingMetrics::default()),
            flush_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_flush_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Отмечает запрос сброса буфера. Сам сброс делает guard при drop.
    pub fn flush(&self) {
        self.metrics.record_flush();
        tracing::debug!(flush_count = self.metrics.flush_count(), "Logging flush requested");
    }

    /// Останавливает файловый writer, дожидаясь сброса не дольше
    /// `flush_timeout`.
    pub async fn shutdown(mut self) {
        self.metrics.start_shutdown();
        tracing::info!(
            timeout_ms = self.flush_timeout.as_millis() as u64,
            "Logging shutdown initiated"
        );

        let guard = self.file_guard.take();
        let result = tokio::time::timeout(
            self.flush_timeout,
            tokio::task::spawn_blocking(move || drop(guard)),
        )
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("Logging shutdown task panicked: {e}"),
            Err(_) => eprintln!(
                "WARNING: Logging shutdown exceeded timeout of {}ms",
                self.flush_timeout.as_millis()
            ),
        }
    }
}
