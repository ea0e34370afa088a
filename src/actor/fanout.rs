use std::{future::Future, pin::Pin, time::Duration};

use graphbus_error::DeliveryError;

pub type BoxedCall<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Выполняет вызовы параллельно и собирает результаты в исходном порядке.
///
/// Каждый вызов запускается отдельной задачей с собственным таймаутом:
/// медленная, упавшая или запаниковавшая цель даёт ошибку только в своей
/// позиции и не задерживает остальные дольше `timeout`.
pub async fn fan_out<K, T>(
    calls: Vec<(K, BoxedCall<T>)>,
    timeout: Duration,
) -> Vec<(K, Result<T, DeliveryError>)>
where
    T: Send + 'static,
{
    let handles: Vec<_> = calls
        .into_iter()
        .map(|(key, call)| (key, tokio::spawn(tokio::time::timeout(timeout, call))))
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (key, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(DeliveryError::failed(format!(
                "timed out after {} ms",
                timeout.as_millis()
            ))),
            Err(err) if err.is_panic() => Err(DeliveryError::failed("observer panicked")),
            Err(_) => Err(DeliveryError::failed("delivery task cancelled")),
        };
        results.push((key, outcome));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed<T: Send + 'static>(fut: impl Future<Output = T> + Send + 'static) -> BoxedCall<T> {
        Box::pin(fut)
    }

    /// Тест проверяет, что паника и таймаут одной цели не мешают остальным.
    #[tokio::test]
    async fn test_failures_are_isolated() {
        let calls = vec![
            ("ok", boxed(async { 1 })),
            (
                "panic",
                boxed(async {
                    if true {
                        panic!("boom");
                    }
                    2
                }),
            ),
            (
                "slow",
                boxed(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    3
                }),
            ),
            ("ok2", boxed(async { 4 })),
        ];

        let results = fan_out(calls, Duration::from_millis(50)).await;
        let keys: Vec<_> = results.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["ok", "panic", "slow", "ok2"]);

        assert_eq!(results[0].1.as_ref().ok(), Some(&1));
        assert!(results[1].1.is_err());
        assert!(results[2].1.is_err());
        assert_eq!(results[3].1.as_ref().ok(), Some(&4));
    }

    #[tokio::test]
    async fn test_empty_fan_out() {
        let results = fan_out::<(), ()>(Vec::new(), Duration::from_secs(1)).await;
        assert!(results.is_empty());
    }
}
