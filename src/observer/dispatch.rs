use std::{sync::Arc, time::Duration};

use graphbus_error::{DeliveryError, ErrorExt};

use super::Observer;
use crate::{
    actor::{fan_out, BoxedCall},
    lease::LeaseKey,
    model::{CommunicationMetrics, EventMessage},
};

/// Доставляет событие всем Message-наблюдателям параллельно.
///
/// Возвращает сбои по ключам аренды; сбой одного наблюдателя не влияет на
/// остальных и не удаляет его из реестра.
pub async fn deliver_message(
    observers: Vec<(LeaseKey, Observer)>,
    message: &EventMessage,
    timeout: Duration,
) -> Vec<(LeaseKey, DeliveryError)> {
    let message = Arc::new(message.clone());
    let calls: Vec<(LeaseKey, BoxedCall<Result<(), DeliveryError>>)> = observers
        .into_iter()
        .filter_map(|(key, observer)| {
            let observer = observer.as_message()?.clone();
            let message = message.clone();
            let call: BoxedCall<Result<(), DeliveryError>> =
                Box::pin(async move { observer.on_message(&message).await });
            Some((key, call))
        })
        .collect();
    collect_failures(fan_out(calls, timeout).await, "message")
}

/// Рассылает обновлённые метрики Metric-наблюдателям.
pub async fn push_metrics(
    observers: Vec<(LeaseKey, Observer)>,
    metrics: &CommunicationMetrics,
    timeout: Duration,
) -> usize {
    if observers.is_empty() {
        return 0;
    }
    let metrics = Arc::new(metrics.clone());
    let calls: Vec<(LeaseKey, BoxedCall<Result<(), DeliveryError>>)> = observers
        .into_iter()
        .filter_map(|(key, observer)| {
            let observer = observer.as_metric()?.clone();
            let metrics = metrics.clone();
            let call: BoxedCall<Result<(), DeliveryError>> =
                Box::pin(async move { observer.on_metrics(&metrics).await });
            Some((key, call))
        })
        .collect();
    collect_failures(fan_out(calls, timeout).await, "metric").len()
}

/// Сообщает Error-наблюдателям о сбое доставки.
pub async fn push_error(
    observers: Vec<(LeaseKey, Observer)>,
    id: &str,
    error: &str,
    timeout: Duration,
) -> usize {
    if observers.is_empty() {
        return 0;
    }
    let id: Arc<str> = Arc::from(id);
    let error: Arc<str> = Arc::from(error);
    let calls: Vec<(LeaseKey, BoxedCall<Result<(), DeliveryError>>)> = observers
        .into_iter()
        .filter_map(|(key, observer)| {
            let observer = observer.as_error()?.clone();
            let (id, error) = (id.clone(), error.clone());
            let call: BoxedCall<Result<(), DeliveryError>> =
                Box::pin(async move { observer.on_error(&id, &error).await });
            Some((key, call))
        })
        .collect();
    collect_failures(fan_out(calls, timeout).await, "error").len()
}

fn collect_failures(
    results: Vec<(LeaseKey, Result<Result<(), DeliveryError>, DeliveryError>)>,
    kind: &'static str,
) -> Vec<(LeaseKey, DeliveryError)> {
    results
        .into_iter()
        .filter_map(|(key, outcome)| match outcome.and_then(|inner| inner) {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(lease = %key, kind, code = err.status_code().code(), error = %err, "Observer delivery failed");
                Some((key, err))
            }
        })
        .collect()
}
