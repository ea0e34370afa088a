use std::{sync::Arc, time::Duration};

use graphbus::{
    BrokerConfig, ChannelObserver, Claims, EventMessage, EventMetadata, GraphManager, Observer,
    ObserverEvent, ResourceId, SubscriptionId, SubscriptionMetadata,
};
use tokio::time::advance;

async fn setup() -> (Arc<GraphManager>, ResourceId, SubscriptionId) {
    let config = BrokerConfig::builder()
        .no_reconcile()
        .lease_sweep_interval(Duration::from_secs(3600))
        .build()
        .unwrap();
    let graph = GraphManager::builder().config(config).build().await.unwrap();
    graph
        .create_resource(EventMetadata::new("res://leases"))
        .await
        .unwrap();
    let res = ResourceId::parse("res://leases").unwrap();
    let sub = graph
        .subscribe(
            Claims::anonymous(),
            &res,
            SubscriptionMetadata::default().with_identity("alice"),
        )
        .await
        .unwrap();
    (graph, res, sub)
}

fn message() -> EventMessage {
    EventMessage::builder("res://leases")
        .payload(&b"tick"[..])
        .build()
}

/// Тест проверяет, что продлённая аренда продолжает получать события, а
/// непродлённая перестаёт, и продлить её уже нельзя.
#[tokio::test(start_paused = true)]
async fn test_renewed_lease_stays_and_lapsed_lease_stops() {
    let (graph, _res, sub) = setup().await;
    let (observer, mut rx) = ChannelObserver::channel(16);
    let key = graph
        .add_subscription_observer(&sub, Observer::message(observer), Duration::from_secs(10))
        .await
        .unwrap();

    advance(Duration::from_secs(5)).await;
    assert!(graph
        .renew_subscription_observer_lease(&sub, key, Duration::from_secs(10))
        .await
        .unwrap());

    advance(Duration::from_secs(8)).await;
    let outcome = graph.notify(&sub, message(), None).await.unwrap();
    assert!(outcome.is_delivered());
    assert!(matches!(rx.try_recv(), Ok(ObserverEvent::Message(_))));

    advance(Duration::from_secs(20)).await;
    let outcome = graph.notify(&sub, message(), None).await.unwrap();
    assert!(!outcome.is_delivered());
    assert!(rx.try_recv().is_err());

    assert!(!graph
        .renew_subscription_observer_lease(&sub, key, Duration::from_secs(10))
        .await
        .unwrap());
}

/// Тест проверяет удаление аренды и повторное удаление того же ключа.
#[tokio::test(start_paused = true)]
async fn test_remove_subscription_observer() {
    let (graph, _res, sub) = setup().await;
    let (observer, mut rx) = ChannelObserver::channel(16);
    let key = graph
        .add_subscription_observer(&sub, Observer::message(observer), Duration::from_secs(10))
        .await
        .unwrap();

    assert!(graph.remove_subscription_observer(&sub, key).await.unwrap());
    assert!(!graph.remove_subscription_observer(&sub, key).await.unwrap());

    graph.notify(&sub, message(), None).await.unwrap();
    assert!(rx.try_recv().is_err());
}

/// Тест проверяет, что Metric-наблюдатель ресурса получает метрики, пока
/// аренда жива, и замолкает после её истечения.
#[tokio::test(start_paused = true)]
async fn test_resource_metric_lease_expires() {
    let (graph, res, _sub) = setup().await;
    let (observer, mut rx) = ChannelObserver::channel(16);
    let key = graph
        .add_resource_observer(&res, Observer::metric(observer), Duration::from_secs(10))
        .await
        .unwrap();

    graph
        .publish(Claims::anonymous(), &res, message(), None)
        .await
        .unwrap();
    assert!(matches!(
        rx.try_recv(),
        Ok(ObserverEvent::Metrics(m)) if m.message_count == 1
    ));

    advance(Duration::from_secs(11)).await;
    graph
        .publish(Claims::anonymous(), &res, message(), None)
        .await
        .unwrap();
    assert!(rx.try_recv().is_err());
    assert!(!graph
        .renew_resource_observer_lease(&res, key, Duration::from_secs(10))
        .await
        .unwrap());
}

/// Тест проверяет, что фоновая очистка убирает истёкшие аренды из реестра.
#[tokio::test(start_paused = true)]
async fn test_sweep_task_purges_expired_leases() {
    let config = BrokerConfig::builder()
        .no_reconcile()
        .lease_sweep_interval(Duration::from_secs(5))
        .build()
        .unwrap();
    let graph = GraphManager::builder().config(config).build().await.unwrap();
    let res = graph
        .create_resource(EventMetadata::new("res://sweep"))
        .await
        .unwrap();
    let (observer, _rx) = ChannelObserver::channel(4);
    res.add_observer(Observer::error(observer), Duration::from_secs(1))
        .await
        .unwrap();

    advance(Duration::from_secs(2)).await;
    assert_eq!(res.purge_expired_leases().await.unwrap(), 1);

    let (observer, _rx) = ChannelObserver::channel(4);
    res.add_observer(Observer::error(observer), Duration::from_secs(1))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(res.purge_expired_leases().await.unwrap(), 0);
}
