use std::{collections::BTreeSet, sync::Arc};

use graphbus::{
    BrokerConfig, BrokerError, ContinuationToken, EventMetadata, GraphManager, InMemoryStateStore,
    ResourceId,
};
use proptest::prelude::*;

async fn graph_with(
    store: InMemoryStateStore,
    capacity: usize,
) -> Arc<GraphManager> {
    let config = BrokerConfig::builder()
        .shard_capacity(capacity)
        .no_reconcile()
        .build()
        .unwrap();
    GraphManager::builder()
        .store(store)
        .config(config)
        .build()
        .await
        .unwrap()
}

fn id(raw: &str) -> ResourceId {
    ResourceId::parse(raw).unwrap()
}

/// Обходит каталог курсором до пустой страницы.
fn walk(
    graph: &GraphManager,
    page_size: usize,
    filter: Option<&str>,
) -> Vec<ResourceId> {
    let mut token = graph.list_catalog(0, page_size, filter).unwrap();
    let mut out = Vec::new();
    while !token.is_empty() {
        out.extend(token.items.iter().cloned());
        token = graph.get_catalog(&token).unwrap();
    }
    out
}

/// Тест проверяет наращивание цепочки: третий ресурс при ёмкости 2 создаёт
/// второй шард, а список и счётчик видят все три.
#[tokio::test]
async fn test_chain_up_on_full_shard() {
    let graph = graph_with(InMemoryStateStore::new(), 2).await;

    for raw in ["res://r1", "res://r2"] {
        graph
            .create_resource(EventMetadata::new(raw))
            .await
            .unwrap();
    }
    assert_eq!(graph.catalog().shard_count(), 1);

    graph
        .create_resource(EventMetadata::new("res://r3"))
        .await
        .unwrap();

    assert_eq!(graph.catalog().shard_count(), 2);
    assert_eq!(graph.catalog().count(None).unwrap(), 3);
    let page = graph.list_catalog(0, 3, None).unwrap();
    assert_eq!(page.items, vec![id("res://r1"), id("res://r2"), id("res://r3")]);
}

#[tokio::test]
async fn test_add_is_idempotent() {
    let graph = graph_with(InMemoryStateStore::new(), 2).await;
    let r1 = id("res://r1");

    assert!(graph.catalog().add(r1.clone()).await.unwrap());
    let count = graph.catalog().count(None).unwrap();
    assert!(!graph.catalog().add(r1.clone()).await.unwrap());

    assert!(graph.catalog().contains(&r1));
    assert_eq!(graph.catalog().count(None).unwrap(), count);
}

/// Тест проверяет, что каталог переживает перезапуск менеджера на том же
/// хранилище вместе со всеми шардами.
#[tokio::test]
async fn test_catalog_survives_restart() {
    let store = InMemoryStateStore::new();
    let graph = graph_with(store.clone(), 2).await;
    for i in 0..5 {
        graph
            .create_resource(EventMetadata::new(format!("res://r{i}")))
            .await
            .unwrap();
    }
    graph.shutdown().await;
    drop(graph);

    let graph = graph_with(store, 2).await;

    assert_eq!(graph.catalog().shard_count(), 3);
    assert_eq!(graph.catalog().count(None).unwrap(), 5);
    assert_eq!(walk(&graph, 2, None).len(), 5);
    assert!(graph
        .resource(&id("res://r4"))
        .await
        .metadata()
        .is_some());
}

/// Тест проверяет обход от стартового курсора: `has_more` гаснет на
/// последней странице, следующая за ней пуста.
#[tokio::test]
async fn test_get_catalog_from_start_token() {
    let graph = graph_with(InMemoryStateStore::new(), 2).await;
    for raw in ["res://r1", "res://r2", "res://r3"] {
        graph.catalog().add(id(raw)).await.unwrap();
    }

    let first = graph
        .get_catalog(&ContinuationToken::start(2, None))
        .unwrap();
    assert_eq!(first.items, vec![id("res://r1"), id("res://r2")]);
    assert!(first.has_more());

    let second = graph.get_catalog(&first).unwrap();
    assert_eq!(second.items, vec![id("res://r3")]);
    assert!(!second.has_more());
    assert!(graph.get_catalog(&second).unwrap().is_empty());

    let invalid = ContinuationToken::start(0, None);
    assert!(matches!(
        graph.get_catalog(&invalid),
        Err(BrokerError::InvalidInput { .. })
    ));
}

#[tokio::test]
async fn test_filter_and_invalid_arguments() {
    let graph = graph_with(InMemoryStateStore::new(), 2).await;
    for raw in ["res://sensors/a", "res://lights/b", "res://sensors/c"] {
        graph.catalog().add(id(raw)).await.unwrap();
    }

    assert_eq!(graph.catalog().count(Some("sensors")).unwrap(), 2);
    assert_eq!(
        walk(&graph, 1, Some("sensors")),
        vec![id("res://sensors/a"), id("res://sensors/c")]
    );

    assert!(matches!(
        graph.list_catalog(0, 0, None),
        Err(BrokerError::InvalidInput { .. })
    ));
    assert!(matches!(
        graph.list_catalog(0, 10, Some("")),
        Err(BrokerError::InvalidInput { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Полный обход курсором отдаёт каждый ресурс ровно один раз при любой
    /// ёмкости шарда и размере страницы.
    #[test]
    fn prop_paging_visits_every_entry_once(
        names in prop::collection::btree_set("[a-z]{1,6}", 0..40),
        capacity in 1usize..6,
        page_size in 1usize..8,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (listed, count) = rt.block_on(async {
            let graph = graph_with(InMemoryStateStore::new(), capacity).await;
            for name in &names {
                graph.catalog().add(id(&format!("res://{name}"))).await.unwrap();
            }
            let listed = walk(&graph, page_size, None);
            let count = graph.catalog().count(None).unwrap();
            graph.shutdown().await;
            (listed, count)
        });

        let expected: Vec<_> = names.iter().map(|n| id(&format!("res://{n}"))).collect();
        let unique: BTreeSet<_> = listed.iter().cloned().collect();
        prop_assert_eq!(unique.len(), listed.len());
        prop_assert_eq!(count, names.len());
        prop_assert_eq!(unique, expected.into_iter().collect::<BTreeSet<_>>());
    }

    /// Повторное добавление ничего не меняет и возвращает `false`.
    #[test]
    fn prop_add_twice_is_noop(
        names in prop::collection::vec("[a-z]{1,4}", 1..30),
        capacity in 1usize..5,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (first, second, count) = rt.block_on(async {
            let graph = graph_with(InMemoryStateStore::new(), capacity).await;
            let mut first = Vec::new();
            for name in &names {
                first.push(graph.catalog().add(id(&format!("res://{name}"))).await.unwrap());
            }
            let mut second = Vec::new();
            for name in &names {
                second.push(graph.catalog().add(id(&format!("res://{name}"))).await.unwrap());
            }
            let count = graph.catalog().count(None).unwrap();
            graph.shutdown().await;
            (first, second, count)
        });

        let distinct: BTreeSet<_> = names.iter().collect();
        prop_assert_eq!(first.iter().filter(|added| **added).count(), distinct.len());
        prop_assert!(second.iter().all(|added| !added));
        prop_assert_eq!(count, distinct.len());
    }
}
