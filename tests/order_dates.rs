use anyhow::Result;
use catalog_migrate::{
    DocumentError, MigrationRunner,
    documents::{ORDERS, PRODUCTS},
    migrations::OrderDateBackfill,
    testing::MemoryStore,
};
use serde_json::json;

fn product_with_round() -> serde_json::Value {
    json!({
        "groupName": "Bread",
        "salesHistory": [
            {"roundId": "R0", "pickupDate": "D0", "pickupDeadlineDate": "E0"},
            {"roundId": "R1", "pickupDate": "D1", "pickupDeadlineDate": "D2"}
        ]
    })
}

#[tokio::test]
async fn copies_both_dates_from_matching_round() -> Result<()> {
    let store = MemoryStore::new();
    store.insert(PRODUCTS, "P1", product_with_round());
    store.insert(ORDERS, "o1", json!({"items": [{"productId": "P1", "roundId": "R1"}]}));

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!((summary.updated, summary.skipped, summary.errors), (1, 0, 0));

    let order = runner.store().document(ORDERS, "o1").unwrap();
    assert_eq!(order["pickupDate"], "D1");
    assert_eq!(order["pickupDeadlineDate"], "D2");
    Ok(())
}

#[tokio::test]
async fn only_absent_fields_are_copied() -> Result<()> {
    let store = MemoryStore::new();
    store.insert(PRODUCTS, "P1", product_with_round());
    store.insert(
        ORDERS,
        "has-pickup",
        json!({"pickupDate": "KEEP", "items": [{"productId": "P1", "roundId": "R1"}]}),
    );
    store.insert(
        ORDERS,
        "null-pickup",
        json!({"pickupDate": null, "items": [{"productId": "P1", "roundId": "R1"}]}),
    );

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!(summary.updated, 2);

    let kept = runner.store().document(ORDERS, "has-pickup").unwrap();
    assert_eq!(kept["pickupDate"], "KEEP");
    assert_eq!(kept["pickupDeadlineDate"], "D2");

    // null is present, not missing
    let nulled = runner.store().document(ORDERS, "null-pickup").unwrap();
    assert!(nulled["pickupDate"].is_null());
    assert_eq!(nulled["pickupDeadlineDate"], "D2");
    Ok(())
}

#[tokio::test]
async fn order_with_deadline_is_never_touched() -> Result<()> {
    let store = MemoryStore::new();
    let original = json!({
        "pickupDeadlineDate": "2024-05-01",
        "items": [{"productId": "GONE", "roundId": "R9"}]
    });
    store.insert(ORDERS, "o1", original.clone());

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!((summary.updated, summary.skipped, summary.errors), (0, 1, 0));
    assert_eq!(runner.store().document(ORDERS, "o1"), Some(original));
    assert_eq!(runner.store().gets(PRODUCTS), 0);
    Ok(())
}

#[tokio::test]
async fn missing_product_is_an_error_not_a_skip() -> Result<()> {
    let store = MemoryStore::new();
    let original = json!({"items": [{"productId": "NOPE", "roundId": "R1"}]});
    store.insert(ORDERS, "o1", original.clone());

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!((summary.updated, summary.skipped, summary.errors), (0, 0, 1));
    assert_eq!(summary.failures[0].id, "o1");
    assert_eq!(
        summary.failures[0].error,
        DocumentError::ForeignNotFound {
            collection: PRODUCTS.into(),
            id: "NOPE".into()
        }
    );
    assert_eq!(runner.store().document(ORDERS, "o1"), Some(original));
    assert!(runner.store().commit_sizes().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_references_and_rounds_are_counted() -> Result<()> {
    let store = MemoryStore::new();
    store.insert(PRODUCTS, "P1", product_with_round());
    store.insert(ORDERS, "no-round", json!({"items": [{"productId": "P1"}]}));
    store.insert(ORDERS, "no-product", json!({"items": [{"productId": "", "roundId": "R1"}]}));
    store.insert(ORDERS, "unknown-round", json!({"items": [{"productId": "P1", "roundId": "R7"}]}));
    store.insert(ORDERS, "ok", json!({"items": [{"productId": "P1", "roundId": "R0"}]}));

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!((summary.updated, summary.skipped, summary.errors), (1, 0, 3));

    let by_id = |id: &str| {
        summary
            .failures
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.error.clone())
    };
    assert_eq!(by_id("no-round"), Some(DocumentError::missing("roundId")));
    assert_eq!(by_id("no-product"), Some(DocumentError::missing("productId")));
    assert_eq!(
        by_id("unknown-round"),
        Some(DocumentError::RoundNotFound {
            product_id: "P1".into(),
            round_id: "R7".into()
        })
    );
    assert_eq!(runner.store().document(ORDERS, "ok").unwrap()["pickupDate"], "D0");
    Ok(())
}

#[tokio::test]
async fn orders_without_items_are_skipped() -> Result<()> {
    let store = MemoryStore::new();
    store.insert(ORDERS, "empty", json!({"items": []}));
    store.insert(ORDERS, "none", json!({"status": "confirmed"}));
    store.insert(ORDERS, "null", json!({"items": null}));

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!((summary.updated, summary.skipped, summary.errors), (0, 3, 0));
    Ok(())
}

#[tokio::test]
async fn product_is_fetched_once_per_run() -> Result<()> {
    let store = MemoryStore::new();
    store.insert(PRODUCTS, "P1", product_with_round());
    store.insert(ORDERS, "o1", json!({"items": [{"productId": "P1", "roundId": "R1"}]}));
    store.insert(ORDERS, "o2", json!({"items": [{"productId": "P1", "roundId": "R0"}]}));

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!(summary.updated, 2);
    assert_eq!(runner.store().gets(PRODUCTS), 1);
    Ok(())
}

#[tokio::test]
async fn round_without_dates_leaves_order_skipped() -> Result<()> {
    let store = MemoryStore::new();
    store.insert(PRODUCTS, "P1", json!({"salesHistory": [{"roundId": "R1"}]}));
    store.insert(ORDERS, "o1", json!({"items": [{"productId": "P1", "roundId": "R1"}]}));

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!((summary.updated, summary.skipped, summary.errors), (0, 1, 0));
    Ok(())
}

#[tokio::test]
async fn only_the_first_item_is_read() -> Result<()> {
    let store = MemoryStore::new();
    store.insert(PRODUCTS, "P1", product_with_round());
    store.insert(
        ORDERS,
        "o1",
        json!({"items": [{"productId": "P1", "roundId": "R1"}, {"productId": 5}]}),
    );

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!((summary.updated, summary.skipped, summary.errors), (1, 0, 0));

    let order = runner.store().document(ORDERS, "o1").unwrap();
    assert_eq!(order["pickupDate"], "D1");
    assert_eq!(order["pickupDeadlineDate"], "D2");
    Ok(())
}

#[tokio::test]
async fn odd_sibling_round_does_not_block_backfill() -> Result<()> {
    let store = MemoryStore::new();
    store.insert(
        PRODUCTS,
        "P1",
        json!({"salesHistory": [
            {"roundId": 7, "pickupDate": "X"},
            {"roundId": "R1", "pickupDate": "D1", "pickupDeadlineDate": "D2"}
        ]}),
    );
    store.insert(ORDERS, "o1", json!({"items": [{"productId": "P1", "roundId": "R1"}]}));

    let runner = MigrationRunner::new(store);
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!((summary.updated, summary.errors), (1, 0));

    let order = runner.store().document(ORDERS, "o1").unwrap();
    assert_eq!(order["pickupDate"], "D1");
    assert_eq!(order["pickupDeadlineDate"], "D2");
    Ok(())
}
