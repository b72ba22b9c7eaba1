use anyhow::Result;
use catalog_migrate::{
    DocumentStore, Error, MigrationRunner, Patch, Store,
    documents::{ORDERS, PRODUCTS},
    migrations::{OrderDateBackfill, ProductSchemaMigration},
    testing::ensure_documents_table,
};
use serde_json::json;
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

async fn start_store() -> Result<(ContainerAsync<GenericImage>, Store)> {
    let image = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_USER", "postgres")
        .with_env_var("POSTGRES_PASSWORD", "postgres");
    let container = image.start().await?;
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres?sslmode=disable");

    let store = Store::connect(&url).await?;
    ensure_documents_table(store.pool()).await?;
    Ok((container, store))
}

#[tokio::test]
#[ignore = "needs a docker daemon"]
async fn products_migrate_in_postgres() -> Result<()> {
    let (_container, store) = start_store().await?;
    store
        .upsert(
            PRODUCTS,
            "p1",
            &json!({"name": "Bread", "pricingOptions": [{"name": "Large", "price": 1000, "stock": 5, "unit": "ea"}]}),
        )
        .await?;
    store
        .upsert(PRODUCTS, "p2", &json!({"name": "Eggs", "price": 500, "stock": 3}))
        .await?;

    let runner = MigrationRunner::new(store.clone());
    let summary = runner.run(&ProductSchemaMigration).await?;
    assert_eq!((summary.updated, summary.commits), (2, 1));

    let p1 = store.get(PRODUCTS, "p1").await?.expect("p1 exists");
    assert_eq!(p1.get("groupName"), Some(&json!("Bread")));
    assert!(!p1.has("name"));
    assert!(!p1.has("pricingOptions"));
    let p2 = store.get(PRODUCTS, "p2").await?.expect("p2 exists");
    assert_eq!(p2.fields["items"][0]["stock"], 3);
    assert!(!p2.has("stock"));

    let again = runner.run(&ProductSchemaMigration).await?;
    assert_eq!(again.updated, 0);
    Ok(())
}

#[tokio::test]
#[ignore = "needs a docker daemon"]
async fn order_dates_backfill_in_postgres() -> Result<()> {
    let (_container, store) = start_store().await?;
    store
        .upsert(
            PRODUCTS,
            "P1",
            &json!({"salesHistory": [{"roundId": "R1", "pickupDate": "D1", "pickupDeadlineDate": "D2"}]}),
        )
        .await?;
    store
        .upsert(ORDERS, "o1", &json!({"items": [{"productId": "P1", "roundId": "R1"}]}))
        .await?;

    let runner = MigrationRunner::new(store.clone());
    let summary = runner.run(&OrderDateBackfill).await?;
    assert_eq!(summary.updated, 1);

    let order = store.get(ORDERS, "o1").await?.expect("order exists");
    assert_eq!(order.get("pickupDate"), Some(&json!("D1")));
    assert_eq!(order.get("pickupDeadlineDate"), Some(&json!("D2")));
    Ok(())
}

#[tokio::test]
#[ignore = "needs a docker daemon"]
async fn commit_is_all_or_nothing() -> Result<()> {
    let (_container, store) = start_store().await?;
    store.upsert(PRODUCTS, "a", &json!({"name": "A"})).await?;

    let writes = vec![
        ("a".to_string(), Patch::builder().set("groupName", "A").build()),
        ("missing".to_string(), Patch::builder().set("groupName", "B").build()),
    ];
    let err = store
        .commit(PRODUCTS, &writes)
        .await
        .expect_err("missing document fails the batch");
    assert!(matches!(err, Error::DocNotFound { .. }));

    let a = store.get(PRODUCTS, "a").await?.expect("a exists");
    assert!(!a.has("groupName"));
    Ok(())
}
