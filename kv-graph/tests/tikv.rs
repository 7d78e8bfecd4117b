//! Runs against a live cluster: `KV_GRAPH_PD_ENDPOINTS=host:2379 cargo test -- --ignored`.

use kv_graph::{Config, DB, Error, NodeTypeSchema, Projection, PropertySchema, RelationValue, record};

#[tokio::test]
#[ignore]
async fn tikv_round_trip() -> Result<(), Error> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = Config::from_env().with_namespace(format!("kv-graph-{}", uuid::Uuid::new_v4()));
    let db = DB::connect(config).await?;

    db.register(
        "user",
        NodeTypeSchema::new()
            .with("name", PropertySchema::string())
            .with("email", PropertySchema::string().unique()),
    )?;
    db.register(
        "msg",
        NodeTypeSchema::new()
            .with("to_user", PropertySchema::node_ref("user"))
            .with("value", PropertySchema::string()),
    )?;

    let sif = db
        .set("user", record! { "name" => "sif", "email" => "test@test.com" })
        .await?;
    assert_eq!(sif, 1);
    let err = db
        .set("user", record! { "name" => "sif2", "email" => "test@test.com" })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UniqueConstraintViolation { .. }));
    assert!(db.get_by("user", "name", "sif2").await?.is_none());

    let msg = db
        .set(
            "msg",
            record! { "to_user" => RelationValue::existing(sif), "value" => "hi" },
        )
        .await?;
    let projection = Projection::new()
        .field("value")
        .nested("to_user", Projection::new().field("email"));
    let node = db.get("msg", msg, &projection).await?.unwrap();
    assert_eq!(
        node["to_user"].as_nodes().unwrap()[0]["email"].as_str(),
        Some("test@test.com")
    );

    db.clear("msg").await?;
    db.clear("user").await?;
    assert!(!db.exists("user", sif).await?);
    Ok(())
}
