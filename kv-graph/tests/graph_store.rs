mod common;

use common::{config, setup, setup_with, user};
use kv_graph::{
    Error, Field, KvStore, KvTransaction, Layout, NodeTypeSchema, Projection,
    PropertySchema, RelationValue, Value, record,
};

#[tokio::test]
async fn unique_email_rejects_second_user() {
    let (_, db) = setup();

    let id = db.set("user", user("sif", "test@test.com")).await.unwrap();
    assert_eq!(id, 1);

    let err = db
        .set("user", user("sif2", "test@test.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UniqueConstraintViolation { ref property, .. } if property == "email"));

    assert_eq!(db.get_by("user", "name", "sif2").await.unwrap(), None);
    let found = db.get_by("user", "name", "sif").await.unwrap().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["uid"].as_uid(), Some(1));
}

#[tokio::test]
async fn ids_are_dense_and_survive_failures() {
    let (_, db) = setup();

    for n in 1..=3 {
        let id = db
            .set("user", user(&format!("u{n}"), &format!("u{n}@test.com")))
            .await
            .unwrap();
        assert_eq!(id, n);
    }

    // 每种失败都不能推进计数器
    db.set("user", user("dup", "u1@test.com")).await.unwrap_err();
    db.set("user", record! { "name" => 5 }).await.unwrap_err();
    db.set("user", record! { "nickname" => "x" }).await.unwrap_err();

    let id = db.set("user", user("u4", "u4@test.com")).await.unwrap();
    assert_eq!(id, 4);
}

#[tokio::test]
async fn counters_are_per_type() {
    let (_, db) = setup();

    assert_eq!(db.set("user", user("a", "a@test.com")).await.unwrap(), 1);
    assert_eq!(db.set("person", record! { "name" => "b" }).await.unwrap(), 1);
    assert_eq!(db.set("user", user("c", "c@test.com")).await.unwrap(), 2);
}

#[tokio::test]
async fn get_all_round_trips_scalars() {
    let (_, db) = setup();
    let id = db
        .set("person", record! { "name" => "ada", "age" => 36 })
        .await
        .unwrap();

    let node = db.get_all("person", id).await.unwrap().unwrap();
    assert_eq!(node["name"].as_str(), Some("ada"));
    assert_eq!(node["age"].as_i64(), Some(36));
    assert_eq!(node["uid"].as_uid(), Some(id));
    assert_eq!(node["follows"].as_targets(), Some(&[][..]));

    assert_eq!(db.get_all("person", 99).await.unwrap(), None);
    assert!(!db.exists("person", 99).await.unwrap());
}

#[tokio::test]
async fn unset_scalars_read_the_same_through_get_and_get_all() {
    let (_, db) = setup();
    let id = db.set("person", record! { "name" => "ada" }).await.unwrap();

    let all = db.get_all("person", id).await.unwrap().unwrap();
    assert_eq!(all["age"], Field::Scalar(None));

    let projected = db
        .get("person", id, &Projection::new().fields(["name", "age"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(projected.len(), 2);
    for field in ["name", "age"] {
        assert_eq!(projected.get(field), all.get(field), "{field}");
    }
}

#[tokio::test]
async fn projection_returns_exactly_requested_fields() {
    let (_, db) = setup();
    let id = db.set("user", user("sif", "sif@test.com")).await.unwrap();

    let projection = Projection::new().fields(["name", "email", "uid", "__node_name__"]);
    let node = db.get("user", id, &projection).await.unwrap().unwrap();
    assert_eq!(node.len(), 4);
    assert_eq!(node["name"].as_str(), Some("sif"));
    assert_eq!(node["email"].as_str(), Some("sif@test.com"));
    assert_eq!(node["uid"], Field::Uid(id));
    assert_eq!(node["__node_name__"].as_str(), Some("user"));

    let all = db.get_all("user", id).await.unwrap().unwrap();
    assert_eq!(node["name"], all["name"]);
    assert_eq!(node["email"], all["email"]);

    assert_eq!(db.get("user", 42, &projection).await.unwrap(), None);
}

#[tokio::test]
async fn messages_resolve_linked_users() {
    let (_, db) = setup();
    let sif = db.set("user", user("sif", "sif@test.com")).await.unwrap();
    let bob = db.set("user", user("bob", "bob@test.com")).await.unwrap();

    let msg = db
        .set(
            "msg",
            record! {
                "from_user" => RelationValue::existing(sif),
                "to_user" => RelationValue::existing(bob),
                "value" => "hello",
            },
        )
        .await
        .unwrap();
    assert_eq!(msg, 1);

    let projection = Projection::new()
        .field("value")
        .nested("from_user", Projection::new().fields(["name", "uid"]))
        .nested("to_user", Projection::new().field("name"));
    let node = db.get("msg", msg, &projection).await.unwrap().unwrap();

    assert_eq!(node["value"].as_str(), Some("hello"));
    let from = node["from_user"].as_nodes().unwrap();
    assert_eq!(from.len(), 1);
    assert_eq!(from[0]["name"].as_str(), Some("sif"));
    assert_eq!(from[0]["uid"].as_uid(), Some(sif));
    let to = node["to_user"].as_nodes().unwrap();
    assert_eq!(to[0]["name"].as_str(), Some("bob"));
    assert_eq!(to[0].len(), 1);

    let flat = db
        .get("msg", msg, &Projection::new().field("to_user"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flat["to_user"].as_targets(), Some(&[bob][..]));
}

#[tokio::test]
async fn new_target_is_created_in_the_same_write() {
    let (_, db) = setup();

    let msg = db
        .set(
            "msg",
            record! {
                "to_user" => RelationValue::new_target(user("neo", "neo@test.com")),
                "value" => "knock knock",
            },
        )
        .await
        .unwrap();

    let node = db.get_all("msg", msg).await.unwrap().unwrap();
    assert_eq!(node["to_user"].as_targets(), Some(&[1][..]));
    let created = db.get_unique("user", "email", "neo@test.com").await.unwrap().unwrap();
    assert_eq!(created["name"].as_str(), Some("neo"));
}

#[tokio::test]
async fn failed_nested_target_leaves_nothing_behind() {
    let (store, db) = setup();
    db.set("user", user("sif", "sif@test.com")).await.unwrap();
    let before = store.len();

    let err = db
        .set(
            "msg",
            record! {
                "from_user" => RelationValue::existing(1),
                "to_user" => RelationValue::new_target(user("sif2", "sif@test.com")),
                "value" => "hi",
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UniqueConstraintViolation { .. }));
    assert_eq!(store.len(), before);

    // 两个计数器都没有前进
    assert_eq!(db.set("user", user("ok", "ok@test.com")).await.unwrap(), 2);
    assert_eq!(
        db.set("msg", record! { "value" => "plain" }).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn dangling_reference_is_rejected() {
    let (store, db) = setup();

    let err = db
        .set(
            "msg",
            record! { "to_user" => RelationValue::existing(7), "value" => "void" },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DanglingReference { uid: 7, .. }));
    assert!(store.is_empty());
}

#[tokio::test]
async fn malformed_relation_values() {
    let (store, db) = setup();
    db.set("user", user("sif", "sif@test.com")).await.unwrap();
    let before = store.len();

    let empty = db
        .set(
            "msg",
            record! { "to_user" => RelationValue::new_target(record! {}) },
        )
        .await
        .unwrap_err();
    assert!(matches!(empty, Error::MalformedRelationValue { .. }));

    // msg.to_user 没有声明关系属性
    let stray = db
        .set(
            "msg",
            record! {
                "to_user" => RelationValue::existing(1).with_edge(record! { "since" => 1 }),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(stray, Error::MalformedRelationValue { .. }));

    let scalar = db
        .set("msg", record! { "to_user" => "sif" })
        .await
        .unwrap_err();
    assert!(matches!(scalar, Error::KindMismatch { .. }));

    assert_eq!(store.len(), before);
}

#[tokio::test]
async fn relation_attributes_are_stored_and_projected() {
    let (_, db) = setup();
    let ada = db.set("person", record! { "name" => "ada" }).await.unwrap();

    let missing = db
        .set(
            "person",
            record! { "name" => "bob", "follows" => RelationValue::existing(ada) },
        )
        .await
        .unwrap_err();
    assert!(matches!(missing, Error::MalformedRelationValue { .. }));

    let undeclared = db
        .set(
            "person",
            record! {
                "name" => "bob",
                "follows" => RelationValue::existing(ada).with_edge(record! { "until" => 1 }),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(undeclared, Error::UndeclaredProperty { ref property, .. } if property == "until"));

    let bob = db
        .set(
            "person",
            record! {
                "name" => "bob",
                "follows" => RelationValue::existing(ada).with_edge(record! { "since" => 2020 }),
            },
        )
        .await
        .unwrap();
    assert_eq!(bob, 2);

    let projection = Projection::new().nested(
        "follows",
        Projection::new()
            .field("name")
            .edge(Projection::new().fields(["since", "uid"])),
    );
    let node = db.get("person", bob, &projection).await.unwrap().unwrap();
    let follows = node["follows"].as_nodes().unwrap();
    assert_eq!(follows.len(), 1);
    assert_eq!(follows[0]["name"].as_str(), Some("ada"));
    let edge = follows[0]["__edge__"].as_edge().unwrap();
    assert_eq!(edge["since"].as_i64(), Some(2020));
    assert_eq!(edge["uid"].as_uid(), Some(1));
}

#[tokio::test]
async fn many_links_keep_insertion_order() {
    let (_, db) = setup();
    let a = db.set("person", record! { "name" => "a" }).await.unwrap();
    let b = db.set("person", record! { "name" => "b" }).await.unwrap();

    let c = db
        .set(
            "person",
            record! {
                "name" => "c",
                "friend" => vec![
                    RelationValue::existing(b),
                    RelationValue::existing(a),
                    RelationValue::new_target(record! { "name" => "d" }),
                ],
            },
        )
        .await
        .unwrap();

    let node = db.get_all("person", c).await.unwrap().unwrap();
    // d 的 id 在 c 之后分配
    assert_eq!(node["friend"].as_targets(), Some(&[b, a, c + 1][..]));

    let projection = Projection::new().nested("friend", Projection::new().field("name"));
    let node = db.get("person", c, &projection).await.unwrap().unwrap();
    let names: Vec<_> = node["friend"]
        .as_nodes()
        .unwrap()
        .iter()
        .map(|n| n["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["b", "a", "d"]);
}

#[tokio::test]
async fn malformed_projections_fail_before_reading() {
    let (_, db) = setup();
    db.set("user", user("sif", "sif@test.com")).await.unwrap();
    db.set(
        "msg",
        record! { "to_user" => RelationValue::existing(1), "value" => "hi" },
    )
    .await
    .unwrap();

    let cases = [
        Projection::new().field("nope"),
        Projection::new().nested("to_user", Projection::new().field("nope")),
        Projection::new().nested("value", Projection::new().field("name")),
        Projection::new().edge(Projection::new().field("since")),
        Projection::new().nested(
            "to_user",
            Projection::new().edge(Projection::new().field("since")),
        ),
    ];
    for projection in &cases {
        let err = db.get("msg", 1, projection).await.unwrap_err();
        assert!(
            matches!(err, Error::MalformedProjection { .. }),
            "{projection:?} gave {err:?}"
        );
    }

    // 实体不存在时同样校验
    let err = db.get("msg", 99, &cases[0]).await.unwrap_err();
    assert!(matches!(err, Error::MalformedProjection { .. }));
}

#[tokio::test]
async fn unknown_types_and_properties() {
    let (_, db) = setup();

    assert!(matches!(
        db.set("ghost", record! { "name" => "x" }).await.unwrap_err(),
        Error::UnknownType(ref t) if t == "ghost"
    ));
    assert!(matches!(
        db.get_all("ghost", 1).await.unwrap_err(),
        Error::UnknownType(_)
    ));
    assert!(matches!(
        db.get_by("user", "nickname", "x").await.unwrap_err(),
        Error::UndeclaredProperty { .. }
    ));
    assert!(matches!(
        db.get_by("msg", "to_user", "x").await.unwrap_err(),
        Error::UnencodableValue { .. }
    ));
    assert!(matches!(
        db.get_property("msg", 1, "to_user").await.unwrap_err(),
        Error::KindMismatch { .. }
    ));
}

#[tokio::test]
async fn get_by_finds_every_match() {
    let (_, db) = setup();
    db.set("person", record! { "name" => "x", "age" => 30 }).await.unwrap();
    db.set("person", record! { "name" => "y", "age" => 31 }).await.unwrap();
    db.set("person", record! { "name" => "z", "age" => "30" }).await.unwrap();

    let found = db.get_by("person", "age", 30).await.unwrap().unwrap();
    let uids: Vec<_> = found.iter().map(|n| n["uid"].as_uid().unwrap()).collect();
    assert_eq!(uids, [1, 3]);

    assert_eq!(
        db.get_property("person", 2, "age").await.unwrap(),
        Some(31i64.to_le_bytes().to_vec())
    );
}

#[tokio::test]
async fn get_unique_reports_index_corruption() {
    let config = config();
    let layout = Layout::new(config.namespace.clone());
    let (store, db) = setup_with(config);
    db.set("user", user("a", "a@test.com")).await.unwrap();
    db.set("user", user("b", "b@test.com")).await.unwrap();

    let one = db.get_unique("user", "email", "a@test.com").await.unwrap().unwrap();
    assert_eq!(one["uid"].as_uid(), Some(1));
    assert_eq!(db.get_unique("user", "email", "c@test.com").await.unwrap(), None);

    let mut txn = store.begin().await.unwrap();
    txn.put(
        layout.index_value("user", "email", b"a@test.com").uid(2).into(),
        Vec::new(),
    )
    .await
    .unwrap();
    txn.commit().await.unwrap();

    let err = db.get_unique("user", "email", "a@test.com").await.unwrap_err();
    assert!(matches!(err, Error::IndexCorruption { count: 2, .. }));
}

#[tokio::test]
async fn clear_removes_type_and_owned_relations() {
    let (store, db) = setup();
    db.set("user", user("sif", "sif@test.com")).await.unwrap();
    db.set(
        "msg",
        record! { "to_user" => RelationValue::existing(1), "value" => "hi" },
    )
    .await
    .unwrap();

    assert!(db.clear("msg").await.unwrap() > 0);
    assert_eq!(db.get_all("msg", 1).await.unwrap(), None);
    assert!(db.exists("user", 1).await.unwrap());

    let remaining = store.len();
    db.clear("user").await.unwrap();
    assert!(store.len() < remaining);
    assert!(store.is_empty());

    // 计数器重置，唯一索引也已清空
    assert_eq!(db.set("user", user("sif", "sif@test.com")).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_set_keeps_sibling_work_in_the_transaction() {
    let (_, db) = setup();
    let graph = db.graph();

    let mut txn = db.transaction().await.unwrap();
    let a = graph
        .set(&mut txn, "user", &user("a", "a@test.com"))
        .await
        .unwrap();
    let err = graph
        .set(&mut txn, "user", &user("dup", "a@test.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UniqueConstraintViolation { .. }));
    let b = graph
        .set(&mut txn, "user", &user("b", "b@test.com"))
        .await
        .unwrap();
    assert_eq!((a, b), (1, 2));

    // 提交前同一事务内可见
    assert!(graph.exists(&mut txn, "user", a).await.unwrap());
    txn.commit().await.unwrap();

    assert!(db.exists("user", a).await.unwrap());
    assert!(db.exists("user", b).await.unwrap());
    assert_eq!(db.get_by("user", "name", "dup").await.unwrap(), None);
}

#[tokio::test]
async fn rolled_back_transaction_writes_nothing() {
    let (store, db) = setup();

    let mut txn = db.transaction().await.unwrap();
    db.graph()
        .set(&mut txn, "user", &user("a", "a@test.com"))
        .await
        .unwrap();
    txn.rollback().await.unwrap();

    assert!(store.is_empty());
    assert_eq!(db.set("user", user("a", "a@test.com")).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_unique_writes_conflict() {
    let (_, db) = setup();
    let graph = db.graph();

    let mut first = db.transaction().await.unwrap();
    let mut second = db.transaction().await.unwrap();
    graph
        .set(&mut first, "user", &user("a", "same@test.com"))
        .await
        .unwrap();
    graph
        .set(&mut second, "user", &user("b", "same@test.com"))
        .await
        .unwrap();

    first.commit().await.unwrap();
    let err = second.commit().await.unwrap_err();
    assert!(matches!(err, Error::Conflict));
    assert!(err.is_retryable());

    // 重试时能看到已提交的记录
    let err = db.set("user", user("b", "same@test.com")).await.unwrap_err();
    assert!(matches!(err, Error::UniqueConstraintViolation { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn nesting_deeper_than_the_bound_fails() {
    let (store, db) = setup_with(config().with_max_depth(2));

    let chain = |leaf: &str| {
        let mut record = record! { "name" => leaf };
        for name in ["c", "b", "a"] {
            record = record! {
                "name" => name,
                "friend" => RelationValue::new_target(record),
            };
        }
        record
    };
    let err = db.set("person", chain("d")).await.unwrap_err();
    assert!(matches!(err, Error::DepthExceeded(2)));
    assert!(store.is_empty());

    let shallow = record! {
        "name" => "a",
        "friend" => RelationValue::new_target(record! {
            "name" => "b",
            "friend" => RelationValue::new_target(record! { "name" => "c" }),
        }),
    };
    let a = db.set("person", shallow).await.unwrap();

    let deep = Projection::new().nested(
        "friend",
        Projection::new().nested(
            "friend",
            Projection::new().nested("friend", Projection::new().field("name")),
        ),
    );
    assert!(matches!(
        db.get("person", a, &deep).await.unwrap_err(),
        Error::DepthExceeded(2)
    ));
}

#[tokio::test]
async fn registry_rejects_bad_declarations() {
    let (_, db) = setup();

    assert!(matches!(
        db.register("user", NodeTypeSchema::new()).unwrap_err(),
        Error::DuplicateType(_)
    ));
    assert!(matches!(
        db.register("a.b", NodeTypeSchema::new()).unwrap_err(),
        Error::InvalidTypeName(_)
    ));
    // 已有的声明不受影响
    let schema = db.registry().resolve("user").unwrap();
    assert!(schema.get("email").unwrap().is_unique());

    db.register(
        "tag",
        NodeTypeSchema::new().with("label", PropertySchema::string()),
    )
    .unwrap();
    let id = db
        .set("tag", [("label".to_string(), Value::from("rust"))].into())
        .await
        .unwrap();
    assert_eq!(id, 1);
}

#[tokio::test]
async fn signed_zero_is_one_float_value() {
    let (_, db) = setup();
    db.register(
        "reading",
        NodeTypeSchema::new().with("value", PropertySchema::float().unique()),
    )
    .unwrap();

    let id = db.set("reading", record! { "value" => -0.0 }).await.unwrap();
    let found = db.get_unique("reading", "value", 0.0).await.unwrap().unwrap();
    assert_eq!(found["uid"].as_uid(), Some(id));

    let err = db.set("reading", record! { "value" => 0.0 }).await.unwrap_err();
    assert!(matches!(err, Error::UniqueConstraintViolation { .. }));
}
