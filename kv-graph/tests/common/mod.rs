#![allow(dead_code)]

use kv_graph::{Config, DB, MemoryStore, NodeTypeSchema, PropertySchema, Record, record};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config() -> Config {
    Config::default().with_namespace(format!("test-{}", uuid::Uuid::new_v4()))
}

pub fn user_schema() -> NodeTypeSchema {
    NodeTypeSchema::new()
        .with("name", PropertySchema::string())
        .with("email", PropertySchema::string().unique())
        .with("password", PropertySchema::string())
}

pub fn msg_schema() -> NodeTypeSchema {
    NodeTypeSchema::new()
        .with("from_user", PropertySchema::node_ref("user"))
        .with("to_user", PropertySchema::node_ref("user"))
        .with("value", PropertySchema::string())
}

pub fn person_schema() -> NodeTypeSchema {
    NodeTypeSchema::new()
        .with("name", PropertySchema::string())
        .with("age", PropertySchema::int())
        .with(
            "follows",
            PropertySchema::node_ref("person")
                .with_edge(NodeTypeSchema::new().with("since", PropertySchema::int())),
        )
        .with("friend", PropertySchema::node_ref("person"))
}

/// A fresh in-memory database with `user`, `msg` and `person` registered.
pub fn setup() -> (MemoryStore, DB<MemoryStore>) {
    setup_with(config())
}

pub fn setup_with(config: Config) -> (MemoryStore, DB<MemoryStore>) {
    init_logger();
    let store = MemoryStore::new();
    let db = DB::with_store(store.clone(), config);
    db.register("user", user_schema()).unwrap();
    db.register("msg", msg_schema()).unwrap();
    db.register("person", person_schema()).unwrap();
    (store, db)
}

pub fn user(name: &str, email: &str) -> Record {
    record! { "name" => name, "email" => email, "password" => "super_strong" }
}
