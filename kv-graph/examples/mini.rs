use kv_graph::{Config, DB, Error, NodeType, Projection, RelationValue, record};

#[derive(NodeType)]
#[node(name = "user")]
pub struct User {
    pub name: String,

    #[unique]
    pub email: String,

    pub age: Option<i32>,
}

#[derive(NodeType)]
pub struct Sent {
    pub at: i64,
}

#[derive(NodeType)]
#[node(name = "msg")]
pub struct Msg {
    #[node_ref(target = "user", edge = "Sent")]
    pub from_user: RelationValue,

    #[node_ref(target = "user")]
    pub to_user: RelationValue,

    pub value: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let db = DB::connect(Config::from_env()).await?;
    db.register_type::<User>()?;
    db.register_type::<Msg>()?;

    db.clear("msg").await?;
    db.clear("user").await?;

    let alice = db
        .insert(User {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            age: Some(25),
        })
        .await?;

    let msg = db
        .insert(Msg {
            from_user: RelationValue::existing(alice).with_edge(record! { "at" => 1_700_000_000 }),
            to_user: RelationValue::new_target(record! {
                "name" => "Bob",
                "email" => "bob@example.com",
            }),
            value: "hello".to_string(),
        })
        .await?;

    if let Err(err) = db
        .set("user", record! { "name" => "Eve", "email" => "alice@example.com" })
        .await
    {
        println!("rejected: {err}");
    }

    let a = db.get_unique("user", "email", "alice@example.com").await?;
    println!("{:?}", a);

    let projection = Projection::new()
        .field("value")
        .nested(
            "from_user",
            Projection::new()
                .field("name")
                .edge(Projection::new().field("at")),
        )
        .nested("to_user", Projection::new().fields(["name", "uid"]));
    let b = db.get("msg", msg, &projection).await?;
    println!("{:?}", b);

    db.clear("msg").await?;
    db.clear("user").await?;

    Ok(())
}
