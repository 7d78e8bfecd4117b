use std::sync::Arc;

use tikv_client::TransactionClient;

use crate::{
    Config, EntityId, Error, GraphStore, Node, NodeType, NodeTypeSchema, Projection, Record,
    SchemaRegistry, Value,
    txn::{KvStore, KvTransaction},
};

/// A store client, its schema registry and the graph layer over them.
///
/// The one-shot methods each run in their own transaction, committed on
/// success and rolled back on error. Use [`DB::transaction`] with
/// [`DB::graph`] to compose several operations atomically.
#[derive(Clone)]
pub struct DB<S = TransactionClient> {
    pub(crate) client: S,
    graph: GraphStore,
}

impl DB<TransactionClient> {
    pub async fn new(pd_endpoints: Vec<String>) -> Result<Self, Error> {
        Self::connect(Config::default().with_pd_endpoints(pd_endpoints)).await
    }

    pub async fn connect(config: Config) -> Result<Self, Error> {
        let client = TransactionClient::new(config.pd_endpoints.clone())
            .await
            .map_err(Error::TikvError)?;
        log::debug!(
            "connected to {:?} under namespace {:?}",
            config.pd_endpoints,
            config.namespace
        );
        Ok(Self::with_store(client, config))
    }
}

impl<S: KvStore> DB<S> {
    pub fn with_store(client: S, config: Config) -> Self {
        let registry = Arc::new(SchemaRegistry::new());
        Self {
            client,
            graph: GraphStore::new(registry, &config),
        }
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.graph.registry()
    }

    pub fn register(&self, type_name: impl Into<String>, schema: NodeTypeSchema) -> Result<(), Error> {
        self.graph.registry().register(type_name, schema)
    }

    pub fn register_type<N: NodeType>(&self) -> Result<(), Error> {
        self.register(N::type_name(), N::schema())
    }

    pub async fn transaction(&self) -> Result<S::Transaction, Error> {
        self.client.begin().await
    }

    pub async fn set(&self, type_name: &str, record: Record) -> Result<EntityId, Error> {
        let mut txn = self.client.begin().await?;
        let result = self.graph.set(&mut txn, type_name, &record).await;
        finish(txn, result).await
    }

    pub async fn insert<N: NodeType>(&self, node: N) -> Result<EntityId, Error> {
        self.set(N::type_name(), node.into_record()).await
    }

    pub async fn get(
        &self,
        type_name: &str,
        uid: EntityId,
        projection: &Projection,
    ) -> Result<Option<Node>, Error> {
        let mut txn = self.client.begin().await?;
        let result = self.graph.get(&mut txn, type_name, uid, projection).await;
        finish(txn, result).await
    }

    pub async fn get_all(&self, type_name: &str, uid: EntityId) -> Result<Option<Node>, Error> {
        let mut txn = self.client.begin().await?;
        let result = self.graph.get_all(&mut txn, type_name, uid).await;
        finish(txn, result).await
    }

    pub async fn get_property(
        &self,
        type_name: &str,
        uid: EntityId,
        property: &str,
    ) -> Result<Option<Vec<u8>>, Error> {
        let mut txn = self.client.begin().await?;
        let result = self.graph.get_property(&mut txn, type_name, uid, property).await;
        finish(txn, result).await
    }

    pub async fn get_by(
        &self,
        type_name: &str,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Vec<Node>>, Error> {
        let value = value.into();
        let mut txn = self.client.begin().await?;
        let result = self.graph.get_by(&mut txn, type_name, property, &value).await;
        finish(txn, result).await
    }

    pub async fn get_unique(
        &self,
        type_name: &str,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Node>, Error> {
        let value = value.into();
        let mut txn = self.client.begin().await?;
        let result = self.graph.get_unique(&mut txn, type_name, property, &value).await;
        finish(txn, result).await
    }

    pub async fn exists(&self, type_name: &str, uid: EntityId) -> Result<bool, Error> {
        let mut txn = self.client.begin().await?;
        let result = self.graph.exists(&mut txn, type_name, uid).await;
        finish(txn, result).await
    }

    pub async fn clear(&self, type_name: &str) -> Result<usize, Error> {
        let mut txn = self.client.begin().await?;
        let result = self.graph.clear(&mut txn, type_name).await;
        finish(txn, result).await
    }
}

async fn finish<T: KvTransaction, R>(mut txn: T, result: Result<R, Error>) -> Result<R, Error> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            txn.rollback().await?;
            Err(err)
        }
    }
}
