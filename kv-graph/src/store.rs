use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{
    Config, EntityId, Error, Field, Node, Record, RelationValue, Value,
    buffer::WriteBuffer,
    index::IndexMaintainer,
    keys::{Layout, UID, decode_uid, encode_uid, relation_type, trailing_uid},
    relation::{RelationId, RelationStore},
    schema::{NodeTypeSchema, PropertyKind, PropertySchema, SchemaRegistry, is_reserved},
    txn::{KvTransaction, scan_all},
    validator::validate_record,
    value::encode_scalar,
};

/// Entity storage over a caller-supplied transaction.
///
/// Every operation runs inside the transaction handed to it and never commits
/// it. A failed [`GraphStore::set`] leaves the transaction as it found it, so
/// several operations can be composed in one transaction by the caller.
#[derive(Clone)]
pub struct GraphStore {
    pub(crate) registry: Arc<SchemaRegistry>,
    pub(crate) layout: Layout,
    pub(crate) page_size: u32,
    pub(crate) max_depth: usize,
}

impl GraphStore {
    pub fn new(registry: Arc<SchemaRegistry>, config: &Config) -> Self {
        Self {
            registry,
            layout: Layout::new(config.namespace.clone()),
            page_size: config.scan_page_size.max(1),
            max_depth: config.max_depth,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub(crate) fn index(&self) -> IndexMaintainer<'_> {
        IndexMaintainer::new(&self.layout, self.page_size)
    }

    pub(crate) fn relations(&self) -> RelationStore<'_> {
        RelationStore::new(&self.layout)
    }

    /// Creates an entity of `type_name` from `record`, including any entities
    /// and relations nested in its `NodeRef` values.
    ///
    /// All writes are staged and reach `txn` only if every field succeeds.
    pub async fn set<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        record: &Record,
    ) -> Result<EntityId, Error> {
        let mut buffer = WriteBuffer::new(txn);
        match self.set_node(&mut buffer, type_name, record, 0).await {
            Ok(uid) => {
                let staged = buffer.len();
                buffer.commit().await?;
                log::debug!("created {type_name} {uid} ({staged} records)");
                Ok(uid)
            }
            Err(err) => {
                buffer.rollback().await?;
                log::warn!("rejected write to {type_name}: {err}");
                Err(err)
            }
        }
    }

    fn set_node<'a, 't, T>(
        &'a self,
        buffer: &'a mut WriteBuffer<'t, T>,
        type_name: &'a str,
        record: &'a Record,
        depth: usize,
    ) -> BoxFuture<'a, Result<EntityId, Error>>
    where
        T: KvTransaction + 'a,
        't: 'a,
    {
        Box::pin(async move {
            if depth > self.max_depth {
                return Err(Error::DepthExceeded(self.max_depth));
            }
            let schema = self.registry.require(type_name)?;
            validate_record(type_name, &schema, record)?;

            // 分配 id 并写入保留的 uid 字段
            let uid = crate::allocator::next_id(buffer, self.layout.node_counter(type_name)).await?;
            buffer
                .put(
                    self.layout.entity_property(type_name, uid, UID).into(),
                    encode_uid(uid),
                )
                .await?;

            for (property, value) in record {
                if is_reserved(property) {
                    continue;
                }
                let declared = schema.get(property).ok_or_else(|| Error::UndeclaredProperty {
                    type_name: type_name.to_string(),
                    property: property.clone(),
                })?;
                match (&declared.kind, value) {
                    (PropertyKind::NodeRef { target, edge }, Value::Relation(relation)) => {
                        self.link(buffer, type_name, uid, property, target, edge, relation, depth)
                            .await?;
                    }
                    (PropertyKind::NodeRef { target, edge }, Value::Relations(relations)) => {
                        for relation in relations {
                            self.link(buffer, type_name, uid, property, target, edge, relation, depth)
                                .await?;
                        }
                    }
                    _ => {
                        self.write_scalar(buffer, type_name, uid, property, declared, value)
                            .await?;
                    }
                }
            }
            Ok(uid)
        })
    }

    async fn write_scalar<T: KvTransaction>(
        &self,
        buffer: &mut WriteBuffer<'_, T>,
        type_name: &str,
        uid: EntityId,
        property: &str,
        declared: &PropertySchema,
        value: &Value,
    ) -> Result<(), Error> {
        let encoded = encode_scalar(&declared.kind, value).ok_or_else(|| Error::UnencodableValue {
            type_name: type_name.to_string(),
            property: property.to_string(),
        })?;

        let index = self.index();
        if declared.is_unique()
            && !index
                .check_unique(buffer, type_name, property, &encoded)
                .await?
        {
            return Err(Error::UniqueConstraintViolation {
                type_name: type_name.to_string(),
                property: property.to_string(),
            });
        }

        buffer
            .put(
                self.layout.entity_property(type_name, uid, property).into(),
                encoded.clone(),
            )
            .await?;
        // 写入索引
        index.write(buffer, type_name, property, &encoded, uid).await
    }

    /// Mints the relation, resolves or creates the target, then writes the link.
    #[allow(clippy::too_many_arguments)]
    async fn link<'t, T: KvTransaction>(
        &self,
        buffer: &mut WriteBuffer<'t, T>,
        type_name: &str,
        uid: EntityId,
        property: &str,
        target: &str,
        edge: &NodeTypeSchema,
        relation: &RelationValue,
        depth: usize,
    ) -> Result<(), Error> {
        let malformed = |reason| Error::MalformedRelationValue {
            type_name: type_name.to_string(),
            property: property.to_string(),
            reason,
        };
        if let RelationValue::NewTarget { data, .. } = relation {
            if data.is_empty() {
                return Err(malformed("target data is empty"));
            }
        }
        if !edge.is_empty() && relation.edge().is_empty() {
            return Err(malformed("relation attributes are required"));
        }

        let relation_type = relation_type(type_name, property);
        let relation_id = self
            .relations()
            .create(buffer, &relation_type, edge, relation.edge())
            .await?;

        let target_uid = match relation {
            RelationValue::ExistingTarget { id, .. } => {
                self.registry.require(target)?;
                let present = buffer
                    .get(self.layout.entity_property(target, *id, UID).into())
                    .await?;
                if present.is_none() {
                    return Err(Error::DanglingReference {
                        type_name: target.to_string(),
                        uid: *id,
                    });
                }
                *id
            }
            RelationValue::NewTarget { data, .. } => {
                // 嵌套创建失败时只回滚自己的写入
                buffer.savepoint();
                match self.set_node(buffer, target, data, depth + 1).await {
                    Ok(id) => {
                        buffer.release();
                        id
                    }
                    Err(err) => {
                        buffer.rollback_to();
                        return Err(err);
                    }
                }
            }
        };

        buffer
            .put(
                self.layout.link(type_name, uid, property, relation_id),
                encode_uid(target_uid),
            )
            .await
    }

    /// Whether an entity with `uid` was created in `type_name`.
    pub async fn exists<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        uid: EntityId,
    ) -> Result<bool, Error> {
        Ok(txn
            .get(self.layout.entity_property(type_name, uid, UID).into())
            .await?
            .is_some())
    }

    /// `(relation_id, target_id)` for every link of `property`, ascending by relation id.
    pub async fn links<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        uid: EntityId,
        property: &str,
    ) -> Result<Vec<(RelationId, EntityId)>, Error> {
        let range = self
            .layout
            .entity_property(type_name, uid, property)
            .uid_range();
        scan_all(txn, range, self.page_size)
            .await?
            .iter()
            .map(|(key, value)| -> Result<_, Error> { Ok((trailing_uid(key)?, decode_uid(value)?)) })
            .collect()
    }

    /// Every declared property of one entity plus its `uid`. `NodeRef`
    /// properties yield their link targets, unexpanded; unset scalars yield
    /// `Field::Scalar(None)`.
    pub async fn get_all<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        uid: EntityId,
    ) -> Result<Option<Node>, Error> {
        let schema = self.registry.require(type_name)?;
        if !self.exists(txn, type_name, uid).await? {
            return Ok(None);
        }

        let mut node = Node::new();
        for (property, declared) in schema.iter() {
            if declared.kind.is_node_ref() {
                let targets = self
                    .links(txn, type_name, uid, property)
                    .await?
                    .into_iter()
                    .map(|(_, target)| target)
                    .collect();
                node.insert(property.clone(), Field::Targets(targets));
            } else {
                // 未写入的属性也返回，与 get 的投影结果一致
                let raw = txn
                    .get(self.layout.entity_property(type_name, uid, property).into())
                    .await?;
                node.insert(property.clone(), Field::Scalar(raw));
            }
        }
        node.insert(UID.to_string(), Field::Uid(uid));
        Ok(Some(node))
    }

    /// Encoded value of one scalar property.
    pub async fn get_property<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        uid: EntityId,
        property: &str,
    ) -> Result<Option<Vec<u8>>, Error> {
        let schema = self.registry.require(type_name)?;
        match schema.get(property) {
            None => Err(Error::UndeclaredProperty {
                type_name: type_name.to_string(),
                property: property.to_string(),
            }),
            Some(declared) if declared.kind.is_node_ref() => Err(Error::KindMismatch {
                type_name: type_name.to_string(),
                property: property.to_string(),
            }),
            Some(_) => {
                txn.get(self.layout.entity_property(type_name, uid, property).into())
                    .await
            }
        }
    }

    /// Every entity whose `property` equals `value`, or `None` if there are none.
    pub async fn get_by<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        property: &str,
        value: &Value,
    ) -> Result<Option<Vec<Node>>, Error> {
        let schema = self.registry.require(type_name)?;
        let declared = schema.get(property).ok_or_else(|| Error::UndeclaredProperty {
            type_name: type_name.to_string(),
            property: property.to_string(),
        })?;
        let encoded = encode_scalar(&declared.kind, value).ok_or_else(|| Error::UnencodableValue {
            type_name: type_name.to_string(),
            property: property.to_string(),
        })?;

        let uids = self
            .index()
            .lookup(txn, type_name, property, &encoded)
            .await?;
        let mut nodes = Vec::with_capacity(uids.len());
        for uid in uids {
            if let Some(node) = self.get_all(txn, type_name, uid).await? {
                nodes.push(node);
            }
        }
        if nodes.is_empty() {
            return Ok(None);
        }
        Ok(Some(nodes))
    }

    /// Like [`GraphStore::get_by`] but asserts at most one match.
    pub async fn get_unique<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        property: &str,
        value: &Value,
    ) -> Result<Option<Node>, Error> {
        let Some(mut nodes) = self.get_by(txn, type_name, property, value).await? else {
            return Ok(None);
        };
        if nodes.len() > 1 {
            return Err(Error::IndexCorruption {
                type_name: type_name.to_string(),
                property: property.to_string(),
                count: nodes.len(),
            });
        }
        Ok(nodes.pop())
    }

    /// Deletes every record of `type_name`: entities, links, index entries,
    /// the counter, and the relations its properties own.
    pub async fn clear<T: KvTransaction>(&self, txn: &mut T, type_name: &str) -> Result<usize, Error> {
        let mut deleted = 0;
        for range in [
            self.layout.node_space(type_name).range(),
            self.layout.owned_edge_spaces(type_name),
        ] {
            for (key, _) in scan_all(txn, range, self.page_size).await? {
                txn.delete(key).await?;
                deleted += 1;
            }
        }
        log::debug!("cleared {type_name}: {deleted} keys");
        Ok(deleted)
    }
}
