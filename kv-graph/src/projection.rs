use std::collections::BTreeMap;

use futures::future::BoxFuture;

use crate::{
    EntityId, Error, Field, GraphStore, Node,
    keys::relation_type,
    schema::{NodeTypeSchema, PropertyKind, RESERVED_EDGE, RESERVED_NODE_NAME, RESERVED_UID},
    txn::KvTransaction,
};

/// Tree of fields to read. A `NodeRef` field with a sub-projection is expanded
/// into its linked entities; without one it yields the target ids.
///
/// Inside a `NodeRef` sub-projection, `__edge__` selects attributes of the
/// relation behind each link.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projection(BTreeMap<String, Option<Projection>>);

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.0.insert(name.into(), None);
        self
    }

    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.0.insert(name.into(), None);
        }
        self
    }

    pub fn nested(mut self, name: impl Into<String>, sub: Projection) -> Self {
        self.0.insert(name.into(), Some(sub));
        self
    }

    /// Selects relation attributes; only meaningful inside a `NodeRef` sub-projection.
    pub fn edge(self, sub: Projection) -> Self {
        self.nested(RESERVED_EDGE, sub)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<Projection>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl GraphStore {
    /// Reads the fields named by `projection`. Fails on any undeclared field
    /// anywhere in the tree before touching storage.
    pub async fn get<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        uid: EntityId,
        projection: &Projection,
    ) -> Result<Option<Node>, Error> {
        self.check_projection(type_name, projection, None, 0)?;
        if !self.exists(txn, type_name, uid).await? {
            return Ok(None);
        }
        self.resolve(txn, type_name, uid, projection, 0).await.map(Some)
    }

    fn check_projection(
        &self,
        type_name: &str,
        projection: &Projection,
        edge: Option<&NodeTypeSchema>,
        depth: usize,
    ) -> Result<(), Error> {
        if depth > self.max_depth {
            return Err(Error::DepthExceeded(self.max_depth));
        }
        let schema = self.registry.require(type_name)?;
        let malformed = |field: &str| Error::MalformedProjection {
            type_name: type_name.to_string(),
            field: field.to_string(),
        };

        for (field, sub) in projection.iter() {
            if field == RESERVED_UID || field == RESERVED_NODE_NAME {
                continue;
            }
            if field == RESERVED_EDGE {
                let (Some(edge), Some(sub)) = (edge, sub) else {
                    return Err(malformed(field));
                };
                if let Some(bad) = sub
                    .iter()
                    .map(|(name, _)| name)
                    .find(|name| name.as_str() != RESERVED_UID && edge.get(name).is_none())
                {
                    return Err(malformed(bad));
                }
                continue;
            }
            let declared = schema.get(field).ok_or_else(|| malformed(field))?;
            match (&declared.kind, sub) {
                (PropertyKind::NodeRef { target, edge }, Some(sub)) => {
                    self.check_projection(target, sub, Some(edge), depth + 1)?;
                }
                (PropertyKind::NodeRef { .. }, None) => {}
                (_, Some(_)) => return Err(malformed(field)),
                (_, None) => {}
            }
        }
        Ok(())
    }

    fn resolve<'a, T>(
        &'a self,
        txn: &'a mut T,
        type_name: &'a str,
        uid: EntityId,
        projection: &'a Projection,
        depth: usize,
    ) -> BoxFuture<'a, Result<Node, Error>>
    where
        T: KvTransaction + 'a,
    {
        Box::pin(async move {
            if depth > self.max_depth {
                return Err(Error::DepthExceeded(self.max_depth));
            }
            let schema = self.registry.require(type_name)?;
            let mut node = Node::new();

            for (field, sub) in projection.iter() {
                let value = match field.as_str() {
                    RESERVED_NODE_NAME => Field::NodeName(type_name.to_string()),
                    RESERVED_UID => Field::Uid(uid),
                    RESERVED_EDGE => continue,
                    _ => {
                        let declared = schema.get(field).ok_or_else(|| Error::MalformedProjection {
                            type_name: type_name.to_string(),
                            field: field.clone(),
                        })?;
                        match (&declared.kind, sub) {
                            (PropertyKind::NodeRef { target, .. }, Some(sub)) => Field::Nodes(
                                self.resolve_links(txn, type_name, uid, field, target, sub, depth)
                                    .await?,
                            ),
                            (PropertyKind::NodeRef { .. }, None) => Field::Targets(
                                self.links(txn, type_name, uid, field)
                                    .await?
                                    .into_iter()
                                    .map(|(_, target)| target)
                                    .collect(),
                            ),
                            _ => Field::Scalar(
                                txn.get(self.layout.entity_property(type_name, uid, field).into())
                                    .await?,
                            ),
                        }
                    }
                };
                node.insert(field.clone(), value);
            }
            Ok(node)
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_links<T: KvTransaction>(
        &self,
        txn: &mut T,
        type_name: &str,
        uid: EntityId,
        property: &str,
        target: &str,
        sub: &Projection,
        depth: usize,
    ) -> Result<Vec<Node>, Error> {
        let relation_type = relation_type(type_name, property);
        let edge_fields = sub
            .iter()
            .find(|(name, _)| name.as_str() == RESERVED_EDGE)
            .and_then(|(_, edge)| edge.as_ref());

        let mut nodes = Vec::new();
        for (relation_id, target_uid) in self.links(txn, type_name, uid, property).await? {
            let mut node = self.resolve(txn, target, target_uid, sub, depth + 1).await?;
            if let Some(edge_fields) = edge_fields {
                let edge = self
                    .relations()
                    .attributes(
                        txn,
                        &relation_type,
                        relation_id,
                        edge_fields.iter().map(|(name, _)| name.as_str()),
                    )
                    .await?;
                node.insert(RESERVED_EDGE.to_string(), Field::Edge(edge));
            }
            nodes.push(node);
        }
        Ok(nodes)
    }
}
