use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Error, Record};

/// Never stored as ordinary properties, always projectable.
pub const RESERVED_UID: &str = "uid";
pub const RESERVED_NODE_NAME: &str = "__node_name__";
/// Addresses the relation attributes inside a `NodeRef` sub-projection.
pub const RESERVED_EDGE: &str = "__edge__";

pub fn is_reserved(name: &str) -> bool {
    name == RESERVED_UID || name == RESERVED_NODE_NAME
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyKind {
    String,
    Int,
    Float,
    /// Reference to an entity of `target`; the relation itself may carry the
    /// attributes declared in `edge`.
    NodeRef {
        target: String,
        edge: NodeTypeSchema,
    },
}

impl PropertyKind {
    pub fn is_node_ref(&self) -> bool {
        matches!(self, PropertyKind::NodeRef { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKind {
    Unique,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertySchema {
    pub kind: PropertyKind,
    pub indexes: BTreeSet<IndexKind>,
}

impl PropertySchema {
    pub fn new(kind: PropertyKind) -> Self {
        Self {
            kind,
            indexes: BTreeSet::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(PropertyKind::String)
    }

    pub fn int() -> Self {
        Self::new(PropertyKind::Int)
    }

    pub fn float() -> Self {
        Self::new(PropertyKind::Float)
    }

    pub fn node_ref(target: impl Into<String>) -> Self {
        Self::new(PropertyKind::NodeRef {
            target: target.into(),
            edge: NodeTypeSchema::new(),
        })
    }

    /// Declares the attributes carried by the relation. No effect on scalar kinds.
    pub fn with_edge(mut self, schema: NodeTypeSchema) -> Self {
        if let PropertyKind::NodeRef { edge, .. } = &mut self.kind {
            *edge = schema;
        }
        self
    }

    pub fn unique(mut self) -> Self {
        self.indexes.insert(IndexKind::Unique);
        self
    }

    pub fn is_unique(&self) -> bool {
        self.indexes.contains(&IndexKind::Unique)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeTypeSchema(BTreeMap<String, PropertySchema>);

impl NodeTypeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, property: PropertySchema) -> Self {
        self.0.insert(name.into(), property);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropertySchema> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertySchema)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn check_names(&self, type_name: &str) -> Result<(), Error> {
        for (name, property) in self.iter() {
            if is_reserved(name) || name == RESERVED_EDGE || name.is_empty() {
                return Err(Error::UndeclaredProperty {
                    type_name: type_name.to_string(),
                    property: name.clone(),
                });
            }
            if let PropertyKind::NodeRef { edge, .. } = &property.kind {
                if property.is_unique() {
                    return Err(Error::KindMismatch {
                        type_name: type_name.to_string(),
                        property: name.clone(),
                    });
                }
                edge.check_edge_names(type_name)?;
            }
        }
        Ok(())
    }

    // 关系属性只能是非唯一的标量
    fn check_edge_names(&self, type_name: &str) -> Result<(), Error> {
        self.check_names(type_name)?;
        for (name, property) in self.iter() {
            if property.kind.is_node_ref() || property.is_unique() {
                return Err(Error::KindMismatch {
                    type_name: type_name.to_string(),
                    property: name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, PropertySchema)> for NodeTypeSchema {
    fn from_iter<I: IntoIterator<Item = (String, PropertySchema)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 由 `#[derive(NodeType)]` 实现。
pub trait NodeType {
    /// 返回注册用的类型名
    fn type_name() -> &'static str;

    /// 返回属性声明
    fn schema() -> NodeTypeSchema;

    /// 转换为写入用的记录，`None` 字段不写入
    fn into_record(self) -> Record;
}

/// Node type name to schema. Types are registered once and never removed;
/// references between types are resolved by name on use.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: RwLock<HashMap<String, Arc<NodeTypeSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, type_name: impl Into<String>, schema: NodeTypeSchema) -> Result<(), Error> {
        let type_name = type_name.into();
        if type_name.is_empty() || type_name.contains('.') {
            return Err(Error::InvalidTypeName(type_name));
        }
        schema.check_names(&type_name)?;

        let mut types = self.types.write();
        if types.contains_key(&type_name) {
            return Err(Error::DuplicateType(type_name));
        }
        log::debug!("registered node type {type_name} ({} properties)", schema.len());
        types.insert(type_name, Arc::new(schema));
        Ok(())
    }

    pub fn resolve(&self, type_name: &str) -> Option<Arc<NodeTypeSchema>> {
        self.types.read().get(type_name).cloned()
    }

    pub(crate) fn require(&self, type_name: &str) -> Result<Arc<NodeTypeSchema>, Error> {
        self.resolve(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }
}
