use std::collections::BTreeMap;

use crate::{EntityId, schema::PropertyKind};

/// Input record: property name to value.
pub type Record = BTreeMap<String, Value>;

/// Resolved entity: field name to stored field.
pub type Node = BTreeMap<String, Field>;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Relation(RelationValue),
    /// One link per element, in order.
    Relations(Vec<RelationValue>),
}

/// Value of a `NodeRef` property. `edge` holds the relation's own attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum RelationValue {
    ExistingTarget { id: EntityId, edge: Record },
    NewTarget { data: Record, edge: Record },
}

impl RelationValue {
    pub fn existing(id: EntityId) -> Self {
        RelationValue::ExistingTarget {
            id,
            edge: Record::new(),
        }
    }

    pub fn new_target(data: Record) -> Self {
        RelationValue::NewTarget {
            data,
            edge: Record::new(),
        }
    }

    pub fn with_edge(mut self, attributes: Record) -> Self {
        match &mut self {
            RelationValue::ExistingTarget { edge, .. } | RelationValue::NewTarget { edge, .. } => {
                *edge = attributes
            }
        }
        self
    }

    pub fn edge(&self) -> &Record {
        match self {
            RelationValue::ExistingTarget { edge, .. } | RelationValue::NewTarget { edge, .. } => edge,
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

macro_rules! impl_from_int {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )+
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<RelationValue> for Value {
    fn from(v: RelationValue) -> Self {
        Value::Relation(v)
    }
}

impl From<Vec<RelationValue>> for Value {
    fn from(v: Vec<RelationValue>) -> Self {
        Value::Relations(v)
    }
}

/// Builds a [`Record`] from `name => value` pairs.
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert(::std::string::String::from($name), $crate::Value::from($value)); )+
        record
    }};
}

/// Whether `value` is acceptable for a property of `kind`.
pub(crate) fn matches_kind(kind: &PropertyKind, value: &Value) -> bool {
    match (kind, value) {
        (PropertyKind::String, Value::Text(_)) => true,
        (PropertyKind::Int, Value::Int(_)) => true,
        (PropertyKind::Int, Value::Text(s)) => s.trim().parse::<i64>().is_ok(),
        (PropertyKind::Float, Value::Float(_) | Value::Int(_)) => true,
        (PropertyKind::Float, Value::Text(s)) => s.trim().parse::<f64>().is_ok(),
        (PropertyKind::NodeRef { .. }, Value::Relation(_) | Value::Relations(_)) => true,
        _ => false,
    }
}

/// Storage bytes for a scalar. `None` when the value has no encoding under `kind`.
pub fn encode_scalar(kind: &PropertyKind, value: &Value) -> Option<Vec<u8>> {
    match (kind, value) {
        (PropertyKind::String, Value::Text(s)) => Some(s.as_bytes().to_vec()),
        (PropertyKind::Int, Value::Int(i)) => Some(i.to_le_bytes().to_vec()),
        (PropertyKind::Int, Value::Text(s)) => {
            s.trim().parse::<i64>().ok().map(|i| i.to_le_bytes().to_vec())
        }
        (PropertyKind::Float, Value::Float(f)) => Some(float_bytes(*f)),
        (PropertyKind::Float, Value::Int(i)) => Some(float_bytes(*i as f64)),
        (PropertyKind::Float, Value::Text(s)) => s.trim().parse::<f64>().ok().map(float_bytes),
        _ => None,
    }
}

// -0.0 与 0.0 相等，索引和唯一约束需要相同的编码
fn float_bytes(f: f64) -> Vec<u8> {
    let f = if f == 0.0 { 0.0 } else { f };
    f.to_le_bytes().to_vec()
}

#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    /// Encoded scalar, `None` if the property was never written.
    Scalar(Option<Vec<u8>>),
    Uid(EntityId),
    NodeName(String),
    /// Link targets of a `NodeRef` property, ascending by relation id.
    Targets(Vec<EntityId>),
    /// Projected link targets, ascending by relation id.
    Nodes(Vec<Node>),
    /// Projected attributes of the relation behind a link.
    Edge(Node),
}

impl Field {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Field::Scalar(Some(raw)) => Some(raw),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::NodeName(name) => Some(name),
            _ => std::str::from_utf8(self.as_bytes()?).ok(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        Some(i64::from_le_bytes(self.as_bytes()?.try_into().ok()?))
    }

    pub fn as_f64(&self) -> Option<f64> {
        Some(f64::from_le_bytes(self.as_bytes()?.try_into().ok()?))
    }

    pub fn as_uid(&self) -> Option<EntityId> {
        match self {
            Field::Uid(uid) => Some(*uid),
            _ => None,
        }
    }

    pub fn as_targets(&self) -> Option<&[EntityId]> {
        match self {
            Field::Targets(targets) => Some(targets),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[Node]> {
        match self {
            Field::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Node> {
        match self {
            Field::Edge(edge) => Some(edge),
            _ => None,
        }
    }
}
