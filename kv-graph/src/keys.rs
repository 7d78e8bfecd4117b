//! Ordered key layout.
//!
//! Keys are tuples packed so that byte order equals tuple order:
//!
//! | element | encoding                                                      |
//! |---------|---------------------------------------------------------------|
//! | bytes   | `0x02`, payload with `0x00` escaped as `0x00 0xff`, then `0x00` |
//! | u64     | `0x15`, 8 bytes big-endian                                    |
//!
//! Node regions live under `(namespace, "node", type)`, relation regions under
//! `(namespace, "edge", relation_type)`.

use std::ops::Range;

use crate::{EntityId, Error};

const BYTES_CODE: u8 = 0x02;
const INT_CODE: u8 = 0x15;

pub(crate) const UID: &str = "uid";
const INDEX: &str = "index";
const NODE_REGION: &str = "node";
const EDGE_REGION: &str = "edge";

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tuple(Vec<u8>);

impl Tuple {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.0.push(BYTES_CODE);
        for &b in value {
            self.0.push(b);
            if b == 0x00 {
                self.0.push(0xff);
            }
        }
        self.0.push(0x00);
        self
    }

    pub fn str(self, value: &str) -> Self {
        self.bytes(value.as_bytes())
    }

    pub fn uid(mut self, value: EntityId) -> Self {
        self.0.push(INT_CODE);
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Every key that extends this tuple by at least one element.
    pub fn range(&self) -> Range<Vec<u8>> {
        let mut end = self.0.clone();
        end.push(0xff);
        self.0.clone()..end
    }

    /// Every key that extends this tuple with a u64 element.
    pub fn uid_range(&self) -> Range<Vec<u8>> {
        let mut start = self.0.clone();
        start.push(INT_CODE);
        let mut end = self.0.clone();
        end.push(INT_CODE + 1);
        start..end
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Tuple> for Vec<u8> {
    fn from(t: Tuple) -> Self {
        t.0
    }
}

pub(crate) fn next_key(key: &[u8]) -> Vec<u8> {
    let mut next = key.to_vec();
    next.push(0x00);
    next
}

/// Reads the trailing u64 element of a packed key.
pub(crate) fn trailing_uid(key: &[u8]) -> Result<EntityId, Error> {
    let split = key
        .len()
        .checked_sub(9)
        .ok_or_else(|| Error::InvalidKey(format!("{key:?}")))?;
    let (head, tail) = key.split_at(split);
    if tail[0] != INT_CODE || head.is_empty() {
        return Err(Error::InvalidKey(format!("{key:?}")));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&tail[1..]);
    Ok(u64::from_be_bytes(buf))
}

pub(crate) fn encode_uid(uid: EntityId) -> Vec<u8> {
    uid.to_le_bytes().to_vec()
}

pub(crate) fn decode_uid(raw: &[u8]) -> Result<EntityId, Error> {
    let buf: [u8; 8] = raw
        .try_into()
        .map_err(|_| Error::InvalidKey(format!("uid value {raw:?}")))?;
    Ok(u64::from_le_bytes(buf))
}

/// Key builders for one namespace.
#[derive(Clone, Debug)]
pub struct Layout {
    namespace: String,
}

impl Layout {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn node_space(&self, type_name: &str) -> Tuple {
        Tuple::new()
            .str(&self.namespace)
            .str(NODE_REGION)
            .str(type_name)
    }

    pub fn edge_space(&self, relation_type: &str) -> Tuple {
        Tuple::new()
            .str(&self.namespace)
            .str(EDGE_REGION)
            .str(relation_type)
    }

    /// `(type, "uid")`
    pub fn node_counter(&self, type_name: &str) -> Vec<u8> {
        self.node_space(type_name).str(UID).into()
    }

    /// `(type, entity_id)`, prefix of every record of one entity.
    pub fn entity(&self, type_name: &str, uid: EntityId) -> Tuple {
        self.node_space(type_name).uid(uid)
    }

    /// `(type, entity_id, property)`
    pub fn entity_property(&self, type_name: &str, uid: EntityId, property: &str) -> Tuple {
        self.entity(type_name, uid).str(property)
    }

    /// `(type, entity_id, property, relation_id)`
    pub fn link(
        &self,
        type_name: &str,
        uid: EntityId,
        property: &str,
        relation_id: EntityId,
    ) -> Vec<u8> {
        self.entity_property(type_name, uid, property)
            .uid(relation_id)
            .into()
    }

    /// `(type, "index", property, encoded_value)`, prefix of the matching index entries.
    pub fn index_value(&self, type_name: &str, property: &str, encoded: &[u8]) -> Tuple {
        self.node_space(type_name)
            .str(INDEX)
            .str(property)
            .bytes(encoded)
    }

    pub fn relation_counter(&self, relation_type: &str) -> Vec<u8> {
        self.edge_space(relation_type).str(UID).into()
    }

    pub fn relation_property(&self, relation_type: &str, relation_id: EntityId, property: &str) -> Vec<u8> {
        self.edge_space(relation_type)
            .uid(relation_id)
            .str(property)
            .into()
    }

    /// Every relation region owned by `type_name`.
    pub fn owned_edge_spaces(&self, type_name: &str) -> Range<Vec<u8>> {
        let mut start: Vec<u8> = Tuple::new()
            .str(&self.namespace)
            .str(EDGE_REGION)
            .into();
        start.push(BYTES_CODE);
        start.extend_from_slice(relation_type(type_name, "").as_bytes());
        let mut end = start.clone();
        end.push(0xff);
        start..end
    }
}

/// Relations are typed by the property that declares them.
pub fn relation_type(type_name: &str, property: &str) -> String {
    format!("{type_name}.{property}")
}
