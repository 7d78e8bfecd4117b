//! Schema-driven graph storage on an ordered transactional key-value store.
//!
//! Node types are declared up front in a [`SchemaRegistry`]. Entities are
//! flattened into per-property records, `NodeRef` properties into link records
//! pointing through attribute-bearing relations, and every scalar gets an
//! equality index entry. All of it happens inside the caller's transaction.

extern crate self as kv_graph;

mod allocator;
mod buffer;
mod config;
mod db;
mod error;
mod index;
mod keys;
pub mod memory;
mod projection;
mod relation;
mod schema;
mod store;
mod txn;
mod validator;
mod value;

pub use allocator::next_id;
pub use buffer::WriteBuffer;
pub use config::Config;
pub use db::DB;
pub use error::Error;
pub use index::IndexMaintainer;
pub use keys::{Layout, Tuple, relation_type};
pub use kv_graph_derive::NodeType;
pub use memory::{MemoryStore, MemoryTransaction};
pub use projection::Projection;
pub use relation::{RelationId, RelationStore};
pub use schema::{
    IndexKind, NodeType, NodeTypeSchema, PropertyKind, PropertySchema, RESERVED_EDGE,
    RESERVED_NODE_NAME, RESERVED_UID, SchemaRegistry,
};
pub use store::GraphStore;
pub use txn::{KvPair, KvStore, KvTransaction};
pub use validator::check;
pub use value::{Field, Node, Record, RelationValue, Value, encode_scalar};

/// Per-type entity identifier, allocated from 1.
pub type EntityId = u64;
