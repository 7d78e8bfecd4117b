use crate::{
    EntityId, Error, Field, Node, Record,
    allocator::next_id,
    keys::{Layout, UID, encode_uid},
    schema::{NodeTypeSchema, is_reserved},
    txn::KvTransaction,
    validator,
    value::encode_scalar,
};

pub type RelationId = EntityId;

/// Attribute records of relations, `(relation_type, relation_id, property) -> value`.
///
/// A relation knows nothing about the entities it connects; the owning
/// entity's link record points at it.
pub struct RelationStore<'a> {
    layout: &'a Layout,
}

impl<'a> RelationStore<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// Validates `attributes` against `schema`, mints a relation id and writes
    /// each attribute under it.
    pub async fn create<T: KvTransaction>(
        &self,
        txn: &mut T,
        relation_type: &str,
        schema: &NodeTypeSchema,
        attributes: &Record,
    ) -> Result<RelationId, Error> {
        if schema.is_empty() && attributes.keys().any(|k| !is_reserved(k)) {
            return Err(Error::MalformedRelationValue {
                type_name: relation_type.to_string(),
                property: attributes.keys().next().cloned().unwrap_or_default(),
                reason: "attributes supplied where none are declared",
            });
        }
        validator::validate_record(relation_type, schema, attributes)?;

        let mut encoded = Vec::with_capacity(attributes.len());
        for (property, value) in attributes {
            if is_reserved(property) {
                continue;
            }
            let kind = schema
                .get(property)
                .map(|p| &p.kind)
                .ok_or_else(|| Error::UndeclaredProperty {
                    type_name: relation_type.to_string(),
                    property: property.clone(),
                })?;
            let raw = encode_scalar(kind, value).ok_or_else(|| Error::UnencodableValue {
                type_name: relation_type.to_string(),
                property: property.clone(),
            })?;
            encoded.push((property, raw));
        }

        let relation_id = next_id(txn, self.layout.relation_counter(relation_type)).await?;
        txn.put(
            self.layout.relation_property(relation_type, relation_id, UID),
            encode_uid(relation_id),
        )
        .await?;
        for (property, raw) in encoded {
            txn.put(
                self.layout
                    .relation_property(relation_type, relation_id, property),
                raw,
            )
            .await?;
        }
        Ok(relation_id)
    }

    /// Reads the requested attributes of one relation.
    pub async fn attributes<T: KvTransaction>(
        &self,
        txn: &mut T,
        relation_type: &str,
        relation_id: RelationId,
        fields: impl Iterator<Item = &str>,
    ) -> Result<Node, Error> {
        let mut node = Node::new();
        for field in fields {
            let field_value = if field == UID {
                Field::Uid(relation_id)
            } else {
                Field::Scalar(
                    txn.get(self.layout.relation_property(relation_type, relation_id, field))
                        .await?,
                )
            };
            node.insert(field.to_string(), field_value);
        }
        Ok(node)
    }
}
