use crate::{
    Error, Record, Value,
    schema::{NodeTypeSchema, is_reserved},
    value::matches_kind,
};

/// Whether `value` may be stored under `property`. Undeclared properties never pass.
pub fn check(schema: &NodeTypeSchema, property: &str, value: &Value) -> bool {
    match schema.get(property) {
        Some(declared) => matches_kind(&declared.kind, value),
        None => false,
    }
}

/// Checks every non-reserved field of `record`, reporting the first failure.
pub(crate) fn validate_record(
    type_name: &str,
    schema: &NodeTypeSchema,
    record: &Record,
) -> Result<(), Error> {
    for (property, value) in record {
        if is_reserved(property) || check(schema, property, value) {
            continue;
        }
        let err = if schema.get(property).is_none() {
            Error::UndeclaredProperty {
                type_name: type_name.to_string(),
                property: property.clone(),
            }
        } else {
            Error::KindMismatch {
                type_name: type_name.to_string(),
                property: property.clone(),
            }
        };
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PropertySchema, RelationValue, record};

    fn msg() -> NodeTypeSchema {
        NodeTypeSchema::new()
            .with("value", PropertySchema::string())
            .with("score", PropertySchema::int())
            .with("to_user", PropertySchema::node_ref("user"))
    }

    #[test]
    fn dispatches_on_kind() {
        let schema = msg();
        assert!(check(&schema, "value", &Value::from("hi")));
        assert!(!check(&schema, "value", &Value::Int(1)));
        assert!(check(&schema, "score", &Value::from("12")));
        assert!(!check(&schema, "score", &Value::from("twelve")));
        assert!(check(
            &schema,
            "to_user",
            &RelationValue::existing(1).into()
        ));
        assert!(!check(&schema, "to_user", &Value::Int(1)));
        assert!(!check(&schema, "missing", &Value::from("x")));
    }

    #[test]
    fn record_errors_name_the_field() {
        let schema = msg();
        let err = validate_record("msg", &schema, &record! { "nope" => "x" }).unwrap_err();
        assert!(matches!(err, Error::UndeclaredProperty { property, .. } if property == "nope"));
        let err = validate_record("msg", &schema, &record! { "score" => 1.5 }).unwrap_err();
        assert!(matches!(err, Error::KindMismatch { property, .. } if property == "score"));
        assert!(validate_record("msg", &schema, &record! { "uid" => 9, "value" => "ok" }).is_ok());
    }
}
