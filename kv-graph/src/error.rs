#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("TiKV error: {0}")]
    TikvError(#[from] tikv_client::Error),
    #[error("Transaction conflict")]
    Conflict,
    #[error("Node type already registered: {0}")]
    DuplicateType(String),
    #[error("Invalid node type name: {0:?}")]
    InvalidTypeName(String),
    #[error("Unknown node type: {0}")]
    UnknownType(String),
    #[error("Undeclared property {property} on {type_name}")]
    UndeclaredProperty { type_name: String, property: String },
    #[error("Value of {type_name}.{property} does not match its declared kind")]
    KindMismatch { type_name: String, property: String },
    #[error("Unique constraint violated on {type_name}.{property}")]
    UniqueConstraintViolation { type_name: String, property: String },
    #[error("Malformed relation value for {type_name}.{property}: {reason}")]
    MalformedRelationValue {
        type_name: String,
        property: String,
        reason: &'static str,
    },
    #[error("{type_name} has no entity with uid {uid}")]
    DanglingReference { type_name: String, uid: u64 },
    #[error("Value of {type_name}.{property} cannot be encoded")]
    UnencodableValue { type_name: String, property: String },
    #[error("Projection on {type_name} names undeclared field {field}")]
    MalformedProjection { type_name: String, field: String },
    #[error("Recursion depth exceeded ({0})")]
    DepthExceeded(usize),
    #[error("Unique index {type_name}.{property} resolves to {count} entities")]
    IndexCorruption {
        type_name: String,
        property: String,
        count: usize,
    },
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl Error {
    /// Store-level conflicts are the only errors worth retrying the whole
    /// transaction for; everything else is a caller or schema error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Conflict => true,
            Error::TikvError(e) => tikv_retryable(e),
            _ => false,
        }
    }
}

// 预写和提交阶段的冲突会被包装在 ExtractedErrors / MultipleKeyErrors 中
fn tikv_retryable(err: &tikv_client::Error) -> bool {
    match err {
        tikv_client::Error::KeyError(..) | tikv_client::Error::RegionError(..) => true,
        tikv_client::Error::ExtractedErrors(errors)
        | tikv_client::Error::MultipleKeyErrors(errors) => errors.iter().any(tikv_retryable),
        _ => false,
    }
}
