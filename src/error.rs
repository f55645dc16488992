//! Error types for dashguard

/// Domain error returned by every guard, evaluator and store operation.
///
/// The variants are transport-agnostic; [`DashError::status`] gives the
/// status an API boundary would normally map each kind to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DashError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{entity} cannot be deleted: still used by {count} {referrer}")]
    InUse {
        entity: String,
        referrer: String,
        count: usize,
    },

    #[error("menu cannot be its own parent")]
    SelfParent,

    #[error("maximum menu depth is {max} levels")]
    DepthExceeded { max: usize },

    #[error("menu has {count} child menu(s); delete them first")]
    HasChildren { count: usize },

    #[error("{0}")]
    SelfAction(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl DashError {
    pub fn not_found(what: impl Into<String>) -> Self {
        DashError::NotFound(what.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DashError::Validation { field: field.into(), message: message.into() }
    }

    pub fn forbidden(module: &str, action: &str) -> Self {
        DashError::Forbidden(format!("missing permission {}:{}", module, action))
    }

    /// Stable machine-readable code for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DashError::Unauthenticated => "unauthenticated",
            DashError::Forbidden(_) => "forbidden",
            DashError::NotFound(_) => "not_found",
            DashError::Validation { .. } => "validation",
            DashError::Conflict(_) => "conflict",
            DashError::InUse { .. } => "in_use",
            DashError::SelfParent => "self_parent",
            DashError::DepthExceeded { .. } => "depth_exceeded",
            DashError::HasChildren { .. } => "has_children",
            DashError::SelfAction(_) => "self_action",
            DashError::Storage(_) => "storage",
            DashError::Codec(_) => "codec",
        }
    }

    /// Suggested HTTP status for the API boundary.
    pub fn status(&self) -> u16 {
        match self {
            DashError::Unauthenticated => 401,
            DashError::Forbidden(_) => 403,
            DashError::NotFound(_) => 404,
            DashError::Conflict(_) => 409,
            DashError::Validation { .. }
            | DashError::InUse { .. }
            | DashError::SelfParent
            | DashError::DepthExceeded { .. }
            | DashError::HasChildren { .. }
            | DashError::SelfAction(_) => 400,
            DashError::Storage(_) | DashError::Codec(_) => 500,
        }
    }
}

impl From<serde_json::Error> for DashError {
    fn from(e: serde_json::Error) -> Self {
        DashError::Codec(e.to_string())
    }
}

/// Result type alias for dashguard operations
pub type Result<T> = std::result::Result<T, DashError>;

/// Convert a backend error into a storage error
pub fn err<E: std::error::Error>(e: E) -> DashError {
    DashError::Storage(e.to_string())
}
