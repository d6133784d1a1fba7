//! Error types for ProjectDeck
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to a presentation layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Caller-supplied data failed a required-field or format check
    #[error("Validation error: {0}")]
    Validation(String),

    /// The entity exists but the caller lacks the rights for the action
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness rule would be broken (duplicate membership, tag name)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The action would break a structural rule, such as removing the owner
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// The task row exists but linking its tags or assignees failed.
    /// Association can be retried on its own with `task_id`.
    #[error("Failed to associate task {task_id}: {source}")]
    Association {
        task_id: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// True for failures of the persistence provider itself
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Storage(_))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
