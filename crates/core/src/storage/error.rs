use thiserror::Error;

/// Errors that can occur during table store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} was modified concurrently: {id}")]
    PreconditionFailed {
        entity_type: &'static str,
        id: String,
    },
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    /// Not-found error for the entity identified by the key pair.
    pub fn entity_not_found(partition_key: &str, row_key: &str) -> Self {
        Self::NotFound {
            entity_type: "Entity",
            id: entity_id(partition_key, row_key),
        }
    }

    /// Conflict error for an insert whose key pair is already taken.
    pub fn entity_exists(partition_key: &str, row_key: &str) -> Self {
        Self::AlreadyExists {
            entity_type: "Entity",
            id: entity_id(partition_key, row_key),
        }
    }
}

/// Human readable identifier for an entity, used in error messages.
pub fn entity_id(partition_key: &str, row_key: &str) -> String {
    format!("{partition_key}/{row_key}")
}

/// Result type for table store operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
