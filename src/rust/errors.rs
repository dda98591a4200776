use thiserror::Error;

use crate::types::Kind;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("No {kind} found with key {key}")]
    NotFound { kind: Kind, key: String },

    #[error("Cannot decode shard {key}.{shard}: {message}")]
    Decode { key: String, shard: String, message: String },

    #[error("Inconsistent evidence for {key}: {message}")]
    Consistency { key: String, message: String },

    #[error("Invalid entity key: {0}")]
    InvalidKey(String),

    #[error("Invalid attribute path: {0}")]
    InvalidAttribute(String),

    #[error("Invalid amino acid '{0}' found at position {1}")]
    InvalidAminoAcid(char, usize),

    #[error("Invalid mutation {mutation}: {message}")]
    InvalidMutation { mutation: String, message: String },

    #[error("Configuration error: {field} - {message}")]
    ConfigurationError { field: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Atomic replace failed: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Consistency error that has not been attributed to an entity yet.
    pub fn consistency(message: impl Into<String>) -> Self {
        DbError::Consistency { key: String::from("<unknown>"), message: message.into() }
    }

    /// Key of the entity the error refers to, when there is one.
    pub fn key(&self) -> Option<&str> {
        match self {
            DbError::NotFound { key, .. }
            | DbError::Decode { key, .. }
            | DbError::Consistency { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Extension trait for Result to add context
pub trait DbResultExt<T> {
    /// Attribute consistency and decode errors to an entity key
    fn for_key(self, key: &str) -> DbResult<T>;

    /// Add context with a field name
    fn with_field_context(self, field: &str, message: &str) -> DbResult<T>;
}

impl<T, E> DbResultExt<T> for Result<T, E>
where
    E: Into<DbError>,
{
    fn for_key(self, key: &str) -> DbResult<T> {
        self.map_err(|e| match e.into() {
            DbError::Consistency { message, .. } => {
                DbError::Consistency { key: key.to_string(), message }
            }
            DbError::Decode { shard, message, .. } => {
                DbError::Decode { key: key.to_string(), shard, message }
            }
            other => other,
        })
    }

    fn with_field_context(self, field: &str, message: &str) -> DbResult<T> {
        self.map_err(|e| DbError::ConfigurationError {
            field: field.to_string(),
            message: format!("{}: {}", message, e.into()),
        })
    }
}
