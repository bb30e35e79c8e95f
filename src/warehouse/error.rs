//! Warehouse-specific error types.

use thiserror::Error;

/// Result type for entity loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that can occur while fetching an entity collection.
///
/// `Clone` so that one in-flight load can report the same failure to every
/// caller awaiting it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The loader has no collection under this name.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// Reading the backing source failed.
    #[error("failed to read entity '{entity}': {message}")]
    Io { entity: String, message: String },

    /// The source was read but is not an array of flat records.
    #[error("malformed data for entity '{entity}': {message}")]
    Malformed { entity: String, message: String },
}

impl LoadError {
    pub fn io(entity: &str, err: &std::io::Error) -> Self {
        Self::Io {
            entity: entity.to_string(),
            message: err.to_string(),
        }
    }

    pub fn malformed(entity: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    /// Name of the entity the failure concerns.
    pub fn entity(&self) -> &str {
        match self {
            Self::NotFound(entity) => entity,
            Self::Io { entity, .. } | Self::Malformed { entity, .. } => entity,
        }
    }

    /// Check if retrying the same load may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
