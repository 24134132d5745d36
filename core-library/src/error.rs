use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid sort spec '{spec}': {reason}")]
    InvalidSortSpec { spec: String, reason: String },

    #[error("Playlist {id} already exists")]
    DuplicateId { id: String },

    #[error("Setting components of {playlist_id} would create a cycle through {via}")]
    CycleDetected { playlist_id: String, via: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LibraryError {
    pub fn playlist_not_found(id: impl Into<String>) -> Self {
        LibraryError::NotFound {
            entity_type: "Playlist".to_string(),
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
