use bridge_traits::BridgeError;
use core_auth::AuthError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Access token expired and could not be renewed: {0}")]
    AuthExpired(String),

    #[error("Remote request failed: {0}")]
    RemoteRequestFailed(#[source] BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Sync already in progress for playlist {playlist_id}")]
    Busy { playlist_id: String },

    #[error("Playlist {0} not found")]
    PlaylistNotFound(String),

    #[error("Playlist {0} is not a composite")]
    NotComposite(String),

    #[error("Playlist {playlist_id} cannot be recreated: {reason}")]
    Unrecoverable { playlist_id: String, reason: String },

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),
}

impl From<BridgeError> for SyncError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Unauthorized(message) => SyncError::AuthExpired(message),
            other => SyncError::RemoteRequestFailed(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
