use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("No refresh token available; the user has to sign in again")]
    NoRefreshToken,

    #[error("No token refresher configured")]
    RefreshUnavailable,

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl From<BridgeError> for AuthError {
    fn from(error: BridgeError) -> Self {
        AuthError::TokenRefreshFailed(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
