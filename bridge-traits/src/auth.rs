//! Token Refresh Abstraction
//!
//! The login flow runs in the host. The engine only needs a way to trade a
//! refresh token for a new access token when the remote service reports the
//! current one as expired.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of a successful token exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present when the authorization server rotated the refresh token.
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: u64,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Exchanges a refresh token for a fresh access token.
///
/// Implementations talk to the authorization server (PKCE token endpoint or a
/// backend proxy). A rejected refresh token should be reported as
/// [`BridgeError::Unauthorized`](crate::error::BridgeError::Unauthorized).
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant>;
}
