//! Credential types.

use bridge_traits::TokenGrant;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth token set for the signed-in user.
///
/// # Security
///
/// Tokens are never logged. The `Debug` implementation redacts them.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
/// use chrono::{Duration, Utc};
///
/// let tokens = OAuthTokens {
///     access_token: "BQD1...".to_string(),
///     refresh_token: Some("AQC9...".to_string()),
///     expires_at: Utc::now() + Duration::hours(1),
/// };
///
/// assert!(!tokens.is_expired_at(Utc::now(), 60));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used for API requests
    pub access_token: String,
    /// The refresh token used to obtain new access tokens
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC)
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Create a token set expiring `expires_in` seconds after `now`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: now + Duration::seconds(expires_in),
        }
    }

    /// Apply a refresh grant on top of the current tokens.
    ///
    /// The refresh token is kept when the authorization server did not
    /// rotate it.
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let expires_in = i64::try_from(grant.expires_in).unwrap_or(i64::MAX / 1000);
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: now + Duration::seconds(expires_in),
        }
    }

    /// Whether the access token is expired or expires within `buffer_seconds` of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer_seconds: i64) -> bool {
        now >= self.expires_at - Duration::seconds(buffer_seconds)
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
