//! # Authentication Manager
//!
//! Holds the signed-in user's tokens and refreshes the access token on demand.
//!
//! ## Overview
//!
//! The remote service reports an expired token as
//! `BridgeError::Unauthorized`. The sync gateway then calls
//! [`AuthManager::refresh`] with the token that was rejected and retries the
//! request once with whatever comes back.
//!
//! Refreshes are single-flight: concurrent callers that saw the same stale
//! token share one exchange with the authorization server. A caller that
//! arrives after the exchange finished gets the new token without another
//! round trip.
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::{AuthManager, OAuthTokens};
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//!
//! let manager = AuthManager::new(Some(refresher), EventBus::default(), clock);
//! manager.set_tokens(tokens).await;
//!
//! let stale = manager.access_token().await?;
//! // ... remote call answered 401 ...
//! let fresh = manager.refresh(&stale).await?;
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use bridge_traits::{Clock, TokenRefresher};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

/// Credential holder with single-flight access-token refresh.
pub struct AuthManager {
    /// Current tokens; `None` while signed out
    tokens: RwLock<Option<OAuthTokens>>,
    /// Host collaborator performing the token exchange
    refresher: Option<Arc<dyn TokenRefresher>>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    /// Serializes refreshes
    refresh_lock: Mutex<()>,
}

impl AuthManager {
    /// Creates a signed-out manager.
    ///
    /// Without a `refresher`, [`refresh`](Self::refresh) always fails with
    /// [`AuthError::RefreshUnavailable`].
    pub fn new(
        refresher: Option<Arc<dyn TokenRefresher>>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens: RwLock::new(None),
            refresher,
            event_bus,
            clock,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Install tokens obtained by the host's sign-in flow.
    pub async fn set_tokens(&self, tokens: OAuthTokens) {
        debug!(expires_at = %tokens.expires_at, "Installing tokens");
        *self.tokens.write().await = Some(tokens);
    }

    /// Forget the current tokens.
    pub async fn sign_out(&self) {
        info!("Signing out");
        *self.tokens.write().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// Whether a rejected token can be refreshed at all.
    pub fn can_refresh(&self) -> bool {
        self.refresher.is_some()
    }

    /// Snapshot of the current tokens, for persistence by the host.
    pub async fn tokens(&self) -> Option<OAuthTokens> {
        self.tokens.read().await.clone()
    }

    /// The current access token.
    pub async fn access_token(&self) -> Result<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
            .ok_or(AuthError::NotAuthenticated)
    }

    /// Replace `stale_access_token` with a fresh one.
    ///
    /// If another caller already refreshed past `stale_access_token`, the
    /// current token is returned without contacting the authorization server.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RefreshUnavailable`] when no refresher is configured
    /// - [`AuthError::NotAuthenticated`] when signed out
    /// - [`AuthError::NoRefreshToken`] when the tokens carry no refresh token
    /// - [`AuthError::TokenRefreshFailed`] when the exchange fails
    #[instrument(skip(self, stale_access_token))]
    pub async fn refresh(&self, stale_access_token: &str) -> Result<String> {
        let Some(refresher) = self.refresher.as_ref() else {
            warn!("Access token expired and no token refresher is configured");
            return Err(AuthError::RefreshUnavailable);
        };

        let _guard = self.refresh_lock.lock().await;

        let current = self
            .tokens
            .read()
            .await
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        if current.access_token != stale_access_token {
            debug!("Token already refreshed by a concurrent caller");
            return Ok(current.access_token);
        }

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            warn!("No refresh token set, cannot refresh access token");
            self.emit_error("No refresh token available", false);
            return Err(AuthError::NoRefreshToken);
        };

        info!("Refreshing access token");
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

        let grant = match refresher.refresh_access_token(refresh_token).await {
            Ok(grant) => grant,
            Err(err) => {
                error!(error = %err, "Token refresh failed");
                self.emit_error(&err.to_string(), !err.is_unauthorized());
                return Err(err.into());
            }
        };

        let refreshed = current.refreshed(grant, self.clock.now());
        let access_token = refreshed.access_token.clone();
        let expires_at = refreshed.expires_at.timestamp();
        *self.tokens.write().await = Some(refreshed);

        info!(expires_at, "Access token refreshed");
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed { expires_at }));

        Ok(access_token)
    }

    fn emit_error(&self, message: &str, recoverable: bool) {
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: message.to_string(),
            recoverable,
        }));
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("can_refresh", &self.can_refresh())
            .finish_non_exhaustive()
    }
}
