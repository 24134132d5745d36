//! # Authentication Module
//!
//! Credential state for the remote music service.
//!
//! ## Overview
//!
//! Sign-in (PKCE or otherwise) happens in the host. This crate holds the
//! resulting [`OAuthTokens`] and refreshes the access token through the
//! host's [`TokenRefresher`](bridge_traits::TokenRefresher) when the remote
//! service rejects it.
//!
//! ## Features
//!
//! - Single-flight access token refresh
//! - Refresh token rotation
//! - Auth event emission on the shared event bus

pub mod error;
pub mod manager;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::AuthManager;
pub use types::OAuthTokens;
