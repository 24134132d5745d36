//! # Host Bridge Traits
//!
//! Collaborator contracts that the host application implements for the
//! playlist sync engine.
//!
//! ## Overview
//!
//! The engine is pure logic plus orchestration. Everything that touches the
//! outside world is behind a trait defined here:
//!
//! - [`RemoteMusicService`](music::RemoteMusicService) - Paged reads and batched
//!   writes against the remote music service
//! - [`SettingsStore`](storage::SettingsStore) - Key-value persistence for the
//!   playlist registry and preferences
//! - [`TokenRefresher`](auth::TokenRefresher) - Trade a refresh token for a new
//!   access token
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should:
//!
//! - Map an expired access token to `BridgeError::Unauthorized` so the engine
//!   can refresh credentials and retry once
//! - Map a missing remote playlist to `BridgeError::NotFound`
//! - Provide actionable messages for everything else
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across async
//! tasks behind `Arc`.

pub mod auth;
pub mod error;
pub mod music;
pub mod storage;
pub mod time;

pub use auth::{TokenGrant, TokenRefresher};
pub use error::BridgeError;

// Re-export commonly used types
pub use music::{
    Page, RemoteMusicService, RemotePlaylist, TrackFieldSet, TrackRecord, Visibility,
    MAX_TRACKS_PER_WRITE,
};
pub use storage::SettingsStore;
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
