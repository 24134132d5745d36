//! # Engine Configuration
//!
//! Builder-based configuration for the playlist sync engine.
//!
//! ## Overview
//!
//! [`EngineConfig`] bundles the host collaborators the engine needs together
//! with its tuning knobs. [`EngineConfigBuilder::build`] validates everything
//! up front so a misconfigured host fails at startup rather than in the middle
//! of a sync.
//!
//! ## Required Collaborators
//!
//! - `RemoteMusicService` - Reads and writes against the remote music service
//! - `SettingsStore` - Persists the playlist registry
//!
//! ## Optional Collaborators
//!
//! - `TokenRefresher` - Without it, an expired access token fails the operation
//!   immediately instead of being refreshed and retried once
//! - `Clock` - Defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::EngineConfig;
//! use std::sync::Arc;
//!
//! let config = EngineConfig::builder()
//!     .remote_service(Arc::new(MyRemoteClient::new()))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .token_refresher(Arc::new(MyTokenEndpoint))
//!     .default_public_playlists(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::{EventBus, DEFAULT_EVENT_BUFFER_SIZE};
use bridge_traits::{Clock, RemoteMusicService, SettingsStore, SystemClock, TokenRefresher};
use bridge_traits::MAX_TRACKS_PER_WRITE;
use std::sync::Arc;

/// Page size the remote service allows for the playlist listing.
pub const MAX_PLAYLIST_PAGE_SIZE: u32 = 50;

/// Page size the remote service allows for playlist track listings.
pub const MAX_TRACK_PAGE_SIZE: u32 = 100;

/// Default sort spec for newly created composites: custom order, ascending.
pub const DEFAULT_SORT_SPEC: &str = "custom;a";

/// Engine configuration.
///
/// Use [`EngineConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct EngineConfig {
    /// Client for the remote music service (required)
    pub remote_service: Arc<dyn RemoteMusicService>,

    /// Persistence for the playlist registry (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Refresh-token exchange (optional)
    pub token_refresher: Option<Arc<dyn TokenRefresher>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Tracks per replace/add call when pushing
    pub write_batch_size: usize,

    /// Page size for the owned-playlists listing
    pub playlist_page_size: u32,

    /// Page size for playlist track listings
    pub track_page_size: u32,

    /// Visibility of playlists created by the engine
    pub default_public_playlists: bool,

    /// Sort spec used when a composite is created without one
    pub default_sort_spec: String,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("remote_service", &"RemoteMusicService { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field(
                "token_refresher",
                &self.token_refresher.as_ref().map(|_| "TokenRefresher { ... }"),
            )
            .field("write_batch_size", &self.write_batch_size)
            .field("playlist_page_size", &self.playlist_page_size)
            .field("track_page_size", &self.track_page_size)
            .field("default_public_playlists", &self.default_public_playlists)
            .field("default_sort_spec", &self.default_sort_spec)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// An event bus sized by `event_buffer_size`.
    pub fn event_bus(&self) -> EventBus {
        EventBus::new(self.event_buffer_size)
    }

    /// Validate the tuning values.
    ///
    /// Called by [`EngineConfigBuilder::build`]; exposed for hosts that mutate
    /// a built config.
    pub fn validate(&self) -> Result<()> {
        if self.write_batch_size == 0 || self.write_batch_size > MAX_TRACKS_PER_WRITE {
            return Err(Error::Config(format!(
                "write_batch_size must be between 1 and {}, got {}",
                MAX_TRACKS_PER_WRITE, self.write_batch_size
            )));
        }

        if self.playlist_page_size == 0 || self.playlist_page_size > MAX_PLAYLIST_PAGE_SIZE {
            return Err(Error::Config(format!(
                "playlist_page_size must be between 1 and {}, got {}",
                MAX_PLAYLIST_PAGE_SIZE, self.playlist_page_size
            )));
        }

        if self.track_page_size == 0 || self.track_page_size > MAX_TRACK_PAGE_SIZE {
            return Err(Error::Config(format!(
                "track_page_size must be between 1 and {}, got {}",
                MAX_TRACK_PAGE_SIZE, self.track_page_size
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn remote_service_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "RemoteMusicService".to_string(),
        message: "No remote music client provided. Implement \
                  bridge_traits::RemoteMusicService over the host's HTTP client \
                  and pass it via EngineConfigBuilder::remote_service()."
            .to_string(),
    }
}

fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "No settings store provided. The playlist registry cannot be \
                  persisted without one; pass an implementation via \
                  EngineConfigBuilder::settings_store()."
            .to_string(),
    }
}

/// Builder for [`EngineConfig`].
pub struct EngineConfigBuilder {
    remote_service: Option<Arc<dyn RemoteMusicService>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    token_refresher: Option<Arc<dyn TokenRefresher>>,
    clock: Option<Arc<dyn Clock>>,
    write_batch_size: usize,
    playlist_page_size: u32,
    track_page_size: u32,
    default_public_playlists: bool,
    default_sort_spec: String,
    event_buffer_size: usize,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            remote_service: None,
            settings_store: None,
            token_refresher: None,
            clock: None,
            write_batch_size: MAX_TRACKS_PER_WRITE,
            playlist_page_size: MAX_PLAYLIST_PAGE_SIZE,
            track_page_size: 50,
            default_public_playlists: false,
            default_sort_spec: DEFAULT_SORT_SPEC.to_string(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl EngineConfigBuilder {
    pub fn remote_service(mut self, service: Arc<dyn RemoteMusicService>) -> Self {
        self.remote_service = Some(service);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.token_refresher = Some(refresher);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Tracks per write call (1..=100, default 100).
    pub fn write_batch_size(mut self, size: usize) -> Self {
        self.write_batch_size = size;
        self
    }

    pub fn playlist_page_size(mut self, size: u32) -> Self {
        self.playlist_page_size = size;
        self
    }

    pub fn track_page_size(mut self, size: u32) -> Self {
        self.track_page_size = size;
        self
    }

    pub fn default_public_playlists(mut self, public: bool) -> Self {
        self.default_public_playlists = public;
        self
    }

    /// Encoded sort spec applied to new composites (`"custom;a"` by default).
    ///
    /// The string is parsed by the library layer when first used.
    pub fn default_sort_spec(mut self, spec: impl Into<String>) -> Self {
        self.default_sort_spec = spec.into();
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required collaborator is absent
    /// - [`Error::Config`] when a tuning value is out of range
    pub fn build(self) -> Result<EngineConfig> {
        let remote_service = self.remote_service.ok_or_else(remote_service_missing_error)?;
        let settings_store = self.settings_store.ok_or_else(settings_store_missing_error)?;

        let config = EngineConfig {
            remote_service,
            settings_store,
            token_refresher: self.token_refresher,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            write_batch_size: self.write_batch_size,
            playlist_page_size: self.playlist_page_size,
            track_page_size: self.track_page_size,
            default_public_playlists: self.default_public_playlists,
            default_sort_spec: self.default_sort_spec,
            event_buffer_size: self.event_buffer_size,
        };

        config.validate()?;
        Ok(config)
    }
}
