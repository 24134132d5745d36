//! Registry repository trait and implementation

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::SettingsStore;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::migrations::PersistedRegistry;
use crate::registry::PlaylistRegistry;

/// Key the registry was stored under before it was scoped per user.
pub const LEGACY_REGISTRY_KEY: &str = "registry";

/// Storage key for `user_id`'s registry.
pub fn registry_key(user_id: &str) -> String {
    format!("{}:registry", user_id)
}

/// Persistence for the playlist registry
#[async_trait]
pub trait RegistryRepository: Send + Sync {
    /// Load the registry of `user_id`, migrating older schemas.
    ///
    /// # Returns
    /// - The stored registry, upgraded to the current schema
    /// - An empty registry if nothing is stored yet
    async fn load(&self, user_id: &str) -> Result<PlaylistRegistry>;

    /// Store the registry of `user_id` at the current schema version
    async fn save(&self, user_id: &str, registry: &PlaylistRegistry) -> Result<()>;
}

/// [`RegistryRepository`] over the host's [`SettingsStore`].
///
/// The registry is written as a single JSON value, so every save replaces the
/// previous state atomically.
pub struct SettingsRegistryRepository {
    store: Arc<dyn SettingsStore>,
}

impl SettingsRegistryRepository {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Move a registry stored under the legacy unscoped key to `user_id`.
    ///
    /// Only a document flagged by the version 4 migration is moved; anything
    /// else under the unscoped key is left alone.
    async fn adopt_legacy(&self, user_id: &str) -> Result<Option<PlaylistRegistry>> {
        let Some(legacy) = self.store.get_string(LEGACY_REGISTRY_KEY).await? else {
            return Ok(None);
        };

        let persisted = PersistedRegistry::decode(&legacy)?;
        if !persisted.migrate_persist_on_login {
            debug!("Unscoped registry is not flagged for adoption");
            return Ok(None);
        }

        info!(user_id, "Moving unscoped registry to per-user key");
        let registry = persisted.into_registry();
        self.save(user_id, &registry).await?;
        self.store.delete(LEGACY_REGISTRY_KEY).await?;
        Ok(Some(registry))
    }
}

#[async_trait]
impl RegistryRepository for SettingsRegistryRepository {
    #[instrument(skip(self))]
    async fn load(&self, user_id: &str) -> Result<PlaylistRegistry> {
        let registry = match self.store.get_string(&registry_key(user_id)).await? {
            Some(stored) => PersistedRegistry::decode(&stored)?.into_registry(),
            None => match self.adopt_legacy(user_id).await? {
                Some(registry) => registry,
                None => {
                    debug!("No stored registry, starting empty");
                    return Ok(PlaylistRegistry::new());
                }
            },
        };

        debug!(playlists = registry.len(), "Loaded registry");
        Ok(registry)
    }

    #[instrument(skip(self, registry), fields(playlists = registry.len()))]
    async fn save(&self, user_id: &str, registry: &PlaylistRegistry) -> Result<()> {
        let encoded = PersistedRegistry::from_registry(registry).encode()?;
        self.store.set_string(&registry_key(user_id), &encoded).await?;
        Ok(())
    }
}
