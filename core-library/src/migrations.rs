//! Schema migrations for the persisted registry.
//!
//! The registry is stored as one JSON document:
//!
//! ```json
//! { "version": 5, "migratePersistOnLogin": false, "playlists": [ { "id": "...", ... } ] }
//! ```
//!
//! Older documents are upgraded by an ordered chain of pure functions, one per
//! version step, each defaulting the fields its version introduced:
//!
//! | Version | Change |
//! |---|---|
//! | 1 | `id`, `name`, `snapshotId`, `componentPlaylistIds`, `needsSync`, `deletedOnSpotify` |
//! | 2 | `isUserPlaylist = true` |
//! | 3 | `lastSyncTracks = []`, `needsSync = isComposite` |
//! | 4 | `migratePersistOnLogin = true` on the document |
//! | 5 | `sortSpec = "custom;a"` |
//!
//! The version 4 flag marks a document written before registries were stored
//! per user. Only a flagged document under the unscoped key is moved to the
//! first user who signs in. `playlistSortNumber` has no step; entries without
//! it load with 0.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{LibraryError, Result};
use crate::models::ExtendablePlaylist;
use crate::registry::PlaylistRegistry;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 5;

type Migration = fn(Value) -> Result<Value>;

/// `(target version, step)` in ascending order.
const MIGRATIONS: &[(u32, Migration)] = &[
    (2, add_user_playlist_flag),
    (3, add_last_sync_tracks),
    (4, flag_for_adoption),
    (5, add_sort_spec),
];

/// Current-schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRegistry {
    pub version: u32,
    /// Set by the version 4 step; cleared once adopted by a user
    #[serde(default)]
    pub migrate_persist_on_login: bool,
    /// Entries in display order
    pub playlists: Vec<ExtendablePlaylist>,
}

impl PersistedRegistry {
    pub fn from_registry(registry: &PlaylistRegistry) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            migrate_persist_on_login: false,
            playlists: registry.in_display_order().into_iter().cloned().collect(),
        }
    }

    pub fn into_registry(self) -> PlaylistRegistry {
        PlaylistRegistry::from_playlists(self.playlists)
    }

    /// Parse a stored document of any known version.
    pub fn decode(stored: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(stored)?;
        let migrated = migrate(document)?;
        Ok(serde_json::from_value(migrated)?)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Upgrade a stored document to [`CURRENT_SCHEMA_VERSION`].
///
/// A document without a version is treated as version 1.
///
/// # Errors
///
/// [`LibraryError::Migration`] when the document is not shaped like a
/// registry or was written by a newer schema.
pub fn migrate(document: Value) -> Result<Value> {
    let version = stored_version(&document)?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(LibraryError::Migration(format!(
            "stored schema version {} is newer than supported version {}",
            version, CURRENT_SCHEMA_VERSION
        )));
    }

    let mut document = document;
    for (target, step) in MIGRATIONS.iter().filter(|(target, _)| *target > version) {
        debug!(target_version = target, "Applying registry migration");
        document = step(document)?;
        set_version(&mut document, *target)?;
    }

    if version < CURRENT_SCHEMA_VERSION {
        info!(
            from = version,
            to = CURRENT_SCHEMA_VERSION,
            "Migrated stored registry"
        );
    }

    Ok(document)
}

fn stored_version(document: &Value) -> Result<u32> {
    let object = document
        .as_object()
        .ok_or_else(|| LibraryError::Migration("stored registry is not an object".to_string()))?;

    match object.get("version") {
        None | Some(Value::Null) => Ok(1),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v >= 1)
            .ok_or_else(|| LibraryError::Migration(format!("invalid schema version {}", value))),
    }
}

fn set_version(document: &mut Value, version: u32) -> Result<()> {
    document
        .as_object_mut()
        .ok_or_else(|| LibraryError::Migration("stored registry is not an object".to_string()))?
        .insert("version".to_string(), json!(version));
    Ok(())
}

/// Apply `update` to every playlist entry, passing its position.
fn for_each_playlist(
    mut document: Value,
    mut update: impl FnMut(usize, &mut Map<String, Value>),
) -> Result<Value> {
    let playlists = document
        .get_mut("playlists")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| LibraryError::Migration("stored registry has no playlist list".to_string()))?;

    for (position, entry) in playlists.iter_mut().enumerate() {
        let entry = entry.as_object_mut().ok_or_else(|| {
            LibraryError::Migration(format!("playlist entry {} is not an object", position))
        })?;
        update(position, entry);
    }

    Ok(document)
}

fn is_composite(entry: &Map<String, Value>) -> bool {
    entry
        .get("componentPlaylistIds")
        .and_then(Value::as_array)
        .is_some_and(|components| !components.is_empty())
}

fn add_user_playlist_flag(document: Value) -> Result<Value> {
    for_each_playlist(document, |_, entry| {
        entry.insert("isUserPlaylist".to_string(), Value::Bool(true));
    })
}

fn add_last_sync_tracks(document: Value) -> Result<Value> {
    for_each_playlist(document, |_, entry| {
        let composite = is_composite(entry);
        entry.insert("lastSyncTracks".to_string(), json!([]));
        entry.insert("needsSync".to_string(), Value::Bool(composite));
    })
}

fn flag_for_adoption(mut document: Value) -> Result<Value> {
    document
        .as_object_mut()
        .ok_or_else(|| LibraryError::Migration("stored registry is not an object".to_string()))?
        .insert("migratePersistOnLogin".to_string(), Value::Bool(true));
    Ok(document)
}

fn add_sort_spec(document: Value) -> Result<Value> {
    for_each_playlist(document, |_, entry| {
        entry.insert("sortSpec".to_string(), json!("custom;a"));
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_document() -> Value {
        json!({
            "playlists": [
                {
                    "id": "leaf",
                    "name": "Leaf",
                    "snapshotId": "s1",
                    "componentPlaylistIds": [],
                    "needsSync": false,
                    "deletedOnSpotify": false
                },
                {
                    "id": "mix",
                    "name": "Mix",
                    "snapshotId": "s2",
                    "componentPlaylistIds": ["leaf"],
                    "needsSync": false,
                    "deletedOnSpotify": false
                }
            ]
        })
    }

    #[test]
    fn test_migrate_from_v1() {
        let migrated = migrate(v1_document()).unwrap();
        assert_eq!(migrated["version"], CURRENT_SCHEMA_VERSION);
        assert_eq!(migrated["migratePersistOnLogin"], true);

        let leaf = &migrated["playlists"][0];
        assert_eq!(leaf["isUserPlaylist"], true);
        assert_eq!(leaf["needsSync"], false);
        assert_eq!(leaf["lastSyncTracks"], json!([]));
        assert!(leaf.get("playlistSortNumber").is_none());
        assert_eq!(leaf["sortSpec"], "custom;a");

        let mix = &migrated["playlists"][1];
        assert_eq!(mix["needsSync"], true);
    }

    #[test]
    fn test_migrate_from_v4_only_adds_sort_spec() {
        let mut document = v1_document();
        document["version"] = json!(4);
        let migrated = migrate(document).unwrap();

        let mix = &migrated["playlists"][1];
        assert_eq!(mix["sortSpec"], "custom;a");
        // v3 step did not run again
        assert_eq!(mix["needsSync"], false);
        assert!(mix.get("isUserPlaylist").is_none());
        assert!(migrated.get("migratePersistOnLogin").is_none());
    }

    #[test]
    fn test_current_version_is_untouched() {
        let document = json!({ "version": CURRENT_SCHEMA_VERSION, "playlists": [] });
        assert_eq!(migrate(document.clone()).unwrap(), document);
    }

    #[test]
    fn test_newer_version_rejected() {
        let document = json!({ "version": CURRENT_SCHEMA_VERSION + 1, "playlists": [] });
        assert!(matches!(migrate(document), Err(LibraryError::Migration(_))));
    }

    #[test]
    fn test_malformed_documents_rejected() {
        assert!(migrate(json!([])).is_err());
        assert!(migrate(json!({ "version": 0, "playlists": [] })).is_err());
        assert!(migrate(json!({ "version": 1 })).is_err());
        assert!(migrate(json!({ "version": 1, "playlists": [1] })).is_err());
    }

    #[test]
    fn test_decode_v1_into_registry() {
        let stored = v1_document().to_string();
        let persisted = PersistedRegistry::decode(&stored).unwrap();
        assert!(persisted.migrate_persist_on_login);
        let registry = persisted.into_registry();

        assert_eq!(registry.len(), 2);
        let mix = registry.get("mix").unwrap();
        assert!(mix.needs_sync);
        assert!(mix.is_user_playlist);
        assert_eq!(mix.sort_spec.encode(), "custom;a");
        assert_eq!(mix.playlist_sort_number, 0);
    }

    #[test]
    fn test_encode_decode_current() {
        let mut registry = PlaylistRegistry::new();
        registry.attach_leaf("b", "B", "s", true).unwrap();
        registry.attach_leaf("a", "A", "s", false).unwrap();

        let persisted = PersistedRegistry::from_registry(&registry);
        assert_eq!(persisted.playlists[0].id.as_str(), "b");
        assert!(!persisted.migrate_persist_on_login);

        let decoded = PersistedRegistry::decode(&persisted.encode().unwrap()).unwrap();
        assert_eq!(decoded.into_registry(), registry);
    }
}
