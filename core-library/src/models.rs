//! Domain models for the playlist registry

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::sort_spec::SortSpec;

// =============================================================================
// ID Types
// =============================================================================

/// Remote playlist identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(String);

impl PlaylistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaylistId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PlaylistId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for PlaylistId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PlaylistId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Track identity as pushed to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedTrack {
    pub name: String,
    pub uri: String,
}

impl NamedTrack {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }
}

/// A remote playlist tracked by the registry.
///
/// With no components the playlist is a *leaf* whose tracks live on the remote
/// service. With components it is a *composite* whose content is computed from
/// them and pushed by a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendablePlaylist {
    pub id: PlaylistId,
    pub name: String,
    /// Remote revision marker as of the last merge or push
    pub snapshot_id: String,
    /// Ordered child playlists; empty for leaves
    pub component_playlist_ids: Vec<PlaylistId>,
    /// Last pushed content is stale relative to the components
    pub needs_sync: bool,
    /// The remote service no longer has this id
    pub deleted_on_spotify: bool,
    /// Owned by the current user rather than followed
    pub is_user_playlist: bool,
    /// Content as of the last successful push; composites only
    pub last_sync_tracks: Vec<NamedTrack>,
    pub sort_spec: SortSpec,
    /// Display position, independent of the dependency graph
    #[serde(default)]
    pub playlist_sort_number: i64,
}

impl ExtendablePlaylist {
    /// A leaf as first seen on the remote service.
    pub fn leaf(id: impl Into<PlaylistId>, name: impl Into<String>, snapshot_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            snapshot_id: snapshot_id.into(),
            component_playlist_ids: Vec::new(),
            needs_sync: false,
            deleted_on_spotify: false,
            is_user_playlist: true,
            last_sync_tracks: Vec::new(),
            sort_spec: SortSpec::default(),
            playlist_sort_number: 0,
        }
    }

    /// A composite whose content was just pushed.
    pub fn composite(
        id: impl Into<PlaylistId>,
        name: impl Into<String>,
        snapshot_id: impl Into<String>,
        component_playlist_ids: Vec<PlaylistId>,
        sort_spec: SortSpec,
        last_sync_tracks: Vec<NamedTrack>,
    ) -> Self {
        Self {
            component_playlist_ids,
            sort_spec,
            last_sync_tracks,
            ..Self::leaf(id, name, snapshot_id)
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.component_playlist_ids.is_empty()
    }

    pub fn is_composite(&self) -> bool {
        !self.is_leaf()
    }

    /// Validate field-level constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().trim().is_empty() {
            return Err("Playlist id cannot be empty".to_string());
        }

        if self.component_playlist_ids.contains(&self.id) {
            return Err(format!("Playlist {} lists itself as a component", self.id));
        }

        if self.is_leaf() && self.needs_sync {
            return Err(format!("Leaf playlist {} cannot need a sync", self.id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_id_display_and_borrow() {
        let id = PlaylistId::new("37i9dQZF1DX0XUsuxWHRQd");
        assert_eq!(id.to_string(), "37i9dQZF1DX0XUsuxWHRQd");
        let borrowed: &str = id.borrow();
        assert_eq!(borrowed, id.as_str());
    }

    #[test]
    fn test_serializes_with_camel_case_fields() {
        let playlist = ExtendablePlaylist::composite(
            "p",
            "Mix",
            "s1",
            vec!["a".into(), "b".into()],
            SortSpec::custom(),
            vec![NamedTrack::new("Song", "spotify:track:1")],
        );

        let json = serde_json::to_value(&playlist).unwrap();
        assert_eq!(json["id"], "p");
        assert_eq!(json["snapshotId"], "s1");
        assert_eq!(json["componentPlaylistIds"][1], "b");
        assert_eq!(json["needsSync"], false);
        assert_eq!(json["deletedOnSpotify"], false);
        assert_eq!(json["isUserPlaylist"], true);
        assert_eq!(json["lastSyncTracks"][0]["uri"], "spotify:track:1");
        assert_eq!(json["sortSpec"], "custom;a");
        assert_eq!(json["playlistSortNumber"], 0);

        let restored: ExtendablePlaylist = serde_json::from_value(json).unwrap();
        assert_eq!(restored, playlist);
    }

    #[test]
    fn test_leaf_and_composite() {
        let leaf = ExtendablePlaylist::leaf("l", "Leaf", "s");
        assert!(leaf.is_leaf());
        assert!(leaf.validate().is_ok());

        let composite = ExtendablePlaylist::composite(
            "c",
            "Comp",
            "s",
            vec!["l".into()],
            SortSpec::custom(),
            vec![],
        );
        assert!(composite.is_composite());
    }

    #[test]
    fn test_validate_rejects_self_reference() {
        let mut playlist = ExtendablePlaylist::leaf("p", "P", "s");
        playlist.component_playlist_ids.push("p".into());
        assert!(playlist.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dirty_leaf() {
        let mut playlist = ExtendablePlaylist::leaf("p", "P", "s");
        playlist.needs_sync = true;
        assert!(playlist.validate().is_err());
    }
}
