//! # Playlist Registry
//!
//! In-memory store of every playlist the engine knows about.
//!
//! ## Overview
//!
//! The registry is a plain value: the sync layer clones it, applies a whole
//! transition (merge result, push result or user edit) to the copy and swaps
//! it in, so readers never observe a half-applied change.
//!
//! Edits to `componentPlaylistIds` are validated here: a component list may
//! not reference unknown playlists, repeat an id, or introduce a cycle.
//!
//! Composition is followed with explicit worklists and visited sets, never
//! recursion, so even corrupted stored data cannot cause unbounded work.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::error::{LibraryError, Result};
use crate::models::{ExtendablePlaylist, NamedTrack, PlaylistId};
use crate::sort_spec::SortSpec;

/// Map from a playlist to the composites listing it as a component.
pub type ParentMap = HashMap<PlaylistId, Vec<PlaylistId>>;

/// The set of known playlists, keyed by remote id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistRegistry {
    playlists: BTreeMap<PlaylistId, ExtendablePlaylist>,
}

impl PlaylistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from stored entries, keeping their sort numbers.
    pub fn from_playlists(playlists: impl IntoIterator<Item = ExtendablePlaylist>) -> Self {
        Self {
            playlists: playlists
                .into_iter()
                .map(|playlist| (playlist.id.clone(), playlist))
                .collect(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, id: &str) -> Option<&ExtendablePlaylist> {
        self.playlists.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ExtendablePlaylist> {
        self.playlists.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.playlists.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtendablePlaylist> {
        self.playlists.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ExtendablePlaylist> {
        self.playlists.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PlaylistId> {
        self.playlists.keys()
    }

    /// Playlists in display order (`playlistSortNumber`, then id).
    pub fn in_display_order(&self) -> Vec<&ExtendablePlaylist> {
        let mut playlists: Vec<_> = self.playlists.values().collect();
        playlists.sort_by(|a, b| {
            a.playlist_sort_number
                .cmp(&b.playlist_sort_number)
                .then_with(|| a.id.cmp(&b.id))
        });
        playlists
    }

    /// Sort number for a newly inserted playlist.
    pub fn next_sort_number(&self) -> i64 {
        self.playlists
            .values()
            .map(|playlist| playlist.playlist_sort_number)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Followed playlists, whose deletion needs an explicit existence probe.
    pub fn external_ids(&self) -> Vec<PlaylistId> {
        self.playlists
            .values()
            .filter(|playlist| !playlist.is_user_playlist)
            .map(|playlist| playlist.id.clone())
            .collect()
    }

    /// Scan once and map each component id to the playlists listing it.
    ///
    /// A composite listing the same component twice appears once.
    pub fn parent_map(&self) -> ParentMap {
        let mut parents: ParentMap = HashMap::new();
        for playlist in self.playlists.values() {
            for component in &playlist.component_playlist_ids {
                let entry = parents.entry(component.clone()).or_default();
                if !entry.contains(&playlist.id) {
                    entry.push(playlist.id.clone());
                }
            }
        }
        parents
    }

    /// Whether the composition graph has a cycle.
    pub fn has_cycle(&self) -> bool {
        self.playlists
            .keys()
            .any(|id| self.reaches(&self.components_of(id.as_str()), id.as_str()))
    }

    fn components_of(&self, id: &str) -> Vec<PlaylistId> {
        self.playlists
            .get(id)
            .map(|playlist| playlist.component_playlist_ids.clone())
            .unwrap_or_default()
    }

    /// Whether `target` is reachable from any of `start` through components.
    fn reaches(&self, start: &[PlaylistId], target: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = start.iter().map(PlaylistId::as_str).collect();

        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(playlist) = self.playlists.get(id) {
                stack.extend(playlist.component_playlist_ids.iter().map(PlaylistId::as_str));
            }
        }

        false
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Attach an existing remote playlist as a leaf.
    pub fn attach_leaf(
        &mut self,
        id: impl Into<PlaylistId>,
        name: impl Into<String>,
        snapshot_id: impl Into<String>,
        is_user_playlist: bool,
    ) -> Result<&ExtendablePlaylist> {
        let mut playlist = ExtendablePlaylist::leaf(id, name, snapshot_id);
        playlist.is_user_playlist = is_user_playlist;
        self.insert_new(playlist)
    }

    /// Insert a composite that was just created and pushed.
    ///
    /// All components must already be known.
    pub fn insert_composite(&mut self, playlist: ExtendablePlaylist) -> Result<&ExtendablePlaylist> {
        if playlist.is_leaf() {
            return Err(LibraryError::InvalidInput {
                field: "componentPlaylistIds".to_string(),
                message: "a composite needs at least one component".to_string(),
            });
        }
        self.check_components(&playlist.id, &playlist.component_playlist_ids)?;
        self.insert_new(playlist)
    }

    fn insert_new(&mut self, mut playlist: ExtendablePlaylist) -> Result<&ExtendablePlaylist> {
        if self.playlists.contains_key(playlist.id.as_str()) {
            return Err(LibraryError::DuplicateId {
                id: playlist.id.to_string(),
            });
        }
        playlist.validate().map_err(|message| LibraryError::InvalidInput {
            field: "playlist".to_string(),
            message,
        })?;

        playlist.playlist_sort_number = self.next_sort_number();
        debug!(playlist_id = %playlist.id, composite = playlist.is_composite(), "Inserting playlist");

        let id = playlist.id.clone();
        Ok(&*self.playlists.entry(id).or_insert(playlist))
    }

    /// Drop a playlist from the registry.
    ///
    /// Composites that still list it keep the reference, which then counts as
    /// a missing dependency.
    pub fn remove(&mut self, id: &str) -> Result<ExtendablePlaylist> {
        let removed = self
            .playlists
            .remove(id)
            .ok_or_else(|| LibraryError::playlist_not_found(id))?;

        let dangling = self
            .playlists
            .values()
            .filter(|playlist| playlist.component_playlist_ids.iter().any(|c| c.as_str() == id))
            .count();
        if dangling > 0 {
            warn!(playlist_id = id, dangling, "Removed playlist is still a component of other playlists");
        }

        Ok(removed)
    }

    // =========================================================================
    // User edits
    // =========================================================================

    /// Replace a composite's components.
    ///
    /// The playlist becomes dirty since its computed content changed.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown playlist or component
    /// - `InvalidInput` for an empty or repeating component list
    /// - `CycleDetected` when the edit would make the playlist its own
    ///   transitive component
    pub fn set_components(&mut self, id: &str, components: Vec<PlaylistId>) -> Result<()> {
        if !self.playlists.contains_key(id) {
            return Err(LibraryError::playlist_not_found(id));
        }
        if components.is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "componentPlaylistIds".to_string(),
                message: "a composite needs at least one component".to_string(),
            });
        }
        self.check_components(&PlaylistId::new(id), &components)?;

        let playlist = self
            .playlists
            .get_mut(id)
            .ok_or_else(|| LibraryError::playlist_not_found(id))?;
        playlist.component_playlist_ids = components;
        playlist.needs_sync = true;
        Ok(())
    }

    fn check_components(&self, id: &PlaylistId, components: &[PlaylistId]) -> Result<()> {
        let mut seen = HashSet::new();
        for component in components {
            if !seen.insert(component.as_str()) {
                return Err(LibraryError::InvalidInput {
                    field: "componentPlaylistIds".to_string(),
                    message: format!("component {} is listed twice", component),
                });
            }
            if component == id {
                return Err(LibraryError::CycleDetected {
                    playlist_id: id.to_string(),
                    via: component.to_string(),
                });
            }
            if !self.playlists.contains_key(component.as_str()) {
                return Err(LibraryError::playlist_not_found(component.as_str()));
            }
        }

        for component in components {
            if self.reaches(std::slice::from_ref(component), id.as_str()) {
                return Err(LibraryError::CycleDetected {
                    playlist_id: id.to_string(),
                    via: component.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Change a composite's sort order; the playlist becomes dirty.
    pub fn set_sort_spec(&mut self, id: &str, sort_spec: SortSpec) -> Result<()> {
        let playlist = self
            .playlists
            .get_mut(id)
            .ok_or_else(|| LibraryError::playlist_not_found(id))?;
        if playlist.sort_spec != sort_spec {
            playlist.sort_spec = sort_spec;
            playlist.needs_sync = playlist.is_composite();
        }
        Ok(())
    }

    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> Result<()> {
        let playlist = self
            .playlists
            .get_mut(id)
            .ok_or_else(|| LibraryError::playlist_not_found(id))?;
        playlist.name = name.into();
        Ok(())
    }

    /// Move a playlist to a display position.
    pub fn set_sort_number(&mut self, id: &str, sort_number: i64) -> Result<()> {
        let playlist = self
            .playlists
            .get_mut(id)
            .ok_or_else(|| LibraryError::playlist_not_found(id))?;
        playlist.playlist_sort_number = sort_number;
        Ok(())
    }

    // =========================================================================
    // Sync results
    // =========================================================================

    /// Record a successful push of `tracks` to playlist `id`.
    pub fn record_push(
        &mut self,
        id: &str,
        snapshot_id: impl Into<String>,
        tracks: Vec<NamedTrack>,
    ) -> Result<()> {
        let playlist = self
            .playlists
            .get_mut(id)
            .ok_or_else(|| LibraryError::playlist_not_found(id))?;
        playlist.snapshot_id = snapshot_id.into();
        playlist.last_sync_tracks = tracks;
        playlist.needs_sync = false;
        playlist.deleted_on_spotify = false;
        Ok(())
    }

    /// Mark every transitive parent of `id` as needing a sync.
    ///
    /// Returns the ids that changed from clean to dirty.
    pub fn mark_ancestors_need_sync(&mut self, id: &str) -> Vec<PlaylistId> {
        let parents = self.parent_map();
        let mut newly_dirty = Vec::new();
        let mut visited: HashSet<PlaylistId> = HashSet::new();
        let mut queue: VecDeque<PlaylistId> = parents.get(id).cloned().unwrap_or_default().into();

        while let Some(parent_id) = queue.pop_front() {
            if !visited.insert(parent_id.clone()) {
                continue;
            }
            match self.playlists.get_mut(parent_id.as_str()) {
                Some(parent) => {
                    if !parent.needs_sync {
                        parent.needs_sync = true;
                        newly_dirty.push(parent_id.clone());
                    }
                }
                None => continue,
            }
            if let Some(grandparents) = parents.get(&parent_id) {
                queue.extend(grandparents.iter().cloned());
            }
        }

        newly_dirty
    }

    /// Re-key playlist `old_id` as `new_id`, updating every component list
    /// that referenced it.
    pub fn replace_id(&mut self, old_id: &str, new_id: PlaylistId) -> Result<()> {
        if self.playlists.contains_key(new_id.as_str()) {
            return Err(LibraryError::DuplicateId {
                id: new_id.to_string(),
            });
        }
        let mut playlist = self
            .playlists
            .remove(old_id)
            .ok_or_else(|| LibraryError::playlist_not_found(old_id))?;
        playlist.id = new_id.clone();
        self.playlists.insert(new_id.clone(), playlist);

        for parent in self.playlists.values_mut() {
            for component in parent.component_playlist_ids.iter_mut() {
                if component.as_str() == old_id {
                    *component = new_id.clone();
                }
            }
        }

        Ok(())
    }
}
