//! # Remote-State Merger
//!
//! Folds a freshly fetched list of remote playlists into the registry.
//!
//! ## Overview
//!
//! [`merge_remote_snapshot`] is pure: it takes the current registry and the
//! aggregated remote listing and returns the next registry plus a
//! [`MergeReport`]. The caller commits the result in one step.
//!
//! Steps:
//! 1. Every known id starts out tentatively deleted.
//! 2. Each remote entry un-deletes its id; a different `snapshotId` marks it
//!    changed, a different name is copied over.
//! 3. Changes propagate to every transitive parent, breadth-first with a
//!    visited set, setting `needsSync`.
//! 4. Unknown remote entries are inserted as owned leaves.
//! 5. Ids never seen are flagged `deletedOnSpotify`.
//!
//! Merging the same listing twice makes no further `needsSync` transitions.
//!
//! A listing fetched while pushes were committing can carry revision markers
//! older than the registry's. [`pin_local_changes`] replaces those with the
//! registry's own before the merge.

use std::collections::{HashSet, VecDeque};

use bridge_traits::RemotePlaylist;
use core_library::{PlaylistId, PlaylistRegistry};
use tracing::{debug, warn};

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Known playlists whose `snapshotId` changed
    pub changed: Vec<PlaylistId>,
    /// Composites that went from clean to `needsSync`
    pub newly_stale: Vec<PlaylistId>,
    /// Playlists newly flagged `deletedOnSpotify`
    pub newly_deleted: Vec<PlaylistId>,
    /// Playlists flagged deleted earlier that showed up again
    pub restored: Vec<PlaylistId>,
    /// Remote playlists inserted as new leaves
    pub inserted: Vec<PlaylistId>,
    pub renamed: Vec<PlaylistId>,
}

impl MergeReport {
    /// Whether the merge left the registry unchanged.
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
            && self.newly_stale.is_empty()
            && self.newly_deleted.is_empty()
            && self.restored.is_empty()
            && self.inserted.is_empty()
            && self.renamed.is_empty()
    }
}

/// Merge `remote` into a copy of `registry`.
pub fn merge_remote_snapshot(
    registry: &PlaylistRegistry,
    remote: &[RemotePlaylist],
) -> (PlaylistRegistry, MergeReport) {
    let mut next = registry.clone();
    let mut report = MergeReport::default();

    let mut tentatively_deleted: HashSet<PlaylistId> = next.ids().cloned().collect();
    let mut changed_this_pass: Vec<PlaylistId> = Vec::new();
    let mut unknown: Vec<&RemotePlaylist> = Vec::new();
    let mut seen_unknown: HashSet<&str> = HashSet::new();

    for entry in remote {
        let Some(playlist) = next.get_mut(&entry.id) else {
            if seen_unknown.insert(entry.id.as_str()) {
                unknown.push(entry);
            }
            continue;
        };

        tentatively_deleted.remove(entry.id.as_str());

        if playlist.deleted_on_spotify {
            playlist.deleted_on_spotify = false;
            report.restored.push(playlist.id.clone());
        }
        if playlist.snapshot_id != entry.snapshot_id {
            playlist.snapshot_id = entry.snapshot_id.clone();
            changed_this_pass.push(playlist.id.clone());
        }
        if playlist.name != entry.name {
            playlist.name = entry.name.clone();
            report.renamed.push(playlist.id.clone());
        }
    }

    report.changed = changed_this_pass.clone();
    report.newly_stale = propagate_staleness(&mut next, changed_this_pass);

    for entry in unknown {
        match next.attach_leaf(entry.id.as_str(), entry.name.as_str(), entry.snapshot_id.as_str(), true) {
            Ok(_) => report.inserted.push(PlaylistId::new(entry.id.as_str())),
            Err(err) => warn!(playlist_id = %entry.id, error = %err, "Could not insert remote playlist"),
        }
    }

    let mut deleted: Vec<PlaylistId> = tentatively_deleted.into_iter().collect();
    deleted.sort();
    for id in deleted {
        if let Some(playlist) = next.get_mut(id.as_str()) {
            if !playlist.deleted_on_spotify {
                playlist.deleted_on_spotify = true;
                report.newly_deleted.push(id);
            }
        }
    }

    debug!(
        changed = report.changed.len(),
        newly_stale = report.newly_stale.len(),
        newly_deleted = report.newly_deleted.len(),
        inserted = report.inserted.len(),
        "Merged remote snapshot"
    );

    (next, report)
}

/// Mark every transitive parent of `changed` as needing a sync.
///
/// Returns the parents that were clean before.
/// Keep the registry's state for playlists committed while `listing` was
/// being fetched.
///
/// `before` is the registry as it was when the fetch started. Any playlist
/// of `current` whose `snapshotId` differs from `before`, or that `before`
/// did not have, was pushed or created by this engine in the meantime: its
/// listing entry takes the current `snapshotId`, and it is added to the
/// listing when the fetch missed it.
pub fn pin_local_changes(
    mut listing: Vec<RemotePlaylist>,
    before: &PlaylistRegistry,
    current: &PlaylistRegistry,
) -> Vec<RemotePlaylist> {
    for playlist in current.iter() {
        let unchanged = before
            .get(playlist.id.as_str())
            .is_some_and(|old| old.snapshot_id == playlist.snapshot_id);
        if unchanged {
            continue;
        }

        debug!(playlist_id = %playlist.id, "Committed during fetch, keeping local snapshot");
        match listing.iter_mut().find(|entry| entry.id == playlist.id.as_str()) {
            Some(entry) => entry.snapshot_id = playlist.snapshot_id.clone(),
            None => listing.push(RemotePlaylist::new(
                playlist.id.as_str(),
                playlist.name.as_str(),
                playlist.snapshot_id.as_str(),
            )),
        }
    }
    listing
}

fn propagate_staleness(registry: &mut PlaylistRegistry, changed: Vec<PlaylistId>) -> Vec<PlaylistId> {
    let parents = registry.parent_map();
    for component in parents.keys() {
        if !registry.contains(component.as_str()) {
            warn!(component_id = %component, "Missing dependency: component is not in the registry");
        }
    }

    let mut newly_stale = Vec::new();
    let mut visited: HashSet<PlaylistId> = changed.iter().cloned().collect();
    let mut queue: VecDeque<PlaylistId> = changed.into();

    while let Some(id) = queue.pop_front() {
        let Some(parent_ids) = parents.get(&id) else {
            continue;
        };
        for parent_id in parent_ids {
            if !visited.insert(parent_id.clone()) {
                continue;
            }
            let Some(parent) = registry.get_mut(parent_id.as_str()) else {
                warn!(playlist_id = %parent_id, "Unknown parent id during staleness propagation");
                continue;
            };
            if !parent.needs_sync {
                parent.needs_sync = true;
                newly_stale.push(parent_id.clone());
            }
            queue.push_back(parent_id.clone());
        }
    }

    newly_stale
}
