//! Sync order planning.
//!
//! Given the playlists the user asked to sync, [`plan_sync_order`] lists every
//! dirty playlist reachable through components, each exactly once, with every
//! playlist after all of its dirty transitive components. Pushing in that
//! order means a composite is always computed from already-fresh components.

use std::collections::HashSet;

use core_library::{PlaylistId, PlaylistRegistry};
use tracing::warn;

enum Visit {
    Enter(PlaylistId),
    Exit(PlaylistId),
}

/// Order the dirty playlists reachable from `roots` for pushing.
///
/// Clean playlists are traversed but not emitted. Unknown ids are skipped
/// with a warning. A cycle in stored data is broken at the back edge rather
/// than looping.
pub fn plan_sync_order(registry: &PlaylistRegistry, roots: &[PlaylistId]) -> Vec<PlaylistId> {
    let mut order = Vec::new();
    let mut done: HashSet<PlaylistId> = HashSet::new();
    let mut on_path: HashSet<PlaylistId> = HashSet::new();
    let mut stack: Vec<Visit> = roots.iter().rev().cloned().map(Visit::Enter).collect();

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(id) => {
                if done.contains(&id) {
                    continue;
                }
                if on_path.contains(&id) {
                    warn!(playlist_id = %id, "Cycle in playlist components, skipping back edge");
                    continue;
                }
                let Some(playlist) = registry.get(id.as_str()) else {
                    warn!(playlist_id = %id, "Missing dependency: playlist is not in the registry");
                    continue;
                };

                on_path.insert(id.clone());
                stack.push(Visit::Exit(id));
                stack.extend(
                    playlist
                        .component_playlist_ids
                        .iter()
                        .rev()
                        .cloned()
                        .map(Visit::Enter),
                );
            }
            Visit::Exit(id) => {
                on_path.remove(&id);
                if registry.get(id.as_str()).is_some_and(|p| p.needs_sync) {
                    order.push(id.clone());
                }
                done.insert(id);
            }
        }
    }

    order
}
