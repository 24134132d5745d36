//! Detection of composites that can no longer be rebuilt.

use std::collections::HashSet;

use core_library::{PlaylistId, PlaylistRegistry};
use tracing::warn;

/// Whether `playlist_id` depends on content that is gone for good.
///
/// Content is gone when a transitive component is missing from the registry
/// or is a leaf deleted on the remote service. Deleted composites are walked
/// through rather than counted: they can be recreated from their own
/// components. An unknown `playlist_id` counts as gone.
pub fn has_unrecoverable_deleted_component(registry: &PlaylistRegistry, playlist_id: &str) -> bool {
    let Some(root) = registry.get(playlist_id) else {
        return true;
    };

    let mut checked: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&PlaylistId> = root.component_playlist_ids.iter().collect();

    while let Some(id) = stack.pop() {
        if !checked.insert(id.as_str()) {
            continue;
        }
        let Some(playlist) = registry.get(id.as_str()) else {
            warn!(playlist_id, component_id = %id, "Missing dependency: component is not in the registry");
            return true;
        };
        if playlist.deleted_on_spotify && playlist.is_leaf() {
            return true;
        }
        stack.extend(playlist.component_playlist_ids.iter());
    }

    false
}
