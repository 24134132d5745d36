//! Per-playlist exclusion for pushes.
//!
//! A push holds its playlists until its guard drops. A second push touching
//! any of them fails fast with [`SyncError::Busy`] instead of queueing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use core_library::PlaylistId;
use tracing::debug;

use crate::error::{Result, SyncError};

type ActiveSet = Arc<Mutex<HashSet<PlaylistId>>>;

/// Set of playlists with a push in progress.
#[derive(Debug, Clone, Default)]
pub struct SyncLocks {
    active: ActiveSet,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> MutexGuard<'_, HashSet<PlaylistId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock every id in `ids`, or none of them.
    pub fn try_acquire(&self, ids: &[PlaylistId]) -> Result<SyncLockGuard> {
        let mut active = self.active();
        if let Some(busy) = ids.iter().find(|id| active.contains(*id)) {
            return Err(SyncError::Busy {
                playlist_id: busy.to_string(),
            });
        }

        let mut held = Vec::with_capacity(ids.len());
        for id in ids {
            if active.insert(id.clone()) {
                held.push(id.clone());
            }
        }
        debug!(playlists = held.len(), "Acquired sync locks");

        Ok(SyncLockGuard {
            ids: held,
            active: self.active.clone(),
        })
    }

    pub fn is_locked(&self, id: &str) -> bool {
        self.active().contains(id)
    }
}

/// Releases its playlists on drop.
#[derive(Debug)]
pub struct SyncLockGuard {
    ids: Vec<PlaylistId>,
    active: ActiveSet,
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &self.ids {
            active.remove(id);
        }
    }
}
