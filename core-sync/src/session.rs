//! Per-session refresh gate.

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether remote state was already fetched in this app session.
///
/// The host creates one per session (typically per sign-in) and passes it to
/// [`SyncCoordinator::refresh_if_needed`](crate::SyncCoordinator::refresh_if_needed),
/// which fetches on first use and skips afterwards unless forced.
#[derive(Debug, Default)]
pub struct SyncSession {
    fetched: AtomicBool,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fetched(&self) -> bool {
        self.fetched.load(Ordering::Acquire)
    }

    pub(crate) fn mark_fetched(&self) {
        self.fetched.store(true, Ordering::Release);
    }

    /// Force the next [`refresh_if_needed`](crate::SyncCoordinator::refresh_if_needed) to fetch.
    pub fn invalidate(&self) {
        self.fetched.store(false, Ordering::Release);
    }
}
