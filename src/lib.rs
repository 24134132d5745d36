//! Workspace facade crate.
//!
//! Re-exports the workspace crates so a host application can depend on
//! `playlist-extender` alone and reach the registry, the sync engine and the
//! collaborator traits it has to implement.

pub use bridge_traits;
pub use core_auth;
pub use core_library;
pub use core_runtime;
pub use core_sync;

pub use core_library::{ExtendablePlaylist, NamedTrack, PlaylistId, PlaylistRegistry, SortSpec};
pub use core_sync::{SyncCoordinator, SyncError, SyncSession};
pub use core_runtime::{CoreEvent, EngineConfig, EventBus};
pub use core_sync::{CompositeUpdate, MergeReport, SyncReport, TrackDiff};
