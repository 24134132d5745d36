//! # Playlist Sync Module
//!
//! Keeps composite playlists on the remote music service in step with their
//! components.
//!
//! ## Overview
//!
//! A *composite* playlist is the sorted concatenation of its component
//! playlists. When a component changes remotely, every composite above it
//! becomes stale; a sync recomputes its content and pushes it back.
//!
//! ## Components
//!
//! - **Merger** (`merger`): Folds a remote playlist listing into the registry
//!   and propagates staleness upward
//! - **Planner** (`planner`): Orders dirty playlists so components are pushed
//!   before the composites built from them
//! - **Deleted-component check** (`deleted`): Decides whether a deleted
//!   composite can be recreated
//! - **Aggregator** (`aggregator`): Fetches and sorts a composite's tracks
//! - **Diff** (`diff`): Previews what a sync would change
//! - **Gateway** (`gateway`): Remote access with auth retry, paging and
//!   batched writes
//! - **Sync Coordinator** (`coordinator`): Orchestrates refreshes, pushes and
//!   registry edits with atomic commits

pub mod aggregator;
mod collation;
pub mod coordinator;
pub mod deleted;
pub mod diff;
pub mod error;
pub mod gateway;
pub mod lock;
pub mod merger;
pub mod planner;
pub mod session;

pub use aggregator::{compute_sorted_track_list, gather_component_tracks, sort_records, sort_tracks};
pub use coordinator::{CompositeUpdate, SyncCoordinator, SyncReport};
pub use deleted::has_unrecoverable_deleted_component;
pub use diff::{diff_tracks, TrackDiff};
pub use error::{Result, SyncError};
pub use gateway::RemoteGateway;
pub use lock::{SyncLockGuard, SyncLocks};
pub use merger::{merge_remote_snapshot, pin_local_changes, MergeReport};
pub use planner::plan_sync_order;
pub use session::SyncSession;
