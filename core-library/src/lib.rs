//! # Library Module
//!
//! Owns the playlist registry: the data model, sort specifications, user
//! edits and persistence.
//!
//! ## Overview
//!
//! This module manages:
//! - [`ExtendablePlaylist`] entities keyed by remote [`PlaylistId`]
//! - The [`SortSpec`] codec and the track fields each spec needs
//! - Acyclicity validation on every composition edit
//! - Schema migrations and per-user storage through
//!   [`SettingsStore`](bridge_traits::SettingsStore)

pub mod error;
pub mod migrations;
pub mod models;
pub mod registry;
pub mod repository;
pub mod sort_spec;

pub use error::{LibraryError, Result};
pub use migrations::{migrate, PersistedRegistry, CURRENT_SCHEMA_VERSION};
pub use models::{ExtendablePlaylist, NamedTrack, PlaylistId};
pub use registry::{ParentMap, PlaylistRegistry};
pub use repository::{RegistryRepository, SettingsRegistryRepository};
pub use sort_spec::{SortClause, SortDirection, SortKey, SortSpec};
