//! # Sync Coordinator
//!
//! Orchestrates remote refreshes, pushes and registry edits for one user.
//!
//! ## Overview
//!
//! The coordinator owns the in-memory [`PlaylistRegistry`] and is its only
//! writer. Every operation that changes it follows the same shape:
//!
//! 1. Read a snapshot of the registry
//! 2. Do the remote I/O (fetch, create, push)
//! 3. Commit: apply the result to a copy, persist the copy, swap it in
//!
//! A failed step leaves the registry as it was. Pure work (merge, plan, sort,
//! diff, deleted check) lives in sibling modules and never suspends.
//!
//! ## Concurrency
//!
//! Pushes take per-playlist locks through [`SyncLocks`]; a second push
//! touching a playlist already being pushed fails with [`SyncError::Busy`].
//! A multi-playlist sync pushes its plan strictly in order and stops at the
//! first failure.
//!
//! ## Usage
//!
//! ```ignore
//! use core_sync::{SyncCoordinator, SyncSession};
//!
//! let coordinator = SyncCoordinator::load(config, "user-1", event_bus).await?;
//! let session = SyncSession::new();
//!
//! coordinator.refresh_if_needed(&session, false).await?;
//! let preview = coordinator.preview_sync("mix-id").await?;
//! let report = coordinator.sync_playlist("mix-id").await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{Clock, RemotePlaylist, TrackRecord, Visibility};
use core_auth::AuthManager;
use core_library::{
    ExtendablePlaylist, NamedTrack, PlaylistId, PlaylistRegistry, RegistryRepository,
    SettingsRegistryRepository, SortSpec,
};
use core_runtime::{CoreEvent, EngineConfig, EventBus, RegistryEvent, SyncEvent};
use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::aggregator::{compute_sorted_track_list, gather_component_tracks, sort_records, sort_tracks};
use crate::deleted::has_unrecoverable_deleted_component;
use crate::diff::{diff_tracks, TrackDiff};
use crate::error::{Result, SyncError};
use crate::gateway::RemoteGateway;
use crate::lock::SyncLocks;
use crate::merger::{merge_remote_snapshot, pin_local_changes, MergeReport};
use crate::planner::plan_sync_order;
use crate::session::SyncSession;

/// Result of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub run_id: String,
    /// Playlists pushed, in push order
    pub pushed: Vec<PlaylistId>,
}

/// Changes to apply to a composite with [`SyncCoordinator::update_composite`].
#[derive(Debug, Clone, Default)]
pub struct CompositeUpdate {
    /// New component list; `None` keeps the current one
    pub components: Option<Vec<PlaylistId>>,
    /// New sort order; `None` keeps the current one
    pub sort_spec: Option<SortSpec>,
}

/// Per-user sync engine.
pub struct SyncCoordinator {
    user_id: String,
    registry: RwLock<PlaylistRegistry>,
    repository: Arc<dyn RegistryRepository>,
    gateway: RemoteGateway,
    auth: Arc<AuthManager>,
    locks: SyncLocks,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    default_sort_spec: SortSpec,
    default_public_playlists: bool,
}

impl SyncCoordinator {
    /// Load `user_id`'s registry from the configured settings store.
    pub async fn load(config: EngineConfig, user_id: impl Into<String>, event_bus: EventBus) -> Result<Self> {
        let repository = Arc::new(SettingsRegistryRepository::new(config.settings_store.clone()));
        Self::with_repository(config, user_id, event_bus, repository).await
    }

    /// Load `user_id`'s registry from a custom repository.
    pub async fn with_repository(
        config: EngineConfig,
        user_id: impl Into<String>,
        event_bus: EventBus,
        repository: Arc<dyn RegistryRepository>,
    ) -> Result<Self> {
        config.validate()?;
        let user_id = user_id.into();
        let default_sort_spec = SortSpec::parse(&config.default_sort_spec)?;

        let registry = repository.load(&user_id).await?;
        if registry.has_cycle() {
            warn!(user_id = %user_id, "Stored registry has a component cycle");
        }
        info!(user_id = %user_id, playlists = registry.len(), "Sync coordinator ready");

        let auth = Arc::new(AuthManager::new(
            config.token_refresher.clone(),
            event_bus.clone(),
            config.clock.clone(),
        ));
        let gateway = RemoteGateway::new(&config, auth.clone());

        Ok(Self {
            user_id,
            registry: RwLock::new(registry),
            repository,
            gateway,
            auth,
            locks: SyncLocks::new(),
            event_bus,
            clock: config.clock.clone(),
            default_sort_spec,
            default_public_playlists: config.default_public_playlists,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Credential state used for the auth retry.
    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// A consistent copy of the registry.
    pub async fn registry(&self) -> PlaylistRegistry {
        self.registry.read().await.clone()
    }

    pub async fn playlist(&self, id: &str) -> Option<ExtendablePlaylist> {
        self.registry.read().await.get(id).cloned()
    }

    /// Apply `edit` to a copy of the registry, persist it, then publish it.
    ///
    /// Readers see either the old or the new registry, never a partial edit.
    async fn commit<T>(&self, edit: impl FnOnce(&mut PlaylistRegistry) -> Result<T>) -> Result<T> {
        let mut registry = self.registry.write().await;
        let mut next = registry.clone();
        let value = edit(&mut next)?;
        self.repository.save(&self.user_id, &next).await?;
        *registry = next;
        Ok(value)
    }

    fn emit(&self, event: CoreEvent) {
        let _ = self.event_bus.emit(event);
    }

    // =========================================================================
    // Remote refresh
    // =========================================================================

    /// Fetch the remote playlist listing and merge it into the registry.
    ///
    /// Followed playlists are not in the owned listing, so each one is probed
    /// individually; a probe answered with not-found leaves the playlist out
    /// of the listing and it is flagged deleted. Pushes committed while the
    /// listing was in flight keep their snapshot.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn refresh_from_remote(&self) -> Result<MergeReport> {
        let before = self.registry.read().await.clone();
        let mut remote = self.gateway.fetch_all_owned_playlists().await?;

        let external_ids = before.external_ids();
        let probes = try_join_all(external_ids.iter().map(|id| self.gateway.probe_playlist(id.as_str()))).await?;
        remote.extend(probes.into_iter().flatten());
        debug!(remote = remote.len(), probed = external_ids.len(), "Fetched remote playlists");

        let report = self
            .merge_listing(|registry| pin_local_changes(remote, &before, registry))
            .await?;
        info!(
            changed = report.changed.len(),
            newly_stale = report.newly_stale.len(),
            newly_deleted = report.newly_deleted.len(),
            inserted = report.inserted.len(),
            "Refreshed from remote"
        );
        Ok(report)
    }

    /// Merge an already aggregated remote listing.
    pub async fn merge(&self, remote: &[RemotePlaylist]) -> Result<MergeReport> {
        self.merge_listing(|_| remote.to_vec()).await
    }

    /// Merge the listing `listing` builds from the registry being committed.
    async fn merge_listing(
        &self,
        listing: impl FnOnce(&PlaylistRegistry) -> Vec<RemotePlaylist>,
    ) -> Result<MergeReport> {
        let report = self
            .commit(|registry| {
                let remote = listing(registry);
                let (next, report) = merge_remote_snapshot(registry, &remote);
                *registry = next;
                Ok(report)
            })
            .await?;

        self.emit(CoreEvent::Registry(RegistryEvent::Merged {
            changed: report.changed.len() as u64,
            newly_stale: report.newly_stale.len() as u64,
            newly_deleted: report.newly_deleted.len() as u64,
            inserted: report.inserted.len() as u64,
        }));
        Ok(report)
    }

    /// Refresh once per session, or again when `force` is set.
    ///
    /// Returns `None` when the refresh was skipped.
    pub async fn refresh_if_needed(&self, session: &SyncSession, force: bool) -> Result<Option<MergeReport>> {
        if session.has_fetched() && !force {
            debug!("Remote state already fetched this session");
            return Ok(None);
        }
        let report = self.refresh_from_remote().await?;
        session.mark_fetched();
        Ok(Some(report))
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Show what syncing composite `id` would change, without pushing.
    ///
    /// Dirty composite components are computed in memory, in push order, so
    /// the preview matches what [`sync_playlist`](Self::sync_playlist) pushes.
    #[instrument(skip(self))]
    pub async fn preview_sync(&self, id: &str) -> Result<Vec<TrackDiff>> {
        let (playlist, dirty) = {
            let registry = self.registry.read().await;
            let playlist = self.composite_in(&registry, id)?;
            warn_missing_components(&registry, &playlist);
            let dirty: Vec<ExtendablePlaylist> = plan_sync_order(&registry, std::slice::from_ref(&playlist.id))
                .into_iter()
                .filter(|planned| *planned != playlist.id)
                .filter_map(|planned| registry.get(planned.as_str()).cloned())
                .filter(ExtendablePlaylist::is_composite)
                .collect();
            (playlist, dirty)
        };

        // Every planned composite is sorted from the same records, so fetch
        // the fields any of them needs
        let fields = dirty
            .iter()
            .fold(playlist.sort_spec.field_set(), |fields, p| fields.union(p.sort_spec.field_set()));

        let mut pending: HashMap<PlaylistId, Vec<TrackRecord>> = HashMap::new();
        for component in &dirty {
            let tracks =
                gather_component_tracks(&self.gateway, &component.component_playlist_ids, &fields, &pending).await?;
            pending.insert(component.id.clone(), sort_records(tracks, &component.sort_spec));
        }
        debug!(pending = pending.len(), "Computed dirty components in memory");

        let tracks = gather_component_tracks(&self.gateway, &playlist.component_playlist_ids, &fields, &pending).await?;
        let tracks = sort_tracks(tracks, &playlist.sort_spec);
        Ok(diff_tracks(&playlist.last_sync_tracks, &tracks))
    }

    /// Push composite `id`, after any of its dirty transitive components.
    ///
    /// `id` itself is pushed even when it is not dirty.
    pub async fn sync_playlist(&self, id: &str) -> Result<SyncReport> {
        self.composite(id).await?;
        let root = PlaylistId::new(id);

        let mut plan = plan_sync_order(&*self.registry.read().await, std::slice::from_ref(&root));
        if !plan.contains(&root) {
            plan.push(root);
        }
        self.run_plan(plan).await
    }

    /// Push every dirty playlist reachable from `roots`, dependencies first.
    pub async fn sync_playlists(&self, roots: &[PlaylistId]) -> Result<SyncReport> {
        let plan = plan_sync_order(&*self.registry.read().await, roots);
        self.run_plan(plan).await
    }

    /// Push `plan` in order, stopping at the first failure.
    #[instrument(skip(self, plan), fields(plan = plan.len()))]
    async fn run_plan(&self, plan: Vec<PlaylistId>) -> Result<SyncReport> {
        let _guard = self.locks.try_acquire(&plan)?;

        let run_id = Uuid::new_v4().to_string();
        let started_at = self.clock.unix_timestamp_millis();
        self.emit(CoreEvent::Sync(SyncEvent::Started {
            run_id: run_id.clone(),
            plan: plan.iter().map(PlaylistId::to_string).collect(),
        }));

        let mut pushed = Vec::with_capacity(plan.len());
        for id in &plan {
            if let Err(err) = self.push_one(&run_id, id).await {
                error!(playlist_id = %id, error = %err, "Sync failed, abandoning remaining plan");
                self.emit(CoreEvent::Sync(SyncEvent::Failed {
                    run_id: run_id.clone(),
                    playlist_id: id.to_string(),
                    message: err.to_string(),
                    pushed: pushed.len() as u64,
                }));
                return Err(err);
            }
            pushed.push(id.clone());
        }

        let duration_ms = (self.clock.unix_timestamp_millis() - started_at).max(0) as u64;
        info!(pushed = pushed.len(), duration_ms, "Sync completed");
        self.emit(CoreEvent::Sync(SyncEvent::Completed {
            run_id: run_id.clone(),
            pushed: pushed.len() as u64,
            duration_ms,
        }));

        Ok(SyncReport { run_id, pushed })
    }

    /// Recompute and push one composite; the caller holds its lock.
    async fn push_one(&self, run_id: &str, id: &PlaylistId) -> Result<()> {
        let playlist = self.composite(id.as_str()).await?;
        let tracks = self.compute_tracks(&playlist).await?;
        let snapshot_id = self.gateway.push_tracks(id.as_str(), &uris_of(&tracks)).await?;
        let track_count = tracks.len() as u64;

        self.commit(|registry| {
            registry.record_push(id.as_str(), snapshot_id.as_str(), tracks)?;
            registry.mark_ancestors_need_sync(id.as_str());
            Ok(())
        })
        .await?;

        self.emit(CoreEvent::Sync(SyncEvent::PlaylistPushed {
            run_id: run_id.to_string(),
            playlist_id: id.to_string(),
            snapshot_id,
            track_count,
        }));
        Ok(())
    }

    // =========================================================================
    // Composite lifecycle
    // =========================================================================

    /// Create a composite on the remote service and start tracking it.
    ///
    /// `sort_spec` and `public` fall back to the configured defaults.
    #[instrument(skip(self, components, sort_spec))]
    pub async fn create_composite(
        &self,
        name: &str,
        components: Vec<PlaylistId>,
        sort_spec: Option<SortSpec>,
        public: Option<bool>,
    ) -> Result<PlaylistId> {
        let sort_spec = sort_spec.unwrap_or_else(|| self.default_sort_spec.clone());
        // Validate against a throwaway copy before creating anything remotely
        let draft = ExtendablePlaylist::composite(
            format!("pending:{}", Uuid::new_v4()),
            name,
            "",
            components.clone(),
            sort_spec.clone(),
            vec![],
        );
        self.registry.read().await.clone().insert_composite(draft)?;

        let tracks = compute_sorted_track_list(&self.gateway, &components, &sort_spec).await?;
        let visibility = Visibility::from_public(public.unwrap_or(self.default_public_playlists));
        let id = PlaylistId::new(self.gateway.create_playlist(name, visibility).await?);
        let snapshot_id = self.gateway.push_tracks(id.as_str(), &uris_of(&tracks)).await?;

        let playlist = ExtendablePlaylist::composite(id.clone(), name, snapshot_id, components, sort_spec, tracks);
        self.commit(|registry| {
            registry.insert_composite(playlist)?;
            Ok(())
        })
        .await?;

        info!(playlist_id = %id, "Created composite playlist");
        self.emit(CoreEvent::Registry(RegistryEvent::PlaylistCreated {
            playlist_id: id.to_string(),
            name: name.to_string(),
        }));
        Ok(id)
    }

    /// Edit a composite's components or sort order and push the result.
    #[instrument(skip(self, update))]
    pub async fn update_composite(&self, id: &str, update: CompositeUpdate) -> Result<()> {
        let _guard = self.locks.try_acquire(&[PlaylistId::new(id)])?;

        let apply_edit = |registry: &mut PlaylistRegistry| -> Result<()> {
            if let Some(components) = update.components.clone() {
                registry.set_components(id, components)?;
            }
            if let Some(sort_spec) = update.sort_spec.clone() {
                registry.set_sort_spec(id, sort_spec)?;
            }
            Ok(())
        };

        let edited = {
            let mut draft = self.registry.read().await.clone();
            self.composite_in(&draft, id)?;
            apply_edit(&mut draft)?;
            self.composite_in(&draft, id)?
        };

        let tracks = self.compute_tracks(&edited).await?;
        let snapshot_id = self.gateway.push_tracks(id, &uris_of(&tracks)).await?;

        self.commit(|registry| {
            apply_edit(registry)?;
            registry.record_push(id, snapshot_id, tracks)?;
            registry.mark_ancestors_need_sync(id);
            Ok(())
        })
        .await?;

        self.emit(CoreEvent::Registry(RegistryEvent::ComponentsChanged {
            playlist_id: id.to_string(),
        }));
        Ok(())
    }

    /// Recreate a composite that was deleted on the remote service.
    ///
    /// The playlist gets a new remote id; every composite listing the old id
    /// is updated to the new one.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Unrecoverable`] when the playlist is not deleted, a
    ///   component it depends on is gone for good, or a direct component is
    ///   itself a deleted composite that must be recreated first
    #[instrument(skip(self))]
    pub async fn recreate_deleted(&self, id: &str, public: Option<bool>) -> Result<PlaylistId> {
        let _guard = self.locks.try_acquire(&[PlaylistId::new(id)])?;

        let playlist = {
            let registry = self.registry.read().await;
            let playlist = self.composite_in(&registry, id)?;
            if !playlist.deleted_on_spotify {
                return Err(SyncError::Unrecoverable {
                    playlist_id: id.to_string(),
                    reason: "playlist still exists on the remote service".to_string(),
                });
            }
            if has_unrecoverable_deleted_component(&registry, id) {
                return Err(SyncError::Unrecoverable {
                    playlist_id: id.to_string(),
                    reason: "a component playlist is gone".to_string(),
                });
            }
            if let Some(blocked) = playlist
                .component_playlist_ids
                .iter()
                .find(|c| registry.get(c.as_str()).is_some_and(|p| p.deleted_on_spotify))
            {
                return Err(SyncError::Unrecoverable {
                    playlist_id: id.to_string(),
                    reason: format!("component {} must be recreated first", blocked),
                });
            }
            playlist
        };

        let tracks = self.compute_tracks(&playlist).await?;
        let visibility = Visibility::from_public(public.unwrap_or(self.default_public_playlists));
        let new_id = PlaylistId::new(self.gateway.create_playlist(&playlist.name, visibility).await?);
        let snapshot_id = self.gateway.push_tracks(new_id.as_str(), &uris_of(&tracks)).await?;

        self.commit(|registry| {
            registry.replace_id(id, new_id.clone())?;
            registry.record_push(new_id.as_str(), snapshot_id, tracks)?;
            registry.mark_ancestors_need_sync(new_id.as_str());
            Ok(())
        })
        .await?;

        info!(old_id = id, new_id = %new_id, "Recreated deleted playlist");
        self.emit(CoreEvent::Registry(RegistryEvent::PlaylistRecreated {
            old_id: id.to_string(),
            new_id: new_id.to_string(),
        }));
        Ok(new_id)
    }

    // =========================================================================
    // Local registry edits
    // =========================================================================

    /// Start tracking an existing remote playlist as a leaf.
    pub async fn attach_leaf(&self, remote: &RemotePlaylist, is_user_playlist: bool) -> Result<()> {
        self.commit(|registry| {
            registry.attach_leaf(remote.id.as_str(), remote.name.as_str(), remote.snapshot_id.as_str(), is_user_playlist)?;
            Ok(())
        })
        .await
    }

    /// Stop tracking a playlist locally. The remote playlist is untouched.
    ///
    /// Composites listing it keep the reference, which blocks their
    /// recreation.
    pub async fn remove(&self, id: &str) -> Result<ExtendablePlaylist> {
        let _guard = self.locks.try_acquire(&[PlaylistId::new(id)])?;
        let removed = self.commit(|registry| Ok(registry.remove(id)?)).await?;
        self.emit(CoreEvent::Registry(RegistryEvent::PlaylistRemoved {
            playlist_id: id.to_string(),
        }));
        Ok(removed)
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<()> {
        self.commit(|registry| Ok(registry.rename(id, name)?)).await
    }

    /// Move a playlist to another display position.
    pub async fn set_sort_number(&self, id: &str, sort_number: i64) -> Result<()> {
        self.commit(|registry| Ok(registry.set_sort_number(id, sort_number)?)).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn composite(&self, id: &str) -> Result<ExtendablePlaylist> {
        self.composite_in(&*self.registry.read().await, id)
    }

    fn composite_in(&self, registry: &PlaylistRegistry, id: &str) -> Result<ExtendablePlaylist> {
        let playlist = registry
            .get(id)
            .ok_or_else(|| SyncError::PlaylistNotFound(id.to_string()))?;
        if playlist.is_leaf() {
            return Err(SyncError::NotComposite(id.to_string()));
        }
        Ok(playlist.clone())
    }

    async fn compute_tracks(&self, playlist: &ExtendablePlaylist) -> Result<Vec<NamedTrack>> {
        warn_missing_components(&*self.registry.read().await, playlist);
        compute_sorted_track_list(&self.gateway, &playlist.component_playlist_ids, &playlist.sort_spec).await
    }
}

fn warn_missing_components(registry: &PlaylistRegistry, playlist: &ExtendablePlaylist) {
    for component in &playlist.component_playlist_ids {
        if !registry.contains(component.as_str()) {
            warn!(
                playlist_id = %playlist.id,
                component_id = %component,
                "Missing dependency: component is not in the registry"
            );
        }
    }
}

fn uris_of(tracks: &[NamedTrack]) -> Vec<String> {
    tracks.iter().map(|track| track.uri.clone()).collect()
}
