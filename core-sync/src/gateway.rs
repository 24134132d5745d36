//! # Remote Gateway
//!
//! Wraps the host's [`RemoteMusicService`] with the engine's calling
//! conventions.
//!
//! ## Overview
//!
//! - **Auth retry**: a request answered with `Unauthorized` triggers one
//!   access-token refresh through [`AuthManager`] and exactly one retry. A
//!   second rejection surfaces as [`SyncError::AuthExpired`].
//! - **Paging**: listings are read page by page until the service reports no
//!   further offset.
//! - **Batched writes**: a push replaces the first batch and appends the rest
//!   sequentially, so the final order matches the input.

use std::future::Future;
use std::sync::Arc;

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, Page, RemoteMusicService, RemotePlaylist, TrackFieldSet, TrackRecord, Visibility,
};
use core_auth::AuthManager;
use core_runtime::EngineConfig;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SyncError};

/// Remote service access with auth retry, paging and batched writes.
pub struct RemoteGateway {
    service: Arc<dyn RemoteMusicService>,
    auth: Arc<AuthManager>,
    write_batch_size: usize,
    playlist_page_size: u32,
    track_page_size: u32,
}

impl RemoteGateway {
    pub fn new(config: &EngineConfig, auth: Arc<AuthManager>) -> Self {
        Self {
            service: config.remote_service.clone(),
            auth,
            write_batch_size: config.write_batch_size.max(1),
            playlist_page_size: config.playlist_page_size,
            track_page_size: config.track_page_size,
        }
    }

    /// Run `request`, refreshing the access token and retrying once if the
    /// service rejects it.
    async fn call<T, F, Fut>(&self, operation: &'static str, request: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BridgeResult<T>>,
    {
        let token_before = self.auth.access_token().await.ok();

        match request().await {
            Ok(value) => Ok(value),
            Err(BridgeError::Unauthorized(message)) => {
                warn!(operation, %message, "Request unauthorized, refreshing access token");

                let Some(stale) = token_before else {
                    return Err(SyncError::AuthExpired(message));
                };
                let fresh = self
                    .auth
                    .refresh(&stale)
                    .await
                    .map_err(|err| SyncError::AuthExpired(err.to_string()))?;
                self.service.set_access_token(&fresh).await;

                debug!(operation, "Retrying with refreshed access token");
                request().await.map_err(SyncError::from)
            }
            Err(err) => Err(SyncError::from(err)),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Every playlist the user owns or follows, across all pages.
    #[instrument(skip(self))]
    pub async fn fetch_all_owned_playlists(&self) -> Result<Vec<RemotePlaylist>> {
        let limit = self.playlist_page_size;
        self.fetch_all_pages(|offset| async move {
            self.call("fetch_owned_playlists", || {
                self.service.fetch_owned_playlists(offset, limit)
            })
            .await
        })
        .await
    }

    /// Probe one playlist; `None` when the service no longer has it.
    pub async fn probe_playlist(&self, playlist_id: &str) -> Result<Option<RemotePlaylist>> {
        match self
            .call("fetch_playlist", || self.service.fetch_playlist(playlist_id))
            .await
        {
            Ok(playlist) => Ok(Some(playlist)),
            Err(SyncError::RemoteRequestFailed(err)) if err.is_not_found() => {
                debug!(playlist_id, "Probed playlist no longer exists");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Every track of one playlist, in playlist order.
    #[instrument(skip(self, fields))]
    pub async fn fetch_all_tracks(
        &self,
        playlist_id: &str,
        fields: &TrackFieldSet,
    ) -> Result<Vec<TrackRecord>> {
        let limit = self.track_page_size;
        let tracks = self
            .fetch_all_pages(|offset| async move {
                self.call("fetch_tracks", || {
                    self.service.fetch_tracks(playlist_id, fields, offset, limit)
                })
                .await
            })
            .await?;
        debug!(count = tracks.len(), "Fetched playlist tracks");
        Ok(tracks)
    }

    async fn fetch_all_pages<T, F, Fut>(&self, fetch_page: F) -> Result<Vec<T>>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let page = fetch_page(offset).await?;
            let next = page.next_offset();
            items.extend(page.items);
            match next {
                Some(next) => offset = next,
                None => break,
            }
        }

        Ok(items)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn create_playlist(&self, name: &str, visibility: Visibility) -> Result<String> {
        self.call("create_playlist", || self.service.create_playlist(name, visibility))
            .await
    }

    /// Make `uris` the full content of `playlist_id`.
    ///
    /// The first batch replaces the existing content (an empty list clears
    /// it), later batches are appended one after another.
    ///
    /// # Returns
    ///
    /// The snapshot id reported by the last write.
    #[instrument(skip(self, uris), fields(tracks = uris.len()))]
    pub async fn push_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<String> {
        let mut batches = uris.chunks(self.write_batch_size);
        let first = batches.next().unwrap_or(&[]);

        let mut snapshot_id = self
            .call("replace_tracks", || self.service.replace_tracks(playlist_id, first))
            .await?;

        for batch in batches {
            snapshot_id = self
                .call("add_tracks", || self.service.add_tracks(playlist_id, batch, None))
                .await?;
        }

        debug!(%snapshot_id, "Pushed playlist content");
        Ok(snapshot_id)
    }
}
