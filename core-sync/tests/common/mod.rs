//! In-memory stand-ins for the host collaborators.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, Page, RemoteMusicService, RemotePlaylist, SettingsStore, TokenGrant,
    TokenRefresher, TrackFieldSet, TrackRecord, Visibility,
};
use core_runtime::EngineConfig;
use core_sync::SyncCoordinator;
use tokio::sync::{Mutex, Notify};

// =============================================================================
// Remote service
// =============================================================================

#[derive(Debug, Clone)]
struct RemoteEntry {
    name: String,
    snapshot_id: String,
    tracks: Vec<TrackRecord>,
    /// Shows up in the owned-playlists listing
    owned: bool,
}

#[derive(Default)]
struct FakeState {
    playlists: BTreeMap<String, RemoteEntry>,
    /// Every track ever seen, so pushed URIs keep their metadata
    catalog: HashMap<String, TrackRecord>,
    revision: u32,
    created: u32,
    failing_writes: HashSet<String>,
    rejected_token: Option<String>,
    current_token: String,
    writes: Vec<(String, usize)>,
}

impl FakeState {
    fn bump(&mut self, id: &str) -> String {
        self.revision += 1;
        let snapshot_id = format!("{}-r{}", id, self.revision);
        if let Some(entry) = self.playlists.get_mut(id) {
            entry.snapshot_id = snapshot_id.clone();
        }
        snapshot_id
    }

    fn authorize(&self) -> BridgeResult<()> {
        match &self.rejected_token {
            Some(rejected) if *rejected == self.current_token => {
                Err(BridgeError::Unauthorized("The access token expired".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn resolve(&self, uris: &[String]) -> Vec<TrackRecord> {
        uris.iter()
            .map(|uri| {
                self.catalog
                    .get(uri)
                    .cloned()
                    .unwrap_or_else(|| TrackRecord::new(uri.as_str(), uri.as_str()))
            })
            .collect()
    }

    fn check_write(&mut self, playlist_id: &str, count: usize) -> BridgeResult<()> {
        self.authorize()?;
        if self.failing_writes.contains(playlist_id) {
            return Err(BridgeError::Remote {
                status: 500,
                message: "Internal server error".to_string(),
            });
        }
        if !self.playlists.contains_key(playlist_id) {
            return Err(BridgeError::NotFound(playlist_id.to_string()));
        }
        self.writes.push((playlist_id.to_string(), count));
        Ok(())
    }
}

/// Remote music service holding playlists in memory.
#[derive(Default)]
pub struct FakeMusicService {
    state: Mutex<FakeState>,
    /// When set, `replace_tracks` signals `entered` and waits for `release`
    write_gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
    /// When set, the next owned-playlists page is read, then held until
    /// released
    listing_gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

pub fn track(uri: &str, name: &str) -> TrackRecord {
    TrackRecord::new(uri, name)
}

impl FakeMusicService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn add_playlist(&self, id: &str, name: &str, tracks: Vec<TrackRecord>, owned: bool) {
        let mut state = self.state.lock().await;
        for track in &tracks {
            state.catalog.insert(track.uri.clone(), track.clone());
        }
        state.playlists.insert(
            id.to_string(),
            RemoteEntry {
                name: name.to_string(),
                snapshot_id: String::new(),
                tracks,
                owned,
            },
        );
        state.bump(id);
    }

    /// Replace a playlist's tracks as if edited in another client.
    pub async fn edit_tracks(&self, id: &str, tracks: Vec<TrackRecord>) {
        let mut state = self.state.lock().await;
        for track in &tracks {
            state.catalog.insert(track.uri.clone(), track.clone());
        }
        if let Some(entry) = state.playlists.get_mut(id) {
            entry.tracks = tracks;
        }
        state.bump(id);
    }

    pub async fn delete_playlist(&self, id: &str) {
        self.state.lock().await.playlists.remove(id);
    }

    pub async fn fail_writes_to(&self, id: &str) {
        self.state.lock().await.failing_writes.insert(id.to_string());
    }

    /// Reject requests until a different access token is installed.
    pub async fn expire_token(&self, token: &str) {
        let mut state = self.state.lock().await;
        state.current_token = token.to_string();
        state.rejected_token = Some(token.to_string());
    }

    pub async fn current_token(&self) -> String {
        self.state.lock().await.current_token.clone()
    }

    pub async fn uris_of(&self, id: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .playlists
            .get(id)
            .map(|entry| entry.tracks.iter().map(|t| t.uri.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn snapshot_of(&self, id: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .playlists
            .get(id)
            .map(|entry| entry.snapshot_id.clone())
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.state.lock().await.playlists.contains_key(id)
    }

    /// `(playlist id, batch size)` of every successful write, in order.
    pub async fn writes(&self) -> Vec<(String, usize)> {
        self.state.lock().await.writes.clone()
    }

    /// Make the next `replace_tracks` pause until released.
    pub async fn hold_writes(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.write_gate.lock().await = Some((entered.clone(), release.clone()));
        (entered, release)
    }

    /// Make the next owned-playlists page answer with the state at the time
    /// of the call, but only once released.
    pub async fn hold_listing(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.listing_gate.lock().await = Some((entered.clone(), release.clone()));
        (entered, release)
    }
}

#[async_trait]
impl RemoteMusicService for FakeMusicService {
    async fn fetch_owned_playlists(&self, offset: u32, limit: u32) -> BridgeResult<Page<RemotePlaylist>> {
        let page = {
            let state = self.state.lock().await;
            state.authorize()?;
            let owned: Vec<RemotePlaylist> = state
                .playlists
                .iter()
                .filter(|(_, entry)| entry.owned)
                .map(|(id, entry)| RemotePlaylist::new(id.as_str(), entry.name.as_str(), entry.snapshot_id.as_str()))
                .collect();
            let total = owned.len() as u32;
            let items = owned
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            Page::new(items, offset, total)
        };

        let gate = self.listing_gate.lock().await.take();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }
        Ok(page)
    }

    async fn fetch_playlist(&self, playlist_id: &str) -> BridgeResult<RemotePlaylist> {
        let state = self.state.lock().await;
        state.authorize()?;
        state
            .playlists
            .get(playlist_id)
            .map(|entry| RemotePlaylist::new(playlist_id, entry.name.as_str(), entry.snapshot_id.as_str()))
            .ok_or_else(|| BridgeError::NotFound(playlist_id.to_string()))
    }

    async fn fetch_tracks(
        &self,
        playlist_id: &str,
        _fields: &TrackFieldSet,
        offset: u32,
        limit: u32,
    ) -> BridgeResult<Page<TrackRecord>> {
        let state = self.state.lock().await;
        state.authorize()?;
        let entry = state
            .playlists
            .get(playlist_id)
            .ok_or_else(|| BridgeError::NotFound(playlist_id.to_string()))?;
        let items = entry
            .tracks
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, offset, entry.tracks.len() as u32))
    }

    async fn create_playlist(&self, name: &str, _visibility: Visibility) -> BridgeResult<String> {
        let mut state = self.state.lock().await;
        state.authorize()?;
        state.created += 1;
        let id = format!("created-{}", state.created);
        state.playlists.insert(
            id.clone(),
            RemoteEntry {
                name: name.to_string(),
                snapshot_id: String::new(),
                tracks: Vec::new(),
                owned: true,
            },
        );
        state.bump(&id);
        Ok(id)
    }

    async fn replace_tracks(&self, playlist_id: &str, uris: &[String]) -> BridgeResult<String> {
        let gate = self.write_gate.lock().await.take();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }

        let mut state = self.state.lock().await;
        state.check_write(playlist_id, uris.len())?;
        let tracks = state.resolve(uris);
        if let Some(entry) = state.playlists.get_mut(playlist_id) {
            entry.tracks = tracks;
        }
        Ok(state.bump(playlist_id))
    }

    async fn add_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
        position: Option<u32>,
    ) -> BridgeResult<String> {
        let mut state = self.state.lock().await;
        state.check_write(playlist_id, uris.len())?;
        let tracks = state.resolve(uris);
        if let Some(entry) = state.playlists.get_mut(playlist_id) {
            let at = position.map_or(entry.tracks.len(), |p| p as usize);
            entry.tracks.splice(at..at, tracks);
        }
        Ok(state.bump(playlist_id))
    }

    async fn set_access_token(&self, access_token: &str) {
        self.state.lock().await.current_token = access_token.to_string();
    }
}

// =============================================================================
// Settings store
// =============================================================================

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.values.lock().await.keys().cloned().collect())
    }
}

// =============================================================================
// Token refresher
// =============================================================================

/// Hands out `fresh-1`, `fresh-2`, ... and counts exchanges.
#[derive(Default)]
pub struct CountingRefresher {
    exchanges: Mutex<u32>,
}

impl CountingRefresher {
    pub async fn exchanges(&self) -> u32 {
        *self.exchanges.lock().await
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh_access_token(&self, _refresh_token: &str) -> BridgeResult<TokenGrant> {
        let mut exchanges = self.exchanges.lock().await;
        *exchanges += 1;
        Ok(TokenGrant {
            access_token: format!("fresh-{}", *exchanges),
            refresh_token: None,
            expires_in: 3600,
        })
    }
}

// =============================================================================
// Setup
// =============================================================================

pub fn config(service: Arc<FakeMusicService>, store: Arc<MemoryStore>) -> EngineConfig {
    EngineConfig::builder()
        .remote_service(service)
        .settings_store(store)
        .playlist_page_size(2)
        .track_page_size(3)
        .write_batch_size(2)
        .build()
        .unwrap()
}

pub async fn coordinator(service: Arc<FakeMusicService>, store: Arc<MemoryStore>) -> SyncCoordinator {
    let config = config(service, store);
    let event_bus = config.event_bus();
    SyncCoordinator::load(config, "user-1", event_bus).await.unwrap()
}
