//! Remote Music Service Abstraction
//!
//! The contract between the sync engine and the host's client for the remote
//! music API. The engine never speaks HTTP itself; every remote read and write
//! goes through [`RemoteMusicService`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Maximum number of track URIs the remote service accepts in one write call.
pub const MAX_TRACKS_PER_WRITE: usize = 100;

/// Playlist summary as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub id: String,
    pub name: String,
    /// Opaque revision marker; changes whenever the playlist content changes.
    pub snapshot_id: String,
}

impl RemotePlaylist {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        snapshot_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            snapshot_id: snapshot_id.into(),
        }
    }
}

/// One page of an offset-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Offset of the first item in this page
    pub offset: u32,
    /// Total number of items available across all pages
    pub total: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, offset: u32, total: u32) -> Self {
        Self {
            items,
            offset,
            total,
        }
    }

    /// Offset of the next page, or `None` when this page is the last one.
    ///
    /// An empty page always ends pagination so a service reporting an
    /// inflated `total` cannot cause an endless loop.
    pub fn next_offset(&self) -> Option<u32> {
        if self.items.is_empty() {
            return None;
        }
        let next = self.offset + self.items.len() as u32;
        (next < self.total).then_some(next)
    }
}

/// Track as returned by a playlist track listing.
///
/// Only `uri` and `name` are always populated; the remaining fields are present
/// when requested through [`TrackFieldSet`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackRecord {
    pub uri: String,
    pub name: String,
    pub track_number: Option<u32>,
    pub album_name: Option<String>,
    /// Release date as reported by the service: `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    pub album_release_date: Option<String>,
    /// Artist names, primary artist first
    pub artist_names: Vec<String>,
}

impl TrackRecord {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn primary_artist(&self) -> Option<&str> {
        self.artist_names.first().map(String::as_str)
    }
}

/// Optional track fields to request from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackFieldSet {
    pub track_number: bool,
    pub album_name: bool,
    pub album_release_date: bool,
    pub artist_name: bool,
}

impl TrackFieldSet {
    /// Fields requested by either set.
    pub fn union(self, other: Self) -> Self {
        Self {
            track_number: self.track_number || other.track_number,
            album_name: self.album_name || other.album_name,
            album_release_date: self.album_release_date || other.album_release_date,
            artist_name: self.artist_name || other.artist_name,
        }
    }

    /// Render as a partial-response field selector.
    ///
    /// `uri` and `name` are always included; `total` is included for pagination.
    pub fn to_query(&self) -> String {
        let mut fields = String::from("total,items(track(uri,name");
        if self.track_number {
            fields.push_str(",track_number");
        }
        match (self.album_name, self.album_release_date) {
            (true, true) => fields.push_str(",album(name,release_date)"),
            (true, false) => fields.push_str(",album(name)"),
            (false, true) => fields.push_str(",album(release_date)"),
            (false, false) => {}
        }
        if self.artist_name {
            fields.push_str(",artists(name)");
        }
        fields.push_str("))");
        fields
    }
}

/// Visibility of a playlist created on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn from_public(public: bool) -> Self {
        if public {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

/// Client for the remote music service.
///
/// Implementations must:
/// - Report an expired or revoked access token as
///   [`BridgeError::Unauthorized`](crate::error::BridgeError::Unauthorized)
/// - Report a playlist that no longer exists as
///   [`BridgeError::NotFound`](crate::error::BridgeError::NotFound)
/// - Accept at most [`MAX_TRACKS_PER_WRITE`] URIs per write call
///
/// Retrying after a credential refresh is done by the caller, not the client.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::music::{RemoteMusicService, TrackFieldSet};
///
/// async fn first_page(service: &dyn RemoteMusicService) -> Result<usize> {
///     let page = service
///         .fetch_tracks("37i9dQZF1DXcBWIGoYBM5M", &TrackFieldSet::default(), 0, 50)
///         .await?;
///     Ok(page.items.len())
/// }
/// ```
#[async_trait]
pub trait RemoteMusicService: Send + Sync {
    /// List one page of the current user's playlists.
    async fn fetch_owned_playlists(&self, offset: u32, limit: u32) -> Result<Page<RemotePlaylist>>;

    /// Fetch a single playlist by id.
    ///
    /// Used as an existence probe for followed playlists, whose deletion does
    /// not show up in the owned-playlists listing.
    async fn fetch_playlist(&self, playlist_id: &str) -> Result<RemotePlaylist>;

    /// List one page of a playlist's tracks, requesting the given optional fields.
    async fn fetch_tracks(
        &self,
        playlist_id: &str,
        fields: &TrackFieldSet,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackRecord>>;

    /// Create an empty playlist and return its id.
    async fn create_playlist(&self, name: &str, visibility: Visibility) -> Result<String>;

    /// Replace the whole content of a playlist; returns the new snapshot id.
    async fn replace_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<String>;

    /// Insert tracks at `position` (append when `None`); returns the new snapshot id.
    async fn add_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
        position: Option<u32>,
    ) -> Result<String>;

    /// Install a freshly refreshed access token.
    ///
    /// Clients that read the token from a shared source may ignore this.
    async fn set_access_token(&self, _access_token: &str) {}
}
