//! # Track Aggregation
//!
//! Computes the content of a composite playlist.
//!
//! ## Overview
//!
//! The tracks of each direct component are fetched and concatenated in
//! component order. Each track's position in that concatenation is its
//! *custom index*. The list is then sorted by the composite's [`SortSpec`]:
//!
//! | Key | Compared as |
//! |---|---|
//! | `trackNumber` | number, missing counts as 0 |
//! | `albumDate` | `-`-separated numeric parts, shorter wins a shared prefix |
//! | `artistName` | primary artist, locale-aware |
//! | `songName` | locale-aware |
//! | `albumName` | locale-aware |
//! | `custom` | custom index, always ascending |
//!
//! Keys are applied left to right. Tracks equal on every key keep their
//! custom order. Duplicates across components are kept.

use std::cmp::Ordering;
use std::collections::HashMap;

use bridge_traits::{TrackFieldSet, TrackRecord};
use core_library::{NamedTrack, PlaylistId, SortKey, SortSpec};
use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::collation::locale_compare;
use crate::error::Result;
use crate::gateway::RemoteGateway;

/// Fetch the components of a composite and return its sorted content.
///
/// Components are fetched concurrently; the concatenation keeps component
/// order regardless of completion order.
#[instrument(skip(gateway, component_ids, sort_spec), fields(components = component_ids.len(), sort_spec = %sort_spec))]
pub async fn compute_sorted_track_list(
    gateway: &RemoteGateway,
    component_ids: &[PlaylistId],
    sort_spec: &SortSpec,
) -> Result<Vec<NamedTrack>> {
    let tracks = gather_component_tracks(gateway, component_ids, &sort_spec.field_set(), &HashMap::new()).await?;
    Ok(sort_tracks(tracks, sort_spec))
}

/// Concatenate the tracks of `component_ids` in order.
///
/// A component found in `pending` contributes that content instead of its
/// remote copy, which lets a composite be computed from components that have
/// not been pushed yet.
pub async fn gather_component_tracks(
    gateway: &RemoteGateway,
    component_ids: &[PlaylistId],
    fields: &TrackFieldSet,
    pending: &HashMap<PlaylistId, Vec<TrackRecord>>,
) -> Result<Vec<TrackRecord>> {
    let per_component = try_join_all(component_ids.iter().map(|id| async move {
        match pending.get(id) {
            Some(tracks) => Ok(tracks.clone()),
            None => gateway.fetch_all_tracks(id.as_str(), fields).await,
        }
    }))
    .await?;

    let tracks: Vec<TrackRecord> = per_component.into_iter().flatten().collect();
    debug!(tracks = tracks.len(), "Aggregated component tracks");
    Ok(tracks)
}

/// Sort concatenated component tracks by `sort_spec`.
pub fn sort_tracks(tracks: Vec<TrackRecord>, sort_spec: &SortSpec) -> Vec<NamedTrack> {
    sort_records(tracks, sort_spec)
        .into_iter()
        .map(|track| NamedTrack::new(track.name, track.uri))
        .collect()
}

/// [`sort_tracks`], keeping the full records.
pub fn sort_records(tracks: Vec<TrackRecord>, sort_spec: &SortSpec) -> Vec<TrackRecord> {
    let mut indexed: Vec<(usize, TrackRecord)> = tracks.into_iter().enumerate().collect();

    indexed.sort_by(|(a_index, a), (b_index, b)| {
        sort_spec
            .clauses()
            .iter()
            .map(|clause| match clause.key {
                // Concatenation order ignores the clause direction
                SortKey::Custom => a_index.cmp(b_index),
                key => clause.direction.apply(compare_by_key(key, a, b)),
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a_index.cmp(b_index))
    });

    indexed.into_iter().map(|(_, track)| track).collect()
}

fn compare_by_key(key: SortKey, a: &TrackRecord, b: &TrackRecord) -> Ordering {
    match key {
        SortKey::TrackNumber => a.track_number.unwrap_or(0).cmp(&b.track_number.unwrap_or(0)),
        SortKey::AlbumDate => compare_release_dates(
            a.album_release_date.as_deref().unwrap_or(""),
            b.album_release_date.as_deref().unwrap_or(""),
        ),
        SortKey::ArtistName => locale_compare(
            a.primary_artist().unwrap_or(""),
            b.primary_artist().unwrap_or(""),
        ),
        SortKey::SongName => locale_compare(&a.name, &b.name),
        SortKey::AlbumName => locale_compare(
            a.album_name.as_deref().unwrap_or(""),
            b.album_name.as_deref().unwrap_or(""),
        ),
        SortKey::Custom => Ordering::Equal,
    }
}

/// Compare `YYYY[-MM[-DD]]` dates part by part.
///
/// A date that is a prefix of the other (`2020` vs `2020-05`) sorts first.
fn compare_release_dates(a: &str, b: &str) -> Ordering {
    let a_parts = date_parts(a);
    let b_parts = date_parts(b);

    a_parts
        .iter()
        .zip(&b_parts)
        .map(|(x, y)| x.cmp(y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| a_parts.len().cmp(&b_parts.len()))
}

fn date_parts(date: &str) -> Vec<i64> {
    if date.is_empty() {
        return Vec::new();
    }
    date.split('-')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}
