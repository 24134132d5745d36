//! Preview of what a sync would change.
//!
//! Entries of the previous and next content are paired greedily by URI: each
//! previous entry, in order, takes the earliest unused next entry with the
//! same URI. A track present twice on one side and once on the other yields
//! one pairing and one addition or removal.
//!
//! An entry counts as reordered when its rank among the paired entries
//! differs between the two lists, so inserting or removing tracks around it
//! does not flag it.

use std::collections::{HashMap, VecDeque};

use core_library::NamedTrack;
use serde::{Deserialize, Serialize};

/// One line of a sync preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDiff {
    pub name: String,
    pub uri: String,
    pub added: bool,
    pub removed: bool,
    pub reordered: bool,
}

impl TrackDiff {
    fn new(track: &NamedTrack) -> Self {
        Self {
            name: track.name.clone(),
            uri: track.uri.clone(),
            added: false,
            removed: false,
            reordered: false,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        !self.added && !self.removed && !self.reordered
    }
}

/// Diff `previous` against `next`.
///
/// Removed entries come first, in their previous order, followed by every
/// entry of `next` in order.
pub fn diff_tracks(previous: &[NamedTrack], next: &[NamedTrack]) -> Vec<TrackDiff> {
    let mut unused: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (index, track) in next.iter().enumerate() {
        unused.entry(track.uri.as_str()).or_default().push_back(index);
    }

    let mut partner_of_next: Vec<Option<usize>> = vec![None; next.len()];
    let mut previous_paired = vec![false; previous.len()];
    for (index, track) in previous.iter().enumerate() {
        if let Some(next_index) = unused.get_mut(track.uri.as_str()).and_then(VecDeque::pop_front) {
            partner_of_next[next_index] = Some(index);
            previous_paired[index] = true;
        }
    }

    let mut previous_rank = vec![0usize; previous.len()];
    let mut rank = 0;
    for (index, paired) in previous_paired.iter().enumerate() {
        if *paired {
            previous_rank[index] = rank;
            rank += 1;
        }
    }

    let mut diffs: Vec<TrackDiff> = previous
        .iter()
        .zip(&previous_paired)
        .filter(|(_, paired)| !**paired)
        .map(|(track, _)| TrackDiff {
            removed: true,
            ..TrackDiff::new(track)
        })
        .collect();

    let mut next_rank = 0;
    for (track, partner) in next.iter().zip(&partner_of_next) {
        let diff = match partner {
            Some(previous_index) => {
                let reordered = previous_rank[*previous_index] != next_rank;
                next_rank += 1;
                TrackDiff {
                    reordered,
                    ..TrackDiff::new(track)
                }
            }
            None => TrackDiff {
                added: true,
                ..TrackDiff::new(track)
            },
        };
        diffs.push(diff);
    }

    diffs
}
