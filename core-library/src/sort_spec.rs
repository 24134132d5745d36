//! Sort specifications for composite playlists.
//!
//! A sort spec is an ordered list of `(key, direction)` clauses, stored as
//! `key;dir;key;dir...` with `dir` being `a` or `d`:
//!
//! ```text
//! albumDate;d;trackNumber;a
//! ```
//!
//! Every spec is implicitly terminated by the original concatenation order,
//! so sorting is always a strict total order.

use bridge_traits::TrackFieldSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LibraryError, Result};

/// Track attribute a composite can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Position within the album
    TrackNumber,
    /// Album release date, compared component by component
    AlbumDate,
    /// Primary artist name
    ArtistName,
    /// Track title
    SongName,
    AlbumName,
    /// Concatenation order of the source playlists
    Custom,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::TrackNumber,
        SortKey::AlbumDate,
        SortKey::ArtistName,
        SortKey::SongName,
        SortKey::AlbumName,
        SortKey::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::TrackNumber => "trackNumber",
            SortKey::AlbumDate => "albumDate",
            SortKey::ArtistName => "artistName",
            SortKey::SongName => "songName",
            SortKey::AlbumName => "albumName",
            SortKey::Custom => "custom",
        }
    }

    /// Direction offered when the user adds this key.
    pub fn default_direction(&self) -> SortDirection {
        match self {
            SortKey::AlbumDate => SortDirection::Descending,
            _ => SortDirection::Ascending,
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SortKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown sort key '{}'", s))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Short form used in the encoded spec.
    pub fn as_code(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "a",
            SortDirection::Descending => "d",
        }
    }

    /// Apply this direction to an ascending comparison result.
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "a" | "ascending" => Ok(SortDirection::Ascending),
            "d" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

/// One `(key, direction)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortClause {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortClause {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

/// Parsed sort specification.
///
/// Serializes as its encoded string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortSpec {
    clauses: Vec<SortClause>,
}

impl SortSpec {
    /// A spec with no explicit clauses; sorts by concatenation order only.
    pub fn empty() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// `custom;a`, the spec new composites start with.
    pub fn custom() -> Self {
        Self {
            clauses: vec![SortClause::new(SortKey::Custom, SortDirection::Ascending)],
        }
    }

    /// Build a spec from clauses, rejecting a repeated key.
    pub fn from_clauses(clauses: Vec<SortClause>) -> Result<Self> {
        let spec = Self { clauses };
        spec.check_unique_keys()?;
        Ok(spec)
    }

    /// Parse the encoded form.
    ///
    /// # Errors
    ///
    /// [`LibraryError::InvalidSortSpec`] for an odd token count, an unknown
    /// key or direction, or a key listed twice.
    pub fn parse(encoded: &str) -> Result<Self> {
        if encoded.is_empty() {
            return Ok(Self::empty());
        }

        let tokens: Vec<&str> = encoded.split(';').collect();
        if tokens.len() % 2 != 0 {
            return Err(invalid(
                encoded,
                "odd number of parts, a direction is probably missing",
            ));
        }

        let clauses = tokens
            .chunks(2)
            .map(|pair| {
                let key = pair[0].parse::<SortKey>().map_err(|e| invalid(encoded, &e))?;
                let direction = pair[1]
                    .parse::<SortDirection>()
                    .map_err(|e| invalid(encoded, &e))?;
                Ok(SortClause::new(key, direction))
            })
            .collect::<Result<Vec<_>>>()?;

        let spec = Self { clauses };
        spec.check_unique_keys().map_err(|_| {
            invalid(encoded, "a sort key is listed more than once")
        })?;
        Ok(spec)
    }

    /// Encode with short direction codes.
    pub fn encode(&self) -> String {
        self.clauses
            .iter()
            .map(|clause| format!("{};{}", clause.key.as_str(), clause.direction.as_code()))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn clauses(&self) -> &[SortClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Optional track fields the remote listing must return for this spec.
    pub fn field_set(&self) -> TrackFieldSet {
        let mut fields = TrackFieldSet::default();
        for clause in &self.clauses {
            match clause.key {
                SortKey::TrackNumber => fields.track_number = true,
                SortKey::AlbumDate => fields.album_release_date = true,
                SortKey::ArtistName => fields.artist_name = true,
                SortKey::AlbumName => fields.album_name = true,
                SortKey::SongName | SortKey::Custom => {}
            }
        }
        fields
    }

    fn check_unique_keys(&self) -> Result<()> {
        for (i, clause) in self.clauses.iter().enumerate() {
            if self.clauses[..i].iter().any(|c| c.key == clause.key) {
                return Err(invalid(
                    &self.encode(),
                    &format!("sort key '{}' is listed more than once", clause.key),
                ));
            }
        }
        Ok(())
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::custom()
    }
}

impl FromStr for SortSpec {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl TryFrom<String> for SortSpec {
    type Error = LibraryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SortSpec> for String {
    fn from(spec: SortSpec) -> Self {
        spec.encode()
    }
}

fn invalid(spec: &str, reason: &str) -> LibraryError {
    LibraryError::InvalidSortSpec {
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_long_directions() {
        let spec = SortSpec::parse("albumDate;descending;trackNumber;a").unwrap();
        assert_eq!(
            spec.clauses(),
            &[
                SortClause::new(SortKey::AlbumDate, SortDirection::Descending),
                SortClause::new(SortKey::TrackNumber, SortDirection::Ascending),
            ]
        );
        assert_eq!(spec.encode(), "albumDate;d;trackNumber;a");
    }

    #[test]
    fn test_empty_string_is_empty_spec() {
        let spec = SortSpec::parse("").unwrap();
        assert!(spec.is_empty());
        assert_eq!(spec.encode(), "");
    }

    #[test]
    fn test_odd_token_count_rejected() {
        let err = SortSpec::parse("songName;a;artistName").unwrap_err();
        assert!(matches!(err, LibraryError::InvalidSortSpec { .. }));
    }

    #[test]
    fn test_unknown_key_and_direction_rejected() {
        assert!(SortSpec::parse("genre;a").is_err());
        assert!(SortSpec::parse("songName;up").is_err());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        assert!(SortSpec::parse("songName;a;songName;d").is_err());
        assert!(SortSpec::from_clauses(vec![
            SortClause::new(SortKey::Custom, SortDirection::Ascending),
            SortClause::new(SortKey::Custom, SortDirection::Descending),
        ])
        .is_err());
    }

    #[test]
    fn test_field_set_follows_keys() {
        let fields = SortSpec::parse("albumName;a;artistName;d;songName;a")
            .unwrap()
            .field_set();
        assert!(fields.album_name);
        assert!(fields.artist_name);
        assert!(!fields.album_release_date);
        assert!(!fields.track_number);
        assert_eq!(
            fields.to_query(),
            "total,items(track(uri,name,album(name),artists(name)))"
        );

        assert_eq!(SortSpec::custom().field_set(), TrackFieldSet::default());
    }

    #[test]
    fn test_serde_uses_encoded_form() {
        let spec = SortSpec::parse("trackNumber;ascending").unwrap();
        assert_eq!(serde_json::to_string(&spec).unwrap(), "\"trackNumber;a\"");

        let restored: SortSpec = serde_json::from_str("\"custom;d\"").unwrap();
        assert_eq!(
            restored.clauses(),
            &[SortClause::new(SortKey::Custom, SortDirection::Descending)]
        );
        assert!(serde_json::from_str::<SortSpec>("\"custom\"").is_err());
    }

    #[test]
    fn test_default_directions() {
        assert_eq!(SortKey::AlbumDate.default_direction(), SortDirection::Descending);
        assert_eq!(SortKey::SongName.default_direction(), SortDirection::Ascending);
    }
}
