//! Normalized profile records and the snapshot aggregate.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Redacted account profile.
///
/// Only the display name and the stable account id survive redaction; the id
/// is the multi-tenancy key and never appears in generated text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable provider account id.
    pub id: String,
    /// Display name after redaction.
    pub display_name: String,
}

/// Normalized artist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRecord {
    /// Provider artist id.
    pub id: String,
    /// Artist name.
    pub name: String,
    /// Genre tags as reported by the provider.
    pub genres: Vec<String>,
    /// Popularity score (0-100).
    pub popularity: u8,
    /// Follower count.
    pub followers: u64,
}

/// Normalized track.
///
/// `artists` and `artist_ids` are index-aligned and always the same length.
/// Local files credit artists that have no provider id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Provider track id.
    pub id: String,
    /// Track name.
    pub name: String,
    /// Artist names, in credit order.
    pub artists: Vec<String>,
    /// Artist ids, aligned with `artists`.
    pub artist_ids: Vec<Option<String>>,
    /// Album name.
    pub album: String,
    /// Popularity score (0-100).
    pub popularity: u8,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

impl TrackRecord {
    /// Artist names joined for display.
    #[must_use]
    pub fn artists_label(&self) -> String {
        self.artists.join(", ")
    }

    /// Iterate `(artist_id, artist_name)` pairs in credit order.
    pub fn artist_pairs(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.artist_ids
            .iter()
            .map(Option::as_deref)
            .zip(self.artists.iter().map(String::as_str))
    }
}

/// Playlist summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    /// Provider playlist id.
    pub id: String,
    /// Playlist name.
    pub name: String,
    /// Number of tracks.
    pub track_count: u32,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// Point-in-time capture of a user's listening profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Redacted account profile.
    pub user: UserProfile,
    /// Top artists, most listened first.
    pub top_artists: Vec<ArtistRecord>,
    /// Top tracks, most listened first.
    pub top_tracks: Vec<TrackRecord>,
    /// Saved ("liked") tracks.
    pub saved_tracks: Vec<TrackRecord>,
    /// Playlists owned or followed.
    pub playlists: Vec<PlaylistSummary>,
    /// Recently played tracks.
    pub recently_played: Vec<TrackRecord>,
    /// Detailed artist lookups keyed by artist id; best effort.
    pub artist_details: BTreeMap<String, ArtistRecord>,
    /// When the snapshot was taken.
    pub collected_at: DateTime<Utc>,
}

impl ProfileSnapshot {
    /// Create an empty snapshot for a user.
    #[must_use]
    pub fn new(user: UserProfile) -> Self {
        Self {
            user,
            top_artists: Vec::new(),
            top_tracks: Vec::new(),
            saved_tracks: Vec::new(),
            playlists: Vec::new(),
            recently_played: Vec::new(),
            artist_details: BTreeMap::new(),
            collected_at: Utc::now(),
        }
    }

    /// Whether the snapshot identifies a user and can seed a collection.
    #[must_use]
    pub fn has_profile(&self) -> bool {
        !self.user.id.trim().is_empty()
    }

    /// Artist ids referenced by top artists, top tracks and saved tracks,
    /// deduplicated in first-seen order.
    #[must_use]
    pub fn referenced_artist_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        let from_tracks = self
            .top_tracks
            .iter()
            .chain(&self.saved_tracks)
            .flat_map(|track| track.artist_ids.iter().flatten());
        for id in self
            .top_artists
            .iter()
            .map(|artist| &artist.id)
            .chain(from_tracks)
        {
            if seen.insert(id.as_str()) {
                ids.push(id.clone());
            }
        }
        ids
    }
}
