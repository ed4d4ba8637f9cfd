//! Snapshot to retrievable documents.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::core::config::DocumentConfig;
use crate::core::ids::DocumentId;
use crate::knowledge::document::{DocumentKind, DocumentMetadata, RetrievableDocument};
use crate::profile::records::{ArtistRecord, ProfileSnapshot, TrackRecord};

/// Count genre occurrences, most frequent first.
///
/// Ties keep the order in which genres were first encountered.
#[must_use]
pub fn rank_genres<'a, I>(genre_lists: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for genres in genre_lists {
        for genre in genres {
            if let Some(&slot) = index.get(genre.as_str()) {
                counts[slot].1 += 1;
            } else {
                index.insert(genre.as_str(), counts.len());
                counts.push((genre.clone(), 1));
            }
        }
    }

    counts.sort_by_key(|&(_, count)| Reverse(count));
    counts
}

/// Genre ranking over a snapshot's top artists.
#[must_use]
pub fn rank_top_artist_genres(snapshot: &ProfileSnapshot) -> Vec<(String, usize)> {
    rank_genres(snapshot.top_artists.iter().map(|artist| artist.genres.as_slice()))
}

/// Builds the document set for a snapshot.
///
/// Pure and deterministic: the same snapshot and configuration always give
/// the same documents, ids included.
#[derive(Clone, Debug, Default)]
pub struct DocumentBuilder {
    config: DocumentConfig,
}

impl DocumentBuilder {
    /// Create a builder.
    #[must_use]
    pub const fn new(config: DocumentConfig) -> Self {
        Self { config }
    }

    /// Document settings in use.
    #[must_use]
    pub const fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Build the full document set.
    ///
    /// Order: the profile summary, one document per detailed artist, one per
    /// saved track, one per top track, then (if enabled) genre documents.
    #[must_use]
    pub fn build(&self, snapshot: &ProfileSnapshot) -> Vec<RetrievableDocument> {
        let user_id = snapshot.user.id.as_str();
        let mut documents = Vec::with_capacity(
            1 + snapshot.artist_details.len()
                + snapshot.saved_tracks.len()
                + snapshot.top_tracks.len(),
        );

        documents.push(RetrievableDocument {
            id: DocumentId::derive(user_id, DocumentKind::UserProfile.as_str(), 0),
            content: self.profile_summary(snapshot),
            metadata: DocumentMetadata::new(DocumentKind::UserProfile, user_id),
        });

        for (ordinal, artist) in snapshot.artist_details.values().enumerate() {
            documents.push(artist_document(user_id, ordinal, artist));
        }

        for (ordinal, track) in snapshot.saved_tracks.iter().enumerate() {
            documents.push(track_document(user_id, ordinal, track, DocumentKind::SavedTrack));
        }

        for (ordinal, track) in snapshot.top_tracks.iter().enumerate() {
            documents.push(track_document(user_id, ordinal, track, DocumentKind::TopTrack));
        }

        if self.config.include_genres {
            documents.extend(self.genre_documents(snapshot));
        }

        documents
    }

    /// Text of the profile-summary document.
    ///
    /// Never contains the account id.
    #[must_use]
    pub fn profile_summary(&self, snapshot: &ProfileSnapshot) -> String {
        let artists = snapshot
            .top_artists
            .iter()
            .take(self.config.summary_top_artists)
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let genres = rank_top_artist_genres(snapshot)
            .into_iter()
            .take(self.config.summary_top_genres)
            .map(|(genre, _)| genre)
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = String::new();
        let _ = writeln!(out, "Username: {}", snapshot.user.display_name);
        let _ = writeln!(out, "Favorite artists: {}", or_none(&artists));
        let _ = writeln!(out, "Main genres: {}", or_none(&genres));
        let _ = writeln!(out, "Total saved songs: {}", snapshot.saved_tracks.len());
        let _ = write!(out, "Total playlists: {}", snapshot.playlists.len());
        out
    }

    fn genre_documents(&self, snapshot: &ProfileSnapshot) -> Vec<RetrievableDocument> {
        let user_id = snapshot.user.id.as_str();
        let mut distinct: Vec<&str> = Vec::new();
        for genre in snapshot.top_artists.iter().flat_map(|artist| &artist.genres) {
            if !distinct.contains(&genre.as_str()) {
                distinct.push(genre);
            }
        }

        distinct
            .into_iter()
            .take(self.config.max_genre_documents)
            .enumerate()
            .map(|(ordinal, genre)| {
                let artists = snapshot
                    .top_artists
                    .iter()
                    .filter(|artist| artist.genres.iter().any(|g| g == genre))
                    .take(self.config.artists_per_genre)
                    .map(|artist| artist.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut metadata = DocumentMetadata::new(DocumentKind::Genre, user_id);
                metadata.genre = Some(genre.to_string());
                RetrievableDocument {
                    id: DocumentId::derive(user_id, DocumentKind::Genre.as_str(), ordinal),
                    content: format!("GENRE: {genre}\nArtists in the collection: {artists}"),
                    metadata,
                }
            })
            .collect()
    }
}

const fn or_none(text: &str) -> &str {
    if text.is_empty() { "none yet" } else { text }
}

fn artist_document(user_id: &str, ordinal: usize, artist: &ArtistRecord) -> RetrievableDocument {
    let genres = artist.genres.join(", ");
    let mut metadata = DocumentMetadata::new(DocumentKind::Artist, user_id);
    metadata.artist_name = Some(artist.name.clone());
    RetrievableDocument {
        id: DocumentId::derive(user_id, DocumentKind::Artist.as_str(), ordinal),
        content: format!(
            "ARTIST: {}\nGenres: {}\nPopularity: {}/100\nFollowers: {}",
            artist.name,
            or_none(&genres),
            artist.popularity,
            artist.followers
        ),
        metadata,
    }
}

fn track_document(
    user_id: &str,
    ordinal: usize,
    track: &TrackRecord,
    kind: DocumentKind,
) -> RetrievableDocument {
    let artists = track.artists_label();
    let content = match kind {
        DocumentKind::TopTrack => format!(
            "FAVORITE SONG (TOP): {}\nArtists: {}\nAlbum: {}\nPopularity: {}",
            track.name, artists, track.album, track.popularity
        ),
        _ => format!(
            "SAVED SONG: {}\nArtists: {}\nAlbum: {}",
            track.name, artists, track.album
        ),
    };
    let mut metadata = DocumentMetadata::new(kind, user_id);
    metadata.track_name = Some(track.name.clone());
    metadata.artists = Some(artists);
    RetrievableDocument {
        id: DocumentId::derive(user_id, kind.as_str(), ordinal),
        content,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::records::UserProfile;
    use crate::testing::sample_snapshot;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_rank_genres_ties_keep_first_seen_order() {
        let first = strings(&["rock", "rock", "pop"]);
        let second = strings(&["pop", "jazz"]);
        let ranked = rank_genres([first.as_slice(), second.as_slice()]);
        assert_eq!(
            ranked,
            vec![
                ("rock".to_string(), 2),
                ("pop".to_string(), 2),
                ("jazz".to_string(), 1)
            ]
        );
        assert_eq!(ranked, rank_genres([first.as_slice(), second.as_slice()]));
    }

    #[test]
    fn test_build_order_and_counts() {
        let snapshot = sample_snapshot("user-1");
        let builder = DocumentBuilder::new(DocumentConfig::default());
        let documents = builder.build(&snapshot);

        assert_eq!(documents[0].kind(), DocumentKind::UserProfile);
        let count = |kind: DocumentKind| documents.iter().filter(|d| d.kind() == kind).count();
        assert_eq!(count(DocumentKind::UserProfile), 1);
        assert_eq!(count(DocumentKind::Artist), snapshot.artist_details.len());
        assert_eq!(count(DocumentKind::SavedTrack), snapshot.saved_tracks.len());
        assert_eq!(count(DocumentKind::TopTrack), snapshot.top_tracks.len());
        assert!(count(DocumentKind::Genre) > 0);
        assert!(documents.iter().all(|d| d.metadata.user_id == "user-1"));
    }

    #[test]
    fn test_same_track_in_saved_and_top_is_not_deduplicated() {
        let mut snapshot = sample_snapshot("user-1");
        snapshot.top_tracks = vec![snapshot.saved_tracks[0].clone()];
        let documents = DocumentBuilder::default().build(&snapshot);
        let name = snapshot.saved_tracks[0].name.clone();
        let matching = documents
            .iter()
            .filter(|d| d.metadata.track_name.as_deref() == Some(name.as_str()))
            .count();
        assert_eq!(matching, 2);
    }

    #[test]
    fn test_genre_documents_follow_flag_and_cap() {
        let mut snapshot = sample_snapshot("user-1");
        snapshot.top_artists[0].genres = (0..20).map(|i| format!("genre-{i}")).collect();

        let config = DocumentConfig {
            include_genres: false,
            ..DocumentConfig::default()
        };
        let without = DocumentBuilder::new(config).build(&snapshot);
        assert!(without.iter().all(|d| d.kind() != DocumentKind::Genre));

        let with = DocumentBuilder::new(DocumentConfig::default()).build(&snapshot);
        let genres = with.iter().filter(|d| d.kind() == DocumentKind::Genre).count();
        assert_eq!(genres, 15);
    }

    #[test]
    fn test_empty_library_still_has_summary() {
        let snapshot = ProfileSnapshot::new(UserProfile {
            id: "user-9".to_string(),
            display_name: "Kim".to_string(),
        });
        let documents = DocumentBuilder::default().build(&snapshot);
        assert_eq!(documents.len(), 1);
        let summary = &documents[0].content;
        assert!(summary.contains("Total saved songs: 0"));
        assert!(summary.contains("Total playlists: 0"));
        assert!(!summary.contains("user-9"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let snapshot = sample_snapshot("user-1");
        let builder = DocumentBuilder::default();
        assert_eq!(builder.build(&snapshot), builder.build(&snapshot));
    }
}
