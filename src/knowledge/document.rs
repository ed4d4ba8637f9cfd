//! Retrievable documents and their fixed metadata record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::ids::DocumentId;

/// Kind of a retrievable document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Profile summary (exactly one per snapshot).
    UserProfile,
    /// Detailed artist.
    Artist,
    /// Saved track.
    SavedTrack,
    /// Top track.
    TopTrack,
    /// Genre among the top artists.
    Genre,
}

impl DocumentKind {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserProfile => "user_profile",
            Self::Artist => "artist",
            Self::SavedTrack => "saved_track",
            Self::TopTrack => "top_track",
            Self::Genre => "genre",
        }
    }

    /// Label used when a document is quoted in a prompt.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::UserProfile => "PROFILE",
            Self::Artist => "ARTIST",
            Self::SavedTrack => "SAVED TRACK",
            Self::TopTrack => "TOP TRACK",
            Self::Genre => "GENRE",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user_profile" => Ok(Self::UserProfile),
            "artist" => Ok(Self::Artist),
            "saved_track" => Ok(Self::SavedTrack),
            "top_track" => Ok(Self::TopTrack),
            "genre" => Ok(Self::Genre),
            _ => Err(value.to_string()),
        }
    }
}

/// Structured metadata attached to a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document kind.
    pub kind: DocumentKind,
    /// Owning user id.
    pub user_id: String,
    /// Artist name, for artist documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    /// Track name, for track documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    /// Comma-joined artist names, for track documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<String>,
    /// Genre name, for genre documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl DocumentMetadata {
    /// Metadata with only the kind and owner set.
    #[must_use]
    pub fn new(kind: DocumentKind, user_id: impl Into<String>) -> Self {
        Self {
            kind,
            user_id: user_id.into(),
            artist_name: None,
            track_name: None,
            artists: None,
            genre: None,
        }
    }
}

/// Text document indexed in a user's collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievableDocument {
    /// Unique id.
    pub id: DocumentId,
    /// Text content that is embedded and quoted back.
    pub content: String,
    /// Structured metadata.
    pub metadata: DocumentMetadata,
}

impl RetrievableDocument {
    /// Document kind shortcut.
    #[must_use]
    pub const fn kind(&self) -> DocumentKind {
        self.metadata.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_matches_display() {
        for kind in [
            DocumentKind::UserProfile,
            DocumentKind::Artist,
            DocumentKind::SavedTrack,
            DocumentKind::TopTrack,
            DocumentKind::Genre,
        ] {
            assert_eq!(kind.to_string().parse::<DocumentKind>(), Ok(kind));
        }
        assert!("playlist".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_metadata_omits_empty_fields() {
        let metadata = DocumentMetadata::new(DocumentKind::UserProfile, "u1");
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"kind":"user_profile","user_id":"u1"}"#);
    }
}
