//! Raw provider records to normalized profile records.
//!
//! Every function here is pure: it reads the provider's native JSON shape and
//! either returns a normalized record or `MalformedRecord`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::config::NameRedaction;
use crate::core::errors::{ChatifyError, ChatifyResult};
use crate::profile::records::{ArtistRecord, PlaylistSummary, TrackRecord, UserProfile};

/// Account fields that never survive redaction.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "external_urls",
    "href",
    "uri",
    "images",
    "email",
    "country",
    "product",
    "birthdate",
    "explicit_content",
    "followers",
];

/// Placeholder used when no display name can be kept.
pub const ANONYMOUS_NAME: &str = "User";

static LINK_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)(https?://\S+|spotify:\S+|www\.\S+|\S+@\S+\.\S+)"));

/// Extract an artist record.
///
/// # Errors
/// Returns `MalformedRecord` if `id` or `name` is absent.
pub fn extract_artist(raw: &Value) -> ChatifyResult<ArtistRecord> {
    Ok(ArtistRecord {
        id: required_str(raw, "id", "artist")?,
        name: required_str(raw, "name", "artist")?,
        genres: raw
            .get("genres")
            .and_then(Value::as_array)
            .map(|genres| {
                genres
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        popularity: popularity(raw),
        followers: raw
            .get("followers")
            .and_then(|followers| followers.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
    })
}

/// Extract a track record.
///
/// # Errors
/// Returns `MalformedRecord` if `id`, `name` or the album name is absent, or
/// if a credited artist has no name. A credit without an id (local files) is
/// kept with no id.
pub fn extract_track(raw: &Value) -> ChatifyResult<TrackRecord> {
    let id = required_str(raw, "id", "track")?;
    let name = required_str(raw, "name", "track")?;
    let album = raw
        .get("album")
        .and_then(|album| album.get("name"))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or(ChatifyError::MalformedRecord {
            kind: "track",
            field: "album.name",
        })?
        .to_string();

    let credits = raw
        .get("artists")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut artists = Vec::with_capacity(credits.len());
    let mut artist_ids = Vec::with_capacity(credits.len());
    for credit in credits {
        artists.push(required_str(credit, "name", "track artist")?);
        artist_ids.push(required_str(credit, "id", "track artist").ok());
    }

    Ok(TrackRecord {
        id,
        name,
        artists,
        artist_ids,
        album,
        popularity: popularity(raw),
        duration_ms: raw.get("duration_ms").and_then(Value::as_u64).unwrap_or(0),
    })
}

/// Extract a playlist summary.
///
/// # Errors
/// Returns `MalformedRecord` if `id` or `name` is absent.
pub fn extract_playlist(raw: &Value) -> ChatifyResult<PlaylistSummary> {
    Ok(PlaylistSummary {
        id: required_str(raw, "id", "playlist")?,
        name: required_str(raw, "name", "playlist")?,
        track_count: raw
            .get("tracks")
            .and_then(|tracks| tracks.get("total"))
            .and_then(Value::as_u64)
            .and_then(|total| u32::try_from(total).ok())
            .unwrap_or(0),
        description: raw
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

/// Reduce a raw account profile to the redacted [`UserProfile`].
///
/// Everything except the account id and the display name is dropped. The
/// display name is scrubbed of links and provider URIs, then shortened per
/// `policy`. Re-passing a redacted profile yields the same profile.
///
/// # Errors
/// Returns `MalformedRecord` if the account id is absent.
pub fn redact_profile(raw: &Value, policy: NameRedaction) -> ChatifyResult<UserProfile> {
    let id = required_str(raw, "id", "profile")?;
    let name = raw
        .get("display_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let scrubbed = scrub_links(name)?;

    let display_name = match policy {
        NameRedaction::Anonymous => None,
        NameRedaction::FirstName => scrubbed.split_whitespace().next().map(str::to_string),
        NameRedaction::Full => Some(scrubbed).filter(|name| !name.is_empty()),
    }
    .unwrap_or_else(|| ANONYMOUS_NAME.to_string());

    Ok(UserProfile { id, display_name })
}

fn scrub_links(text: &str) -> ChatifyResult<String> {
    let regex = LINK_PATTERN
        .as_ref()
        .map_err(|err| ChatifyError::InvalidConfig(format!("invalid regex: {err}")))?;
    let stripped = regex.replace_all(text, " ");
    Ok(stripped.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn required_str(raw: &Value, field: &'static str, kind: &'static str) -> ChatifyResult<String> {
    raw.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ChatifyError::MalformedRecord { kind, field })
}

fn popularity(raw: &Value) -> u8 {
    raw.get("popularity")
        .and_then(Value::as_u64)
        .map_or(0, |value| u8::try_from(value.min(100)).unwrap_or(100))
}
