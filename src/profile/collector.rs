//! Profile snapshot collection and export.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::core::config::{CollectorConfig, NameRedaction};
use crate::core::errors::{ChatifyError, ChatifyResult};
use crate::profile::auth::{Credential, CredentialSupplier};
use crate::profile::extractor::{extract_artist, extract_playlist, extract_track, redact_profile};
use crate::profile::provider::{Page, ProviderClient};
use crate::profile::records::{ArtistRecord, ProfileSnapshot, TrackRecord};

/// Assembles a complete [`ProfileSnapshot`] from the provider.
#[derive(Clone)]
pub struct ProfileCollector {
    provider: Arc<dyn ProviderClient>,
    auth: Arc<dyn CredentialSupplier>,
    config: CollectorConfig,
    name_redaction: NameRedaction,
}

impl ProfileCollector {
    /// Create a collector.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        auth: Arc<dyn CredentialSupplier>,
        config: CollectorConfig,
        name_redaction: NameRedaction,
    ) -> Self {
        Self {
            provider,
            auth,
            config,
            name_redaction,
        }
    }

    /// Fetch the user's account id with a single call.
    ///
    /// # Errors
    /// Returns `AuthExpired` or `Collection` if the profile cannot be fetched.
    pub async fn fetch_user_id(&self, credential: &mut Credential) -> ChatifyResult<String> {
        self.ensure_fresh(credential).await?;
        let raw = self
            .provider
            .current_user(&credential.access_token)
            .await
            .map_err(collection_failure)?;
        Ok(redact_profile(&raw, self.name_redaction)?.id)
    }

    /// Collect a full snapshot.
    ///
    /// Only the first step (the account profile) is mandatory. Every later
    /// step is best effort: failures are logged and leave that section
    /// empty. The credential is refreshed in place before each call.
    ///
    /// # Errors
    /// Returns `Collection` if the profile fetch fails, `MalformedRecord` if
    /// the profile lacks an id, and `AuthExpired` if the credential cannot be
    /// refreshed at any step.
    pub async fn collect_all(&self, credential: &mut Credential) -> ChatifyResult<ProfileSnapshot> {
        self.ensure_fresh(credential).await?;
        let raw_profile = self
            .provider
            .current_user(&credential.access_token)
            .await
            .map_err(collection_failure)?;
        let user = redact_profile(&raw_profile, self.name_redaction)?;
        info!("Collecting listening profile for {}", user.display_name);

        let mut snapshot = ProfileSnapshot::new(user);

        self.ensure_fresh(credential).await?;
        let page = self
            .provider
            .top_artists(&credential.access_token, self.config.top_artists_limit)
            .await;
        snapshot.top_artists = artists_from(&best_effort("top artists", page)?);

        self.ensure_fresh(credential).await?;
        let page = self
            .provider
            .top_tracks(&credential.access_token, self.config.top_tracks_limit)
            .await;
        snapshot.top_tracks = tracks_from(&best_effort("top tracks", page)?, false);

        snapshot.saved_tracks = self.collect_saved_tracks(credential).await?;

        self.ensure_fresh(credential).await?;
        let page = self
            .provider
            .playlists(&credential.access_token, self.config.playlists_limit)
            .await;
        snapshot.playlists = best_effort("playlists", page)?
            .items
            .iter()
            .filter_map(|raw| skip_malformed(extract_playlist(raw)))
            .collect();

        self.ensure_fresh(credential).await?;
        let page = self
            .provider
            .recently_played(&credential.access_token, self.config.recently_played_limit)
            .await;
        snapshot.recently_played = tracks_from(&best_effort("recently played", page)?, true);

        snapshot.artist_details = self.collect_artist_details(&snapshot, credential).await?;
        snapshot.collected_at = Utc::now();

        info!(
            "Collected {} top artists, {} top tracks, {} saved tracks, {} playlists, {} recent plays, {} artist details",
            snapshot.top_artists.len(),
            snapshot.top_tracks.len(),
            snapshot.saved_tracks.len(),
            snapshot.playlists.len(),
            snapshot.recently_played.len(),
            snapshot.artist_details.len()
        );

        Ok(snapshot)
    }

    async fn collect_saved_tracks(
        &self,
        credential: &mut Credential,
    ) -> ChatifyResult<Vec<TrackRecord>> {
        let cap = self.config.saved_tracks_cap;
        let page_size = self.config.saved_tracks_page_size;
        let mut tracks = Vec::new();
        let mut offset: u32 = 0;

        while tracks.len() < cap {
            let remaining = u32::try_from(cap - tracks.len()).unwrap_or(u32::MAX);
            let requested = page_size.min(remaining);
            self.ensure_fresh(credential).await?;
            let page = match self
                .provider
                .saved_tracks(&credential.access_token, requested, offset)
                .await
            {
                Ok(page) => page,
                Err(ChatifyError::AuthExpired) => return Err(ChatifyError::AuthExpired),
                Err(err) => {
                    warn!("Saved tracks page at offset {offset} failed: {err}");
                    break;
                }
            };

            let received = page.items.len();
            tracks.extend(tracks_from(&page, true));
            offset = offset.saturating_add(u32::try_from(received).unwrap_or(u32::MAX));

            if received < requested as usize {
                break;
            }
        }

        tracks.truncate(cap);
        Ok(tracks)
    }

    async fn collect_artist_details(
        &self,
        snapshot: &ProfileSnapshot,
        credential: &mut Credential,
    ) -> ChatifyResult<BTreeMap<String, ArtistRecord>> {
        let ids = snapshot.referenced_artist_ids();
        let mut details = BTreeMap::new();
        let delay = self.config.artist_detail_delay();

        for (index, artist_id) in ids.iter().take(self.config.artist_detail_cap).enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.ensure_fresh(credential).await?;
            let record = self
                .provider
                .artist(&credential.access_token, artist_id)
                .await
                .and_then(|raw| extract_artist(&raw));
            match record {
                Ok(artist) => {
                    details.insert(artist_id.clone(), artist);
                }
                Err(ChatifyError::AuthExpired) => return Err(ChatifyError::AuthExpired),
                Err(err) => warn!("Skipping artist {artist_id}: {err}"),
            }
        }

        Ok(details)
    }

    async fn ensure_fresh(&self, credential: &mut Credential) -> ChatifyResult<()> {
        if self.auth.is_expired(credential) {
            *credential = self.auth.refresh_if_needed(credential.clone()).await?;
        }
        Ok(())
    }
}

fn collection_failure(err: ChatifyError) -> ChatifyError {
    match err {
        ChatifyError::AuthExpired => ChatifyError::AuthExpired,
        other => ChatifyError::Collection(other.to_string()),
    }
}

fn best_effort(section: &str, page: ChatifyResult<Page>) -> ChatifyResult<Page> {
    match page {
        Ok(page) => Ok(page),
        Err(ChatifyError::AuthExpired) => Err(ChatifyError::AuthExpired),
        Err(err) => {
            warn!("Fetching {section} failed, continuing without it: {err}");
            Ok(Page::default())
        }
    }
}

fn skip_malformed<T>(record: ChatifyResult<T>) -> Option<T> {
    record
        .map_err(|err| warn!("Skipping record: {err}"))
        .ok()
}

fn artists_from(page: &Page) -> Vec<ArtistRecord> {
    page.items
        .iter()
        .filter_map(|raw| skip_malformed(extract_artist(raw)))
        .collect()
}

fn tracks_from(page: &Page, wrapped: bool) -> Vec<TrackRecord> {
    page.items
        .iter()
        .filter_map(|item| {
            let raw: &Value = if wrapped {
                item.get("track").unwrap_or(&Value::Null)
            } else {
                item
            };
            skip_malformed(extract_track(raw))
        })
        .collect()
}

/// Write a snapshot as pretty JSON.
///
/// # Errors
/// Returns an error if serialization or the write fails.
pub fn save_snapshot(snapshot: &ProfileSnapshot, path: &Path) -> ChatifyResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    info!("Saved profile snapshot to {}", path.display());
    Ok(())
}

/// Read a snapshot export.
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
/// Returns `SnapshotCorrupt` when the file exists but cannot be parsed, and
/// `Io` for other read failures.
pub fn load_snapshot(path: &Path) -> ChatifyResult<Option<ProfileSnapshot>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let snapshot = serde_json::from_str(&text).map_err(|source| ChatifyError::SnapshotCorrupt {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(snapshot))
}
