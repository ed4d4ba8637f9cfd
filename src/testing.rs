//! Shared fakes for unit tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use crate::advisor::llm::{CompletionFuture, LanguageModel};
use crate::core::errors::{ChatifyError, ChatifyResult};
use crate::knowledge::embedding::{EmbedFuture, Embedder};
use crate::profile::auth::{AuthFuture, Credential, CredentialSupplier};
use crate::profile::provider::{Page, ProviderClient, ProviderFuture};
use crate::profile::records::{
    ArtistRecord, PlaylistSummary, ProfileSnapshot, TrackRecord, UserProfile,
};

/// Raw artist in provider shape, including fields redaction must drop.
pub fn raw_artist(id: &str, genres: &[&str]) -> Value {
    json!({
        "id": id,
        "name": format!("Artist {id}"),
        "genres": genres,
        "popularity": 61,
        "followers": {"href": null, "total": 1200},
        "external_urls": {"spotify": format!("https://open.spotify.com/artist/{id}")},
        "href": format!("https://api.spotify.com/v1/artists/{id}"),
        "uri": format!("spotify:artist:{id}"),
        "images": [{"url": "https://i.scdn.co/image/x", "height": 640, "width": 640}]
    })
}

/// Raw track in provider shape credited to `artist_ids`.
pub fn raw_track(id: &str, artist_ids: &[&str]) -> Value {
    let artists: Vec<Value> = artist_ids
        .iter()
        .map(|artist_id| json!({"id": artist_id, "name": format!("Artist {artist_id}")}))
        .collect();
    json!({
        "id": id,
        "name": format!("Track {id}"),
        "artists": artists,
        "album": {"name": format!("Album {id}")},
        "popularity": 48,
        "duration_ms": 201_000,
        "explicit": false,
        "uri": format!("spotify:track:{id}")
    })
}

/// Credential valid for an hour.
pub fn credential() -> Credential {
    Credential::new(
        "access-token",
        Some("refresh-token".to_string()),
        Duration::from_secs(3600),
    )
}

/// Supplier that hands credentials back unchanged.
pub struct StaticAuth;

impl CredentialSupplier for StaticAuth {
    fn refresh_if_needed(&self, credential: Credential) -> AuthFuture<'_, ChatifyResult<Credential>> {
        Box::pin(async move { Ok(credential) })
    }
}

/// Supplier that issues `rotated-{n}` tokens and counts its refreshes.
#[derive(Default)]
pub struct RotatingAuth {
    pub refreshes: AtomicUsize,
}

impl CredentialSupplier for RotatingAuth {
    fn refresh_if_needed(&self, credential: Credential) -> AuthFuture<'_, ChatifyResult<Credential>> {
        Box::pin(async move {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Credential::new(
                format!("rotated-{n}"),
                credential.refresh_token,
                Duration::from_secs(3600),
            ))
        })
    }
}

/// Credential that is already past its expiry.
pub fn expired_credential() -> Credential {
    Credential::new("stale-token", Some("refresh-token".to_string()), Duration::ZERO)
}

/// Provider client serving a synthetic library for `user-1`.
pub struct FakeProvider {
    pub fail_profile: bool,
    pub fail_playlists: bool,
    pub failing_artists: Vec<String>,
    pub top_artists: Vec<Value>,
    pub top_tracks: Vec<Value>,
    pub saved_tracks: Vec<Value>,
    pub artist_lookups: Arc<AtomicUsize>,
    pub saved_offsets: Arc<tokio::sync::Mutex<Vec<u32>>>,
}

impl FakeProvider {
    /// Library with `artists` top artists (`artist-{i}`), `top` top tracks and
    /// `saved` saved tracks; tracks are credited round-robin to those artists.
    pub fn with_library(artists: usize, top: usize, saved: usize) -> Self {
        let genres = ["rock", "indie", "pop", "jazz"];
        let credit = |i: usize| format!("artist-{}", i % artists.max(1));
        Self {
            fail_profile: false,
            fail_playlists: false,
            failing_artists: Vec::new(),
            top_artists: (0..artists)
                .map(|i| raw_artist(&format!("artist-{i}"), &[genres[i % genres.len()]]))
                .collect(),
            top_tracks: (0..top)
                .map(|i| raw_track(&format!("top-{i}"), &[credit(i).as_str()]))
                .collect(),
            saved_tracks: (0..saved)
                .map(|i| json!({"added_at": "2024-01-01T00:00:00Z", "track": raw_track(&format!("saved-{i}"), &[credit(i).as_str()])}))
                .collect(),
            artist_lookups: Arc::new(AtomicUsize::new(0)),
            saved_offsets: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

fn page(items: impl IntoIterator<Item = Value>) -> Page {
    let items: Vec<Value> = items.into_iter().collect();
    Page {
        total: Some(items.len() as u64),
        items,
    }
}

fn status(code: u16, endpoint: &str) -> ChatifyError {
    ChatifyError::Provider {
        status: code,
        endpoint: endpoint.to_string(),
    }
}

impl ProviderClient for FakeProvider {
    fn current_user(&self, _access_token: &str) -> ProviderFuture<'_, ChatifyResult<Value>> {
        Box::pin(async move {
            if self.fail_profile {
                return Err(status(503, "me"));
            }
            Ok(json!({
                "id": "user-1",
                "display_name": "Ana Maria",
                "email": "ana@example.com",
                "country": "ES",
                "product": "premium",
                "images": [{"url": "https://i.scdn.co/image/me"}],
                "external_urls": {"spotify": "https://open.spotify.com/user/user-1"},
                "followers": {"total": 3}
            }))
        })
    }

    fn top_artists(&self, _access_token: &str, limit: u32) -> ProviderFuture<'_, ChatifyResult<Page>> {
        Box::pin(async move { Ok(page(self.top_artists.iter().take(limit as usize).cloned())) })
    }

    fn top_tracks(&self, _access_token: &str, limit: u32) -> ProviderFuture<'_, ChatifyResult<Page>> {
        Box::pin(async move { Ok(page(self.top_tracks.iter().take(limit as usize).cloned())) })
    }

    fn saved_tracks(
        &self,
        _access_token: &str,
        limit: u32,
        offset: u32,
    ) -> ProviderFuture<'_, ChatifyResult<Page>> {
        Box::pin(async move {
            self.saved_offsets.lock().await.push(offset);
            let items: Vec<Value> = self
                .saved_tracks
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect();
            Ok(Page {
                items,
                total: Some(self.saved_tracks.len() as u64),
            })
        })
    }

    fn playlists(&self, _access_token: &str, _limit: u32) -> ProviderFuture<'_, ChatifyResult<Page>> {
        Box::pin(async move {
            if self.fail_playlists {
                return Err(status(500, "me/playlists"));
            }
            Ok(page([json!({
                "id": "pl-1",
                "name": "Road trip",
                "description": "Long drives",
                "tracks": {"total": 12}
            })]))
        })
    }

    fn recently_played(
        &self,
        _access_token: &str,
        _limit: u32,
    ) -> ProviderFuture<'_, ChatifyResult<Page>> {
        Box::pin(async move {
            Ok(page([json!({
                "played_at": "2024-01-02T00:00:00Z",
                "track": raw_track("recent-0", &["artist-0"])
            })]))
        })
    }

    fn artist(&self, _access_token: &str, artist_id: &str) -> ProviderFuture<'_, ChatifyResult<Value>> {
        let artist_id = artist_id.to_string();
        Box::pin(async move {
            self.artist_lookups.fetch_add(1, Ordering::SeqCst);
            if self.failing_artists.contains(&artist_id) {
                return Err(status(404, "artists"));
            }
            Ok(raw_artist(&artist_id, &["rock"]))
        })
    }
}

fn artist(id: &str, name: &str, genres: &[&str]) -> ArtistRecord {
    ArtistRecord {
        id: id.to_string(),
        name: name.to_string(),
        genres: genres.iter().map(|g| (*g).to_string()).collect(),
        popularity: 70,
        followers: 50_000,
    }
}

fn track(id: &str, name: &str, artist: &ArtistRecord, album: &str) -> TrackRecord {
    TrackRecord {
        id: id.to_string(),
        name: name.to_string(),
        artists: vec![artist.name.clone()],
        artist_ids: vec![Some(artist.id.clone())],
        album: album.to_string(),
        popularity: 55,
        duration_ms: 215_000,
    }
}

/// Small but complete snapshot owned by `user_id`.
pub fn sample_snapshot(user_id: &str) -> ProfileSnapshot {
    let radiohead = artist("a1", "Radiohead", &["alternative rock", "art rock"]);
    let bjork = artist("a2", "Björk", &["art pop", "electronica"]);
    let nina = artist("a3", "Nina Simone", &["jazz", "soul", "art rock"]);

    let mut snapshot = ProfileSnapshot::new(UserProfile {
        id: user_id.to_string(),
        display_name: "Ana".to_string(),
    });
    snapshot.top_tracks = vec![
        track("t1", "Reckoner", &radiohead, "In Rainbows"),
        track("t2", "Jóga", &bjork, "Homogenic"),
    ];
    snapshot.saved_tracks = vec![
        track("s1", "Feeling Good", &nina, "I Put a Spell on You"),
        track("s2", "Hyperballad", &bjork, "Post"),
        track("s3", "Nude", &radiohead, "In Rainbows"),
    ];
    snapshot.recently_played = vec![track("r1", "Sinnerman", &nina, "Pastel Blues")];
    snapshot.playlists = vec![PlaylistSummary {
        id: "p1".to_string(),
        name: "Sunday".to_string(),
        track_count: 24,
        description: String::new(),
    }];
    for record in [&radiohead, &bjork, &nina] {
        snapshot
            .artist_details
            .insert(record.id.clone(), (*record).clone());
    }
    snapshot.top_artists = vec![radiohead, bjork, nina];
    snapshot
}

/// Deterministic bag-of-words embedder.
pub struct HashingEmbedder {
    ndims: usize,
}

impl HashingEmbedder {
    pub fn new(ndims: usize) -> Self {
        Self { ndims }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.ndims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let slot = (hasher.finish() % self.ndims as u64) as usize;
            vector[slot] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            vector[0] = 1.0;
        } else {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn embed_text(&self, text: &str) -> EmbedFuture<'_, ChatifyResult<Vec<f32>>> {
        let vector = self.vector(text);
        Box::pin(async move { Ok(vector) })
    }

    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, ChatifyResult<Vec<Vec<f32>>>> {
        Box::pin(async move { Ok(texts.iter().map(|text| self.vector(text)).collect()) })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}

/// Language model returning a fixed reply (or failing) and recording prompts.
pub struct ScriptedModel {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, prompt: String) -> CompletionFuture<'_, ChatifyResult<String>> {
        self.prompts.lock().unwrap().push(prompt);
        let result = self
            .reply
            .clone()
            .ok_or_else(|| ChatifyError::Generation("model offline".to_string()));
        Box::pin(async move { result })
    }
}
