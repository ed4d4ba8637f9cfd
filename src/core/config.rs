//! Configuration for the chat assistant.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::errors::{ChatifyError, ChatifyResult};

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatifyConfig {
    /// Storage locations.
    pub storage: StorageConfig,
    /// Embedding model settings.
    pub embedding: EmbeddingConfig,
    /// Completion model settings.
    pub llm: LlmConfig,
    /// Retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Provider fetch limits.
    pub collector: CollectorConfig,
    /// Profile redaction settings.
    pub privacy: PrivacyConfig,
    /// Document generation settings.
    pub documents: DocumentConfig,
    /// Conversation history settings.
    pub history: HistoryConfig,
    /// Provider endpoints and client credentials.
    pub provider: ProviderConfig,
}

impl ChatifyConfig {
    /// Build the default configuration and overlay environment overrides.
    ///
    /// Recognized variables: `CHATIFY_SQLITE_PATH`, `CHATIFY_CACHE_DIR`,
    /// `CHATIFY_SNAPSHOT_PATH`, `CHATIFY_OLLAMA_URL`, `CHATIFY_LLM_MODEL`,
    /// `CHATIFY_EMBEDDING_MODEL`, `CHATIFY_EMBEDDING_NDIMS`, `CHATIFY_TOP_K`,
    /// `CHATIFY_GENRE_DOCUMENTS`, `CHATIFY_NAME_REDACTION`,
    /// `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET`.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unparsable value or the
    /// resulting configuration is invalid.
    pub fn from_env() -> ChatifyResult<Self> {
        let mut config = Self::default();

        if let Some(path) = env_var("CHATIFY_SQLITE_PATH") {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(dir) = env_var("CHATIFY_CACHE_DIR") {
            config.storage.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = env_var("CHATIFY_SNAPSHOT_PATH") {
            config.storage.snapshot_path = Some(PathBuf::from(path));
        }
        if let Some(url) = env_var("CHATIFY_OLLAMA_URL") {
            config.embedding.base_url = Some(url.clone());
            config.llm.base_url = Some(url);
        }
        if let Some(model) = env_var("CHATIFY_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(model) = env_var("CHATIFY_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Some(ndims) = env_var("CHATIFY_EMBEDDING_NDIMS") {
            config.embedding.ndims = parse_env("CHATIFY_EMBEDDING_NDIMS", &ndims)?;
        }
        if let Some(top_k) = env_var("CHATIFY_TOP_K") {
            config.retrieval.top_k = parse_env("CHATIFY_TOP_K", &top_k)?;
        }
        if let Some(flag) = env_var("CHATIFY_GENRE_DOCUMENTS") {
            config.documents.include_genres = parse_env("CHATIFY_GENRE_DOCUMENTS", &flag)?;
        }
        if let Some(policy) = env_var("CHATIFY_NAME_REDACTION") {
            config.privacy.name_redaction = match policy.as_str() {
                "full" => NameRedaction::Full,
                "first_name" => NameRedaction::FirstName,
                "anonymous" => NameRedaction::Anonymous,
                other => {
                    return Err(ChatifyError::InvalidConfig(format!(
                        "CHATIFY_NAME_REDACTION: unknown policy `{other}`"
                    )));
                }
            };
        }
        if let Some(client_id) = env_var("SPOTIFY_CLIENT_ID") {
            config.provider.client_id = client_id;
        }
        config.provider.client_secret = env_var("SPOTIFY_CLIENT_SECRET");

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatifyResult<()> {
        if self.embedding.ndims == 0 {
            return Err(ChatifyError::InvalidConfig(
                "embedding.ndims must be > 0".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ChatifyError::InvalidConfig(
                "retrieval.top_k must be > 0".to_string(),
            ));
        }

        if self.collector.saved_tracks_page_size == 0 || self.collector.saved_tracks_page_size > 50
        {
            return Err(ChatifyError::InvalidConfig(
                "collector.saved_tracks_page_size must be in 1..=50".to_string(),
            ));
        }

        let collector = &self.collector;
        let zero_caps = [
            ("collector.top_artists_limit", collector.top_artists_limit == 0),
            ("collector.top_tracks_limit", collector.top_tracks_limit == 0),
            ("collector.saved_tracks_cap", collector.saved_tracks_cap == 0),
            ("collector.playlists_limit", collector.playlists_limit == 0),
            ("collector.recently_played_limit", collector.recently_played_limit == 0),
            ("collector.artist_detail_cap", collector.artist_detail_cap == 0),
        ];
        if let Some((name, _)) = zero_caps.iter().find(|(_, zero)| *zero) {
            return Err(ChatifyError::InvalidConfig(format!("{name} must be > 0")));
        }

        if self.collector.artist_detail_cap > MAX_ARTIST_DETAILS {
            return Err(ChatifyError::InvalidConfig(format!(
                "collector.artist_detail_cap must be <= {MAX_ARTIST_DETAILS}"
            )));
        }

        if self.history.max_turns == 0 || !self.history.max_turns.is_multiple_of(2) {
            return Err(ChatifyError::InvalidConfig(
                "history.max_turns must be a positive even number".to_string(),
            ));
        }

        if let Some(base_url) = &self.embedding.base_url {
            Url::parse(base_url)?;
        }

        if let Some(base_url) = &self.llm.base_url {
            Url::parse(base_url)?;
        }

        Url::parse(&self.provider.api_base_url)?;
        Url::parse(&self.provider.token_url)?;

        Ok(())
    }
}

/// Hard ceiling on detailed-artist lookups per snapshot.
pub const MAX_ARTIST_DETAILS: usize = 30;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> ChatifyResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ChatifyError::InvalidConfig(format!("{name}: cannot parse `{value}`")))
}

/// Storage locations for local state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database holding the vector collections.
    pub sqlite_path: PathBuf,
    /// Directory for per-user existence cache files; `None` keeps the cache in memory only.
    pub cache_dir: Option<PathBuf>,
    /// Optional snapshot export file.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chatify.sqlite"),
            cache_dir: Some(PathBuf::from(".chatify_cache")),
            snapshot_path: Some(PathBuf::from("user_music_data.json")),
        }
    }
}

/// Embedding model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Ollama embedding model name.
    pub model: String,
    /// Embedding vector dimensions.
    pub ndims: usize,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            ndims: 768,
            base_url: None,
        }
    }
}

/// Completion model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama completion model name.
    pub model: String,
    /// Temperature for generation.
    pub temperature: f64,
    /// Optional max tokens.
    pub max_tokens: Option<u64>,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            temperature: 0.4,
            max_tokens: None,
            base_url: None,
        }
    }
}

/// Retrieval settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of documents to retrieve per question.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 8 }
    }
}

/// Limits applied while pulling a profile snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Top artists to request.
    pub top_artists_limit: u32,
    /// Top tracks to request.
    pub top_tracks_limit: u32,
    /// Page size for saved tracks.
    pub saved_tracks_page_size: u32,
    /// Cumulative cap on saved tracks.
    pub saved_tracks_cap: usize,
    /// Playlists to request.
    pub playlists_limit: u32,
    /// Recently played tracks to request.
    pub recently_played_limit: u32,
    /// Maximum number of detailed-artist lookups.
    pub artist_detail_cap: usize,
    /// Pause between detailed-artist lookups, in milliseconds.
    pub artist_detail_delay_ms: u64,
}

impl CollectorConfig {
    /// Pause between detailed-artist lookups.
    #[must_use]
    pub const fn artist_detail_delay(&self) -> Duration {
        Duration::from_millis(self.artist_detail_delay_ms)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            top_artists_limit: 30,
            top_tracks_limit: 30,
            saved_tracks_page_size: 50,
            saved_tracks_cap: 500,
            playlists_limit: 20,
            recently_played_limit: 50,
            artist_detail_cap: MAX_ARTIST_DETAILS,
            artist_detail_delay_ms: 100,
        }
    }
}

/// How much of the display name survives redaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameRedaction {
    /// Keep the full display name.
    Full,
    /// Keep the first whitespace-separated token only.
    #[default]
    FirstName,
    /// Replace the name with a neutral placeholder.
    Anonymous,
}

/// Profile redaction settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrivacyConfig {
    /// Display name policy.
    pub name_redaction: NameRedaction,
}

/// Document generation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Emit one document per distinct top-artist genre.
    pub include_genres: bool,
    /// Maximum number of genre documents.
    pub max_genre_documents: usize,
    /// Artists listed per genre document.
    pub artists_per_genre: usize,
    /// Artists listed in the profile summary.
    pub summary_top_artists: usize,
    /// Genres listed in the profile summary.
    pub summary_top_genres: usize,
    /// Top tracks listed in the profile summary.
    pub summary_top_tracks: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            include_genres: true,
            max_genre_documents: 15,
            artists_per_genre: 5,
            summary_top_artists: 10,
            summary_top_genres: 5,
            summary_top_tracks: 5,
        }
    }
}

/// Conversation history settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Turns kept in memory (two per exchange).
    pub max_turns: usize,
    /// Turns replayed into each prompt.
    pub context_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            context_turns: 6,
        }
    }
}

/// Provider endpoints and client credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Web API base URL.
    pub api_base_url: String,
    /// OAuth token endpoint used for refreshes.
    pub token_url: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret, when the app is confidential.
    pub client_secret: Option<String>,
    /// HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.spotify.com/v1/".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            client_id: String::new(),
            client_secret: None,
            timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ChatifyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_odd_history() {
        let mut config = ChatifyConfig::default();
        config.history.max_turns = 7;
        assert!(matches!(
            config.validate(),
            Err(ChatifyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_artist_cap_above_ceiling() {
        let mut config = ChatifyConfig::default();
        config.collector.artist_detail_cap = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_saved_tracks_cap() {
        let mut config = ChatifyConfig::default();
        config.collector.saved_tracks_cap = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ChatifyError::InvalidConfig(ref msg) if msg.contains("saved_tracks_cap")));
    }

    #[test]
    fn test_rejects_zero_artist_detail_cap() {
        let mut config = ChatifyConfig::default();
        config.collector.artist_detail_cap = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ChatifyError::InvalidConfig(ref msg) if msg.contains("artist_detail_cap")));
    }

    #[test]
    fn test_rejects_zero_request_limits() {
        let mut config = ChatifyConfig::default();
        config.collector.playlists_limit = 0;
        assert!(matches!(
            config.validate(),
            Err(ChatifyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_bad_url() {
        let mut config = ChatifyConfig::default();
        config.llm.base_url = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(ChatifyError::Url(_))));
    }

    #[test]
    fn test_debug_hides_client_secret() {
        let provider = ProviderConfig {
            client_secret: Some("hunter2".to_string()),
            ..ProviderConfig::default()
        };
        assert!(!format!("{provider:?}").contains("hunter2"));
    }
}
