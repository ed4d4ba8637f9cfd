//! Listening-profile acquisition.
//!
//! - `records`: normalized artist/track/playlist records and the snapshot aggregate
//! - `extractor`: raw provider JSON to records, plus profile redaction
//! - `provider`: the paginated provider client seam
//! - `spotify`: Spotify Web API client
//! - `auth`: bearer credentials and refresh
//! - `collector`: snapshot assembly and export

pub mod auth;
pub mod collector;
pub mod extractor;
pub mod provider;
pub mod records;
pub mod spotify;

pub use auth::{Credential, CredentialSupplier, OAuthRefresher, SharedCredential};
pub use collector::{ProfileCollector, load_snapshot, save_snapshot};
pub use extractor::{SENSITIVE_FIELDS, extract_artist, extract_playlist, extract_track, redact_profile};
pub use provider::{Page, ProviderClient, ProviderFuture};
pub use records::{ArtistRecord, PlaylistSummary, ProfileSnapshot, TrackRecord, UserProfile};
pub use spotify::SpotifyClient;
