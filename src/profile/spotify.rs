//! Spotify Web API implementation of the provider client.

use std::time::Duration;

use reqwest::Client as ReqwestClient;
use serde_json::Value;
use url::Url;

use crate::core::config::ProviderConfig;
use crate::core::errors::{ChatifyError, ChatifyResult};
use crate::profile::provider::{Page, ProviderClient, ProviderFuture};

/// Maximum page size accepted by the Web API.
const MAX_PAGE: u32 = 50;

/// Reqwest-backed Spotify client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: ReqwestClient,
    base_url: Url,
}

impl SpotifyClient {
    /// Create a client from provider settings.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &ProviderConfig) -> ChatifyResult<Self> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let mut base_url = Url::parse(&config.api_base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> ChatifyResult<Url> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json(&self, access_token: &str, url: Url) -> ChatifyResult<Value> {
        let endpoint = url.path().to_string();
        let response = self.http.get(url).bearer_auth(access_token).send().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ChatifyError::AuthExpired);
        }

        if !response.status().is_success() {
            return Err(ChatifyError::Provider {
                status: response.status().as_u16(),
                endpoint,
            });
        }

        Ok(response.json().await?)
    }

    async fn get_page(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> ChatifyResult<Page> {
        let url = self.endpoint(path, query)?;
        Ok(Page::from_envelope(self.get_json(access_token, url).await?))
    }
}

fn limit_param(limit: u32) -> (&'static str, String) {
    ("limit", limit.clamp(1, MAX_PAGE).to_string())
}

impl ProviderClient for SpotifyClient {
    fn current_user(&self, access_token: &str) -> ProviderFuture<'_, ChatifyResult<Value>> {
        let token = access_token.to_string();
        Box::pin(async move {
            let url = self.endpoint("me", &[])?;
            self.get_json(&token, url).await
        })
    }

    fn top_artists(&self, access_token: &str, limit: u32) -> ProviderFuture<'_, ChatifyResult<Page>> {
        let token = access_token.to_string();
        Box::pin(async move {
            let query = [limit_param(limit), ("time_range", "medium_term".to_string())];
            self.get_page(&token, "me/top/artists", &query).await
        })
    }

    fn top_tracks(&self, access_token: &str, limit: u32) -> ProviderFuture<'_, ChatifyResult<Page>> {
        let token = access_token.to_string();
        Box::pin(async move {
            let query = [limit_param(limit), ("time_range", "medium_term".to_string())];
            self.get_page(&token, "me/top/tracks", &query).await
        })
    }

    fn saved_tracks(
        &self,
        access_token: &str,
        limit: u32,
        offset: u32,
    ) -> ProviderFuture<'_, ChatifyResult<Page>> {
        let token = access_token.to_string();
        Box::pin(async move {
            let query = [limit_param(limit), ("offset", offset.to_string())];
            self.get_page(&token, "me/tracks", &query).await
        })
    }

    fn playlists(&self, access_token: &str, limit: u32) -> ProviderFuture<'_, ChatifyResult<Page>> {
        let token = access_token.to_string();
        Box::pin(async move {
            self.get_page(&token, "me/playlists", &[limit_param(limit)])
                .await
        })
    }

    fn recently_played(
        &self,
        access_token: &str,
        limit: u32,
    ) -> ProviderFuture<'_, ChatifyResult<Page>> {
        let token = access_token.to_string();
        Box::pin(async move {
            self.get_page(&token, "me/player/recently-played", &[limit_param(limit)])
                .await
        })
    }

    fn artist(&self, access_token: &str, artist_id: &str) -> ProviderFuture<'_, ChatifyResult<Value>> {
        let token = access_token.to_string();
        let artist_id = artist_id.to_string();
        Box::pin(async move {
            let mut url = self.endpoint("artists/", &[])?;
            url.path_segments_mut()
                .map_err(|()| ChatifyError::InvalidConfig("provider base url cannot be a base".to_string()))?
                .pop_if_empty()
                .push(&artist_id);
            self.get_json(&token, url).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let client = SpotifyClient::new(&ProviderConfig::default()).unwrap();
        let url = client
            .endpoint("me/tracks", &[limit_param(80), ("offset", "50".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.spotify.com/v1/me/tracks?limit=50&offset=50"
        );
    }

    #[test]
    fn test_base_without_trailing_slash() {
        let config = ProviderConfig {
            api_base_url: "https://api.spotify.com/v1".to_string(),
            ..ProviderConfig::default()
        };
        let client = SpotifyClient::new(&config).unwrap();
        let url = client.endpoint("me", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.spotify.com/v1/me");
    }
}
