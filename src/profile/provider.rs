//! Provider data client abstraction.
//!
//! Implementations return records in the provider's native JSON shape; the
//! collector owns pagination and normalization.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::core::errors::ChatifyResult;

/// Boxed future type for provider calls.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One page of raw records.
#[derive(Clone, Debug, Default)]
pub struct Page {
    /// Raw records on this page.
    pub items: Vec<Value>,
    /// Total number of records available upstream, when reported.
    pub total: Option<u64>,
}

impl Page {
    /// Build a page from a provider envelope (`{"items": [...], "total": n}`).
    #[must_use]
    pub fn from_envelope(envelope: Value) -> Self {
        let total = envelope.get("total").and_then(Value::as_u64);
        let items = match envelope {
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Self { items, total }
    }
}

/// Paginated fetchers over the music provider's user endpoints.
pub trait ProviderClient: Send + Sync {
    /// Fetch the current user's account profile.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn current_user(&self, access_token: &str) -> ProviderFuture<'_, ChatifyResult<Value>>;

    /// Fetch the user's top artists.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn top_artists(&self, access_token: &str, limit: u32) -> ProviderFuture<'_, ChatifyResult<Page>>;

    /// Fetch the user's top tracks.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn top_tracks(&self, access_token: &str, limit: u32) -> ProviderFuture<'_, ChatifyResult<Page>>;

    /// Fetch one page of saved tracks; items wrap the track under `track`.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn saved_tracks(
        &self,
        access_token: &str,
        limit: u32,
        offset: u32,
    ) -> ProviderFuture<'_, ChatifyResult<Page>>;

    /// Fetch the user's playlists.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn playlists(&self, access_token: &str, limit: u32) -> ProviderFuture<'_, ChatifyResult<Page>>;

    /// Fetch recently played tracks; items wrap the track under `track`.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn recently_played(
        &self,
        access_token: &str,
        limit: u32,
    ) -> ProviderFuture<'_, ChatifyResult<Page>>;

    /// Fetch one artist by id.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn artist(&self, access_token: &str, artist_id: &str) -> ProviderFuture<'_, ChatifyResult<Value>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_page_from_envelope() {
        let page = Page::from_envelope(json!({"items": [{"id": 1}, {"id": 2}], "total": 9}));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, Some(9));
    }

    #[test]
    fn test_page_from_unexpected_shape() {
        let page = Page::from_envelope(json!([1, 2, 3]));
        assert!(page.items.is_empty());
        assert_eq!(page.total, None);
    }
}
