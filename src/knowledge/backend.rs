//! Vector backend seam.
//!
//! A backend hosts named collections of documents with their embeddings.
//! Collections are never shared between users; isolation comes from the
//! caller choosing the name.

use std::future::Future;
use std::pin::Pin;

use crate::core::errors::ChatifyResult;
use crate::knowledge::document::RetrievableDocument;

/// Boxed future type for backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A document with its distance to the query vector.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredDocument {
    /// Stored document.
    pub document: RetrievableDocument,
    /// Distance to the query; smaller is closer.
    pub distance: f32,
}

/// Storage for per-user collections.
pub trait VectorBackend: Send + Sync {
    /// Authoritative existence check.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be queried.
    fn collection_exists(&self, name: &str) -> BackendFuture<'_, ChatifyResult<bool>>;

    /// Create an empty collection for vectors of length `ndims`.
    ///
    /// # Errors
    /// Returns an error if the collection cannot be created.
    fn create_collection(&self, name: &str, ndims: usize) -> BackendFuture<'_, ChatifyResult<()>>;

    /// Drop a collection. Dropping an absent collection succeeds.
    ///
    /// # Errors
    /// Returns an error if the backend refuses the drop.
    fn drop_collection(&self, name: &str) -> BackendFuture<'_, ChatifyResult<()>>;

    /// Insert documents with their embeddings (same order, same length).
    ///
    /// # Errors
    /// Returns `NeedsReinitialization` if the collection is absent, or a
    /// storage error.
    fn insert(
        &self,
        name: &str,
        entries: Vec<(RetrievableDocument, Vec<f32>)>,
    ) -> BackendFuture<'_, ChatifyResult<()>>;

    /// Up to `k` documents ordered by increasing distance.
    ///
    /// # Errors
    /// Returns `NeedsReinitialization` if the collection is absent.
    fn nearest(
        &self,
        name: &str,
        query: Vec<f32>,
        k: usize,
    ) -> BackendFuture<'_, ChatifyResult<Vec<ScoredDocument>>>;

    /// Number of stored documents.
    ///
    /// # Errors
    /// Returns `NeedsReinitialization` if the collection is absent.
    fn count(&self, name: &str) -> BackendFuture<'_, ChatifyResult<usize>>;
}
