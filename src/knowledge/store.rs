//! Per-user knowledge store.
//!
//! One store instance serves exactly one user. Its collection name is derived
//! from the user id, and every backend call goes through that name, so no
//! operation can reach another user's documents.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::config::DocumentConfig;
use crate::core::errors::{ChatifyError, ChatifyResult};
use crate::knowledge::backend::VectorBackend;
use crate::knowledge::builder::DocumentBuilder;
use crate::knowledge::cache::ExistenceCache;
use crate::knowledge::document::RetrievableDocument;
use crate::knowledge::embedding::Embedder;
use crate::knowledge::naming::collection_name;
use crate::profile::records::ProfileSnapshot;

/// Result of [`KnowledgeStore::initialize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitializeOutcome {
    /// The collection was (re)built with this many documents.
    Created {
        /// Ingested document count.
        documents: usize,
    },
    /// The collection already existed; nothing was written.
    AlreadyPresent,
}

/// Vector index over one user's profile documents.
pub struct KnowledgeStore {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn Embedder>,
    builder: DocumentBuilder,
    cache: ExistenceCache,
    user_id: String,
    collection: String,
}

impl KnowledgeStore {
    /// Create a store bound to `user_id`.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn Embedder>,
        cache: ExistenceCache,
        documents: DocumentConfig,
    ) -> Self {
        let user_id = user_id.into();
        let collection = collection_name(&user_id);
        Self {
            backend,
            embedder,
            builder: DocumentBuilder::new(documents),
            cache,
            user_id,
            collection,
        }
    }

    /// Owning user id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Collection backing this store.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Document builder used for ingestion.
    #[must_use]
    pub const fn builder(&self) -> &DocumentBuilder {
        &self.builder
    }

    /// Whether the collection exists.
    ///
    /// With `use_cache`, a cache hit answers immediately and may be stale if
    /// the collection was removed behind the store's back. Without it, the
    /// backend is asked and the cache is refreshed from the answer.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be queried.
    pub async fn exists(&self, use_cache: bool) -> ChatifyResult<bool> {
        if use_cache && self.cache.contains(&self.collection) {
            return Ok(true);
        }
        let exists = self.backend.collection_exists(&self.collection).await?;
        if exists {
            self.cache.mark(&self.collection);
        } else {
            self.cache.clear(&self.collection);
        }
        Ok(exists)
    }

    /// Create and fill the collection from `snapshot` unless it already exists.
    ///
    /// With `force_recreate`, any existing collection is dropped first. An
    /// existing collection without `force_recreate` is left untouched.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the snapshot belongs to another user, or an
    /// embedding/storage error. A collection created by a failed call is
    /// dropped again.
    pub async fn initialize(
        &self,
        snapshot: &ProfileSnapshot,
        force_recreate: bool,
    ) -> ChatifyResult<InitializeOutcome> {
        if snapshot.user.id != self.user_id {
            return Err(ChatifyError::InvalidConfig(format!(
                "snapshot for another user cannot be stored in {}",
                self.collection
            )));
        }

        if force_recreate {
            self.backend.drop_collection(&self.collection).await?;
            self.cache.clear(&self.collection);
            info!(collection = %self.collection, "collection dropped for rebuild");
        }

        if self.exists(true).await? {
            debug!(collection = %self.collection, "collection present, skipping ingest");
            return Ok(InitializeOutcome::AlreadyPresent);
        }

        let documents = self.builder.build(snapshot);
        let texts = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed_texts(texts).await?;
        if vectors.len() != documents.len() {
            return Err(ChatifyError::Operation {
                operation: "initialize",
                message: format!(
                    "embedder returned {} vectors for {} documents",
                    vectors.len(),
                    documents.len()
                ),
            });
        }

        let count = documents.len();
        self.backend
            .create_collection(&self.collection, self.embedder.ndims())
            .await?;
        let entries = documents.into_iter().zip(vectors).collect();
        if let Err(err) = self.backend.insert(&self.collection, entries).await {
            warn!(collection = %self.collection, error = %err, "ingest failed, dropping collection");
            if let Err(drop_err) = self.backend.drop_collection(&self.collection).await {
                warn!(collection = %self.collection, error = %drop_err, "cleanup drop failed");
            }
            self.cache.clear(&self.collection);
            return Err(err);
        }

        self.cache.mark(&self.collection);
        info!(collection = %self.collection, documents = count, "collection ingested");
        Ok(InitializeOutcome::Created { documents: count })
    }

    /// Full rebuild from `snapshot`.
    ///
    /// # Errors
    /// Same as [`KnowledgeStore::initialize`].
    pub async fn update(&self, snapshot: &ProfileSnapshot) -> ChatifyResult<InitializeOutcome> {
        self.initialize(snapshot, true).await
    }

    /// Up to `k` documents closest to `query`, most similar first.
    ///
    /// # Errors
    /// Returns `NeedsReinitialization` if the collection is absent (the cache
    /// entry is cleared first), or an embedding/storage error.
    pub async fn search(&self, query: &str, k: usize) -> ChatifyResult<Vec<RetrievableDocument>> {
        let vector = self.embedder.embed_text(query).await?;
        match self.backend.nearest(&self.collection, vector, k).await {
            Ok(hits) => {
                debug!(collection = %self.collection, hits = hits.len(), "search");
                Ok(hits.into_iter().map(|hit| hit.document).collect())
            }
            Err(err) => {
                if err.needs_reinitialization() {
                    self.cache.clear(&self.collection);
                }
                Err(err)
            }
        }
    }

    /// Remove the collection. Succeeds if it is already gone.
    ///
    /// # Errors
    /// Returns an error if the backend refuses the drop.
    pub async fn delete(&self) -> ChatifyResult<()> {
        self.backend.drop_collection(&self.collection).await?;
        self.cache.clear(&self.collection);
        info!(collection = %self.collection, "collection deleted");
        Ok(())
    }

    /// Number of stored documents.
    ///
    /// # Errors
    /// Returns `NeedsReinitialization` if the collection is absent.
    pub async fn document_count(&self) -> ChatifyResult<usize> {
        self.backend.count(&self.collection).await
    }
}
