//! In-process vector backend with cosine distance.

use dashmap::DashMap;

use crate::core::errors::{ChatifyError, ChatifyResult};
use crate::knowledge::backend::{BackendFuture, ScoredDocument, VectorBackend};
use crate::knowledge::document::RetrievableDocument;

#[derive(Debug)]
struct Collection {
    ndims: usize,
    entries: Vec<(RetrievableDocument, Vec<f32>)>,
}

/// `DashMap`-backed collections; contents vanish with the process.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    collections: DashMap<String, Collection>,
}

impl InMemoryBackend {
    /// Empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// `1 - cos(a, b)`; zero vectors are treated as maximally distant.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn missing(name: &str) -> ChatifyError {
    ChatifyError::NeedsReinitialization {
        collection: name.to_string(),
    }
}

impl VectorBackend for InMemoryBackend {
    fn collection_exists(&self, name: &str) -> BackendFuture<'_, ChatifyResult<bool>> {
        let exists = self.collections.contains_key(name);
        Box::pin(async move { Ok(exists) })
    }

    fn create_collection(&self, name: &str, ndims: usize) -> BackendFuture<'_, ChatifyResult<()>> {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| Collection {
                ndims,
                entries: Vec::new(),
            });
        Box::pin(async { Ok(()) })
    }

    fn drop_collection(&self, name: &str) -> BackendFuture<'_, ChatifyResult<()>> {
        self.collections.remove(name);
        Box::pin(async { Ok(()) })
    }

    fn insert(
        &self,
        name: &str,
        entries: Vec<(RetrievableDocument, Vec<f32>)>,
    ) -> BackendFuture<'_, ChatifyResult<()>> {
        let result = match self.collections.get_mut(name) {
            Some(mut collection) => {
                if let Some((_, vector)) = entries.iter().find(|(_, v)| v.len() != collection.ndims) {
                    Err(ChatifyError::InvalidConfig(format!(
                        "embedding has {} dimensions, collection expects {}",
                        vector.len(),
                        collection.ndims
                    )))
                } else {
                    collection.entries.extend(entries);
                    Ok(())
                }
            }
            None => Err(missing(name)),
        };
        Box::pin(async move { result })
    }

    fn nearest(
        &self,
        name: &str,
        query: Vec<f32>,
        k: usize,
    ) -> BackendFuture<'_, ChatifyResult<Vec<ScoredDocument>>> {
        let result = self.collections.get(name).map_or_else(
            || Err(missing(name)),
            |collection| {
                let mut scored: Vec<ScoredDocument> = collection
                    .entries
                    .iter()
                    .map(|(document, vector)| ScoredDocument {
                        document: document.clone(),
                        distance: cosine_distance(&query, vector),
                    })
                    .collect();
                scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
                scored.truncate(k);
                Ok(scored)
            },
        );
        Box::pin(async move { result })
    }

    fn count(&self, name: &str) -> BackendFuture<'_, ChatifyResult<usize>> {
        let result = self
            .collections
            .get(name)
            .map(|collection| collection.entries.len())
            .ok_or_else(|| missing(name));
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::DocumentId;
    use crate::knowledge::document::{DocumentKind, DocumentMetadata};

    fn doc(content: &str) -> RetrievableDocument {
        RetrievableDocument {
            id: DocumentId::random(),
            content: content.to_string(),
            metadata: DocumentMetadata::new(DocumentKind::Artist, "user-1"),
        }
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[0.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_nearest_orders_by_distance() {
        let backend = InMemoryBackend::new();
        backend.create_collection("c", 2).await.unwrap();
        backend
            .insert(
                "c",
                vec![
                    (doc("far"), vec![0.0, 1.0]),
                    (doc("near"), vec![1.0, 0.1]),
                    (doc("mid"), vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        let hits = backend.nearest("c", vec![1.0, 0.0], 2).await.unwrap();
        let contents: Vec<_> = hits.iter().map(|h| h.document.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "mid"]);
    }

    #[tokio::test]
    async fn test_missing_collection_needs_reinitialization() {
        let backend = InMemoryBackend::new();
        let err = backend.nearest("absent", vec![1.0], 3).await.unwrap_err();
        assert!(err.needs_reinitialization());
        assert!(backend.count("absent").await.unwrap_err().needs_reinitialization());
        backend.drop_collection("absent").await.unwrap();
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let backend = InMemoryBackend::new();
        backend.create_collection("c", 3).await.unwrap();
        let err = backend
            .insert("c", vec![(doc("x"), vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, ChatifyError::InvalidConfig(_)));
        assert_eq!(backend.count("c").await.unwrap(), 0);
    }
}
