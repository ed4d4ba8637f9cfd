//! Text embedding over Rig + Ollama.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client as ReqwestClient;
use rig::client::{EmbeddingsClient, Nothing};
use rig::embeddings::{Embedding, EmbeddingModel};
use rig::providers::ollama;

use crate::core::config::EmbeddingConfig;
use crate::core::errors::{ChatifyError, ChatifyResult};

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Maps text to fixed-length vectors.
///
/// Implementations must be deterministic for a given text and model version.
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_text(&self, text: &str) -> EmbedFuture<'_, ChatifyResult<Vec<f32>>>;

    /// Embed several texts, preserving order.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, ChatifyResult<Vec<Vec<f32>>>>;

    /// Vector length.
    fn ndims(&self) -> usize;
}

type OllamaEmbeddingModel = ollama::EmbeddingModel<ReqwestClient>;

/// Ollama embedder.
#[derive(Clone)]
pub struct OllamaEmbedder {
    model: OllamaEmbeddingModel,
    ndims: usize,
}

impl OllamaEmbedder {
    /// Build from configuration.
    ///
    /// # Errors
    /// Returns an error if the client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> ChatifyResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(ChatifyError::from)?;
        let model = client.embedding_model_with_ndims(config.model.clone(), config.ndims);
        Ok(Self {
            model,
            ndims: config.ndims,
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_f32(embedding: &Embedding) -> Vec<f32> {
    embedding.vec.iter().map(|value| *value as f32).collect()
}

impl Embedder for OllamaEmbedder {
    fn embed_text(&self, text: &str) -> EmbedFuture<'_, ChatifyResult<Vec<f32>>> {
        let text = text.to_string();
        Box::pin(async move {
            let embedding = self
                .model
                .embed_text(&text)
                .await
                .map_err(ChatifyError::Embedding)?;
            Ok(to_f32(&embedding))
        })
    }

    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, ChatifyResult<Vec<Vec<f32>>>> {
        Box::pin(async move {
            let embeddings = self
                .model
                .embed_texts(texts)
                .await
                .map_err(ChatifyError::Embedding)?;
            Ok(embeddings.iter().map(to_f32).collect())
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}
