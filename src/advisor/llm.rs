//! Language model seam and its Ollama implementation.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client as ReqwestClient;
use rig::client::{CompletionClient, Nothing};
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;
use tracing::debug;

use crate::core::config::LlmConfig;
use crate::core::errors::{ChatifyError, ChatifyResult};

/// Boxed future type for completions.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Single-turn text completion.
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`.
    ///
    /// # Errors
    /// Returns `Generation` if the model call fails.
    fn complete(&self, prompt: String) -> CompletionFuture<'_, ChatifyResult<String>>;
}

/// Ollama completion model.
pub struct OllamaLanguageModel {
    model: ollama::CompletionModel,
    temperature: f64,
    max_tokens: Option<u64>,
}

impl OllamaLanguageModel {
    /// Build from configuration.
    ///
    /// # Errors
    /// Returns an error if the client cannot be built.
    pub fn new(config: &LlmConfig) -> ChatifyResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(ChatifyError::from)?;
        Ok(Self {
            model: client.completion_model(config.model.clone()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}

impl LanguageModel for OllamaLanguageModel {
    fn complete(&self, prompt: String) -> CompletionFuture<'_, ChatifyResult<String>> {
        Box::pin(async move {
            debug!(prompt_chars = prompt.len(), "completion request");
            let request = self
                .model
                .completion_request(prompt)
                .temperature(self.temperature)
                .max_tokens_opt(self.max_tokens)
                .build();
            let response = self
                .model
                .completion(request)
                .await
                .map_err(|err| ChatifyError::Generation(err.to_string()))?;
            let text = extract_text(&response.choice);
            if text.trim().is_empty() {
                return Err(ChatifyError::Generation(
                    "model returned no text".to_string(),
                ));
            }
            Ok(text)
        })
    }
}
