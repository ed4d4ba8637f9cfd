//! Configuration, errors and identifiers.

pub mod config;
pub mod errors;
pub mod ids;

pub use config::{
    ChatifyConfig, CollectorConfig, DocumentConfig, EmbeddingConfig, HistoryConfig, LlmConfig,
    NameRedaction, PrivacyConfig, ProviderConfig, RetrievalConfig, StorageConfig,
};
pub use errors::{ChatifyError, ChatifyResult};
pub use ids::DocumentId;
