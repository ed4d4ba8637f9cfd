//! Per-user knowledge base.
//!
//! - `document` / `builder`: snapshot to retrievable documents
//! - `naming` / `cache`: collection names and the advisory existence cache
//! - `embedding`: text to vectors
//! - `backend`, `sqlite_backend`, `memory_backend`: vector storage
//! - `store`: the per-user lifecycle (exists, initialize, update, search, delete)

pub mod backend;
pub mod builder;
pub mod cache;
pub mod document;
pub mod embedding;
pub mod memory_backend;
pub mod naming;
pub mod sqlite_backend;
pub mod sqlite_vec_loader;
pub mod store;

pub use backend::{BackendFuture, ScoredDocument, VectorBackend};
pub use builder::{DocumentBuilder, rank_genres};
pub use cache::ExistenceCache;
pub use document::{DocumentKind, DocumentMetadata, RetrievableDocument};
pub use embedding::{EmbedFuture, Embedder, OllamaEmbedder};
pub use memory_backend::InMemoryBackend;
pub use naming::collection_name;
pub use sqlite_backend::SqliteVecBackend;
pub use store::{InitializeOutcome, KnowledgeStore};
