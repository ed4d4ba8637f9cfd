//! Caller-facing session facade.
//!
//! Wires the collector, knowledge store and advisor for one user and puts
//! the top-level error boundary around each operation: uncategorized
//! failures come back as `Operation { operation, message }`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::advisor::core::{AdvisorReply, ConversationalAdvisor};
use crate::advisor::llm::{LanguageModel, OllamaLanguageModel};
use crate::core::config::ChatifyConfig;
use crate::core::errors::{ChatifyError, ChatifyResult};
use crate::knowledge::cache::ExistenceCache;
use crate::knowledge::embedding::OllamaEmbedder;
use crate::knowledge::sqlite_backend::SqliteVecBackend;
use crate::knowledge::store::{InitializeOutcome, KnowledgeStore};
use crate::profile::auth::{Credential, SharedCredential};
use crate::profile::collector::{ProfileCollector, save_snapshot};
use crate::profile::records::ProfileSnapshot;

/// One user's chat session.
pub struct ChatifySession {
    store: Arc<KnowledgeStore>,
    advisor: ConversationalAdvisor,
    collector: Option<ProfileCollector>,
    credential: Option<SharedCredential>,
    snapshot_path: Option<PathBuf>,
}

impl ChatifySession {
    /// Session over explicit collaborators.
    #[must_use]
    pub fn new(
        store: Arc<KnowledgeStore>,
        model: Arc<dyn LanguageModel>,
        config: &ChatifyConfig,
    ) -> Self {
        let advisor = ConversationalAdvisor::new(Arc::clone(&store), model, config);
        Self {
            store,
            advisor,
            collector: None,
            credential: None,
            snapshot_path: config.storage.snapshot_path.clone(),
        }
    }

    /// Session backed by `SQLite` + sqlite-vec and Ollama models.
    ///
    /// # Errors
    /// Returns an error if the database or a model client cannot be set up.
    pub async fn open(config: &ChatifyConfig, user_id: &str) -> ChatifyResult<Self> {
        config.validate()?;
        let backend = SqliteVecBackend::open(&config.storage.sqlite_path)
            .await
            .map_err(|err| err.at_boundary("open"))?;
        let embedder = OllamaEmbedder::new(&config.embedding)?;
        let model = OllamaLanguageModel::new(&config.llm)?;
        let store = KnowledgeStore::new(
            user_id,
            Arc::new(backend),
            Arc::new(embedder),
            ExistenceCache::new(config.storage.cache_dir.as_deref()),
            config.documents.clone(),
        );
        Ok(Self::new(Arc::new(store), Arc::new(model), config))
    }

    /// Allow the session to (re)collect the profile from the provider.
    ///
    /// The session and its advisor refresh one shared credential.
    #[must_use]
    pub fn with_collector(mut self, collector: ProfileCollector, credential: Credential) -> Self {
        let credential = SharedCredential::new(credential);
        self.advisor = self
            .advisor
            .with_collector(collector.clone(), credential.clone());
        self.collector = Some(collector);
        self.credential = Some(credential);
        self
    }

    /// Index `snapshot`, or a freshly collected one when `None`.
    ///
    /// An already indexed collection is kept as is.
    ///
    /// # Errors
    /// Returns `AuthExpired`, `Collection`, or `Operation` on failure.
    pub async fn initialize(
        &mut self,
        snapshot: Option<ProfileSnapshot>,
    ) -> ChatifyResult<InitializeOutcome> {
        self.load(snapshot, false)
            .await
            .map_err(|err| err.at_boundary("initialize"))
    }

    /// Recollect (when a collector is configured) and rebuild the index.
    ///
    /// # Errors
    /// Returns `AuthExpired`, `Collection`, or `Operation` on failure.
    pub async fn update(&mut self) -> ChatifyResult<InitializeOutcome> {
        self.load(None, true)
            .await
            .map_err(|err| err.at_boundary("update"))
    }

    /// Answer a question. Never fails; see [`ConversationalAdvisor::ask`].
    pub async fn ask(&mut self, question: &str) -> AdvisorReply {
        self.advisor.ask(question).await
    }

    /// Taste analysis of the loaded profile.
    ///
    /// # Errors
    /// Returns `Operation` if the model call fails.
    pub async fn analyze_profile(&self) -> ChatifyResult<String> {
        self.advisor
            .analyze_profile()
            .await
            .map_err(|err| err.at_boundary("analyze_profile"))
    }

    /// Delete the user's collection and the conversation.
    ///
    /// # Errors
    /// Returns `Operation` if the collection cannot be removed.
    pub async fn forget(&mut self) -> ChatifyResult<()> {
        self.store
            .delete()
            .await
            .map_err(|err| err.at_boundary("forget"))?;
        self.advisor.clear_history();
        info!(user = %self.store.collection_name(), "user data forgotten");
        Ok(())
    }

    /// Forget the conversation only.
    pub fn clear_history(&mut self) {
        self.advisor.clear_history();
    }

    /// Advisor state, for display.
    #[must_use]
    pub const fn advisor(&self) -> &ConversationalAdvisor {
        &self.advisor
    }

    /// Knowledge store in use.
    #[must_use]
    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    async fn load(
        &mut self,
        snapshot: Option<ProfileSnapshot>,
        rebuild: bool,
    ) -> ChatifyResult<InitializeOutcome> {
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => self.obtain_snapshot(rebuild).await?,
        };
        let outcome = self.store.initialize(&snapshot, rebuild).await?;
        if matches!(outcome, InitializeOutcome::Created { .. }) {
            self.export(&snapshot);
        }
        self.advisor.set_snapshot(snapshot);
        Ok(outcome)
    }

    async fn obtain_snapshot(&mut self, prefer_fresh: bool) -> ChatifyResult<ProfileSnapshot> {
        if let Some(snapshot) = self.advisor.snapshot().filter(|_| !prefer_fresh) {
            return Ok(snapshot.clone());
        }
        match (self.collector.as_ref(), self.credential.as_ref()) {
            (Some(collector), Some(credential)) => {
                collector.collect_all(&mut *credential.lock().await).await
            }
            _ => self.advisor.snapshot().cloned().ok_or_else(|| ChatifyError::Operation {
                operation: "collect",
                message: "no profile snapshot and no provider credential".to_string(),
            }),
        }
    }

    fn export(&self, snapshot: &ProfileSnapshot) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        if let Err(err) = save_snapshot(snapshot, path) {
            warn!(path = %path.display(), error = %err, "snapshot export failed");
        }
    }
}
