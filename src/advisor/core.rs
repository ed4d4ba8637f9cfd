//! Retrieval-augmented music advisor.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::advisor::history::ConversationHistory;
use crate::advisor::llm::LanguageModel;
use crate::advisor::prompt::{
    AskPrompt, build_analysis_prompt, build_ask_prompt, conversation_context, profile_summary,
    relevant_info,
};
use crate::core::config::{ChatifyConfig, DocumentConfig, HistoryConfig, RetrievalConfig};
use crate::core::errors::{ChatifyError, ChatifyResult};
use crate::knowledge::document::RetrievableDocument;
use crate::knowledge::store::KnowledgeStore;
use crate::profile::auth::SharedCredential;
use crate::profile::collector::ProfileCollector;
use crate::profile::records::ProfileSnapshot;

/// Notice shown when the answer could not use the knowledge base.
pub const DEGRADED_NOTICE: &str = "I couldn't reach your music library just now, \
so this answer only uses your profile summary. Try updating your library if this persists.";

/// How retrieval went for one question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetrievalStatus {
    /// The collection answered directly.
    Fresh,
    /// The collection was missing and was rebuilt before answering.
    SelfHealed,
    /// Retrieval failed; the answer has no relevant-info section.
    Degraded,
}

/// Reply to one question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvisorReply {
    /// Text to show as the assistant's message.
    pub answer: String,
    /// Extra message for the user, if any.
    pub notice: Option<String>,
    /// Retrieval outcome.
    pub retrieval: RetrievalStatus,
    /// The model call failed and `answer` describes the failure.
    pub failed: bool,
}

/// Dialog state plus the collaborators needed to answer questions.
pub struct ConversationalAdvisor {
    store: Arc<KnowledgeStore>,
    model: Arc<dyn LanguageModel>,
    collector: Option<ProfileCollector>,
    credential: Option<SharedCredential>,
    snapshot: Option<ProfileSnapshot>,
    history: ConversationHistory,
    retrieval: RetrievalConfig,
    history_config: HistoryConfig,
    documents: DocumentConfig,
}

impl ConversationalAdvisor {
    /// Create an advisor over `store`.
    #[must_use]
    pub fn new(
        store: Arc<KnowledgeStore>,
        model: Arc<dyn LanguageModel>,
        config: &ChatifyConfig,
    ) -> Self {
        Self {
            store,
            model,
            collector: None,
            credential: None,
            snapshot: None,
            history: ConversationHistory::new(config.history.max_turns),
            retrieval: config.retrieval.clone(),
            history_config: config.history.clone(),
            documents: config.documents.clone(),
        }
    }

    /// Use `snapshot` for the profile summary and self-healing.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: ProfileSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Allow self-healing to recollect the profile.
    #[must_use]
    pub fn with_collector(
        mut self,
        collector: ProfileCollector,
        credential: SharedCredential,
    ) -> Self {
        self.collector = Some(collector);
        self.credential = Some(credential);
        self
    }

    /// Replace the held snapshot.
    pub fn set_snapshot(&mut self, snapshot: ProfileSnapshot) {
        self.snapshot = Some(snapshot);
    }

    /// Held snapshot, if any.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&ProfileSnapshot> {
        self.snapshot.as_ref()
    }

    /// Knowledge store in use.
    #[must_use]
    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// Conversation so far.
    #[must_use]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Forget the conversation.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Answer `question` using retrieved profile facts and recent turns.
    ///
    /// Never fails: retrieval problems degrade to an answer without
    /// relevant info, and a failed model call becomes the reply text.
    pub async fn ask(&mut self, question: &str) -> AdvisorReply {
        let (documents, retrieval) = self.retrieve(question).await;

        let summary = self.summary_text();
        let info = relevant_info(&documents);
        let context = conversation_context(&self.history, self.history_config.context_turns);
        let prompt = build_ask_prompt(&AskPrompt {
            profile_summary: &summary,
            relevant_info: &info,
            conversation_context: &context,
            question,
            self_healed: retrieval == RetrievalStatus::SelfHealed,
        });
        debug!(
            prompt_chars = prompt.len(),
            documents = documents.len(),
            "ask prompt assembled"
        );

        let notice = (retrieval == RetrievalStatus::Degraded).then(|| DEGRADED_NOTICE.to_string());
        match self.model.complete(prompt).await {
            Ok(answer) => {
                self.history.record_exchange(question, answer.clone());
                AdvisorReply {
                    answer,
                    notice,
                    retrieval,
                    failed: false,
                }
            }
            Err(err) => {
                warn!(error = %err, "generation failed");
                AdvisorReply {
                    answer: format!("Sorry, I couldn't come up with an answer this time ({err})."),
                    notice,
                    retrieval,
                    failed: true,
                }
            }
        }
    }

    /// One-off taste analysis from the profile summary alone.
    ///
    /// Does not retrieve and does not touch the conversation history.
    ///
    /// # Errors
    /// Returns `Generation` if the model call fails.
    pub async fn analyze_profile(&self) -> ChatifyResult<String> {
        let prompt = build_analysis_prompt(&self.summary_text());
        self.model.complete(prompt).await
    }

    fn summary_text(&self) -> String {
        self.snapshot.as_ref().map_or_else(
            || "Name: User\n(no listening profile loaded)".to_string(),
            |snapshot| profile_summary(snapshot, &self.documents),
        )
    }

    async fn retrieve(&mut self, question: &str) -> (Vec<RetrievableDocument>, RetrievalStatus) {
        let k = self.retrieval.top_k;
        match self.store.search(question, k).await {
            Ok(documents) => (documents, RetrievalStatus::Fresh),
            Err(err) if err.needs_reinitialization() => {
                info!(collection = %self.store.collection_name(), "collection missing, self-healing");
                match self.self_heal(question, k).await {
                    Ok(documents) => (documents, RetrievalStatus::SelfHealed),
                    Err(heal_err) => {
                        warn!(error = %heal_err, "self-healing failed, answering without retrieval");
                        (Vec::new(), RetrievalStatus::Degraded)
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "retrieval failed, answering without retrieval");
                (Vec::new(), RetrievalStatus::Degraded)
            }
        }
    }

    async fn self_heal(&mut self, question: &str, k: usize) -> ChatifyResult<Vec<RetrievableDocument>> {
        let snapshot = self.healing_snapshot().await?;
        self.store.initialize(&snapshot, false).await?;
        self.snapshot = Some(snapshot);
        self.store.search(question, k).await
    }

    async fn healing_snapshot(&mut self) -> ChatifyResult<ProfileSnapshot> {
        if let Some(snapshot) = self.snapshot.as_ref().filter(|s| s.has_profile()) {
            return Ok(snapshot.clone());
        }
        match (self.collector.as_ref(), self.credential.as_ref()) {
            (Some(collector), Some(credential)) => {
                collector.collect_all(&mut *credential.lock().await).await
            }
            _ => Err(ChatifyError::Operation {
                operation: "self-heal",
                message: "no snapshot or credential available".to_string(),
            }),
        }
    }
}
