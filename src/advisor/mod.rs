//! Conversational layer: history, prompts, model seam and the advisor.

pub mod core;
pub mod history;
pub mod llm;
pub mod prompt;

pub use self::core::{AdvisorReply, ConversationalAdvisor, DEGRADED_NOTICE, RetrievalStatus};
pub use history::{ConversationHistory, ConversationRole, ConversationTurn};
pub use llm::{CompletionFuture, LanguageModel, OllamaLanguageModel};
pub use prompt::{build_analysis_prompt, build_ask_prompt, profile_summary};
