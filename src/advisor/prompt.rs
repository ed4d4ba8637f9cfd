//! Prompt assembly for grounded answers and profile analysis.

use std::fmt::Write as _;

use crate::advisor::history::ConversationHistory;
use crate::core::config::DocumentConfig;
use crate::knowledge::builder::rank_top_artist_genres;
use crate::knowledge::document::RetrievableDocument;
use crate::profile::records::ProfileSnapshot;

/// Shown when retrieval produced nothing.
pub const NO_RELEVANT_INFO: &str = "No specific information";

const PERSONA: &str = "You are Chatify, a cheerful and charismatic music advisor. \
You answer using the listening profile of one streaming-service user.";

/// Inputs for one grounded question.
#[derive(Clone, Debug)]
pub struct AskPrompt<'a> {
    /// Static profile summary.
    pub profile_summary: &'a str,
    /// Retrieved snippets, or [`NO_RELEVANT_INFO`].
    pub relevant_info: &'a str,
    /// Recent turns, possibly empty.
    pub conversation_context: &'a str,
    /// The user's question, verbatim.
    pub question: &'a str,
    /// The knowledge base was rebuilt during this call.
    pub self_healed: bool,
}

/// Static description of the listener.
///
/// Lists the name, top genres with counts, top artists, top tracks and
/// library counts. Never includes the account id.
#[must_use]
pub fn profile_summary(snapshot: &ProfileSnapshot, limits: &DocumentConfig) -> String {
    let genres = rank_top_artist_genres(snapshot)
        .into_iter()
        .take(limits.summary_top_genres)
        .map(|(genre, count)| format!("{genre} ({count})"))
        .collect::<Vec<_>>();
    let artists = snapshot
        .top_artists
        .iter()
        .take(limits.summary_top_artists)
        .map(|artist| artist.name.clone())
        .collect::<Vec<_>>();
    let tracks = snapshot
        .top_tracks
        .iter()
        .take(limits.summary_top_tracks)
        .map(|track| format!("{} by {}", track.name, track.artists_label()))
        .collect::<Vec<_>>();

    let mut out = String::new();
    let _ = writeln!(out, "Name: {}", snapshot.user.display_name);
    let _ = writeln!(out, "Genres: {}", joined_or_unknown(&genres));
    let _ = writeln!(out, "Top artists: {}", joined_or_unknown(&artists));
    let _ = writeln!(out, "Top tracks: {}", joined_or_unknown(&tracks));
    let _ = writeln!(out, "Saved tracks: {}", snapshot.saved_tracks.len());
    let _ = write!(out, "Playlists: {}", snapshot.playlists.len());
    out
}

fn joined_or_unknown(items: &[String]) -> String {
    if items.is_empty() {
        "unknown".to_string()
    } else {
        items.join(", ")
    }
}

/// Retrieved documents, each prefixed by its type.
#[must_use]
pub fn relevant_info(documents: &[RetrievableDocument]) -> String {
    if documents.is_empty() {
        return NO_RELEVANT_INFO.to_string();
    }
    documents
        .iter()
        .map(|document| format!("[{}] {}", document.kind().label(), document.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The last `turns` turns as labeled lines; empty when nothing was said.
#[must_use]
pub fn conversation_context(history: &ConversationHistory, turns: usize) -> String {
    if history.is_empty() || turns == 0 {
        return String::new();
    }
    let mut out = String::from("PREVIOUS CONVERSATION CONTEXT:\n");
    for turn in history.recent(turns) {
        let _ = writeln!(out, "{}: {}", turn.role.label(), turn.text);
    }
    out
}

/// Prompt for a grounded answer.
#[must_use]
pub fn build_ask_prompt(parts: &AskPrompt<'_>) -> String {
    let mut out = String::with_capacity(
        parts.profile_summary.len()
            + parts.relevant_info.len()
            + parts.conversation_context.len()
            + parts.question.len()
            + 512,
    );
    out.push_str(PERSONA);
    out.push_str("\n\n[PROFILE]\n");
    out.push_str(parts.profile_summary);
    out.push_str("\n\n[RELEVANT INFORMATION]\n");
    out.push_str(parts.relevant_info);
    out.push_str("\n\n[CONVERSATION]\n");
    out.push_str(parts.conversation_context);
    out.push_str("\n[QUESTION]\n");
    out.push_str(parts.question);
    out.push_str("\n\n[INSTRUCTIONS]\n");
    out.push_str("- Answer in the language the question is written in.\n");
    out.push_str("- Be direct and helpful; rely on the profile and relevant information.\n");
    out.push_str("- Keep continuity with the previous conversation.\n");
    if parts.self_healed {
        out.push_str(
            "- The music library was just re-indexed; do not mention it unless asked.\n",
        );
    }
    out
}

/// Prompt for a one-off taste analysis.
#[must_use]
pub fn build_analysis_prompt(profile_summary: &str) -> String {
    format!(
        "{PERSONA}\n\nAnalyze this music profile:\n\n{profile_summary}\n\n\
         Provide an analysis that includes:\n\
         - Patterns in musical taste\n\
         - Artists that define their style\n\
         - Suggestions for exploration\n\n\
         Answer in the user's language, directly and helpfully."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::DocumentId;
    use crate::knowledge::document::{DocumentKind, DocumentMetadata};
    use crate::profile::records::UserProfile;
    use crate::testing::sample_snapshot;

    #[test]
    fn test_profile_summary_contents() {
        let snapshot = sample_snapshot("user-1");
        let summary = profile_summary(&snapshot, &DocumentConfig::default());
        assert!(summary.starts_with(&format!("Name: {}", snapshot.user.display_name)));
        assert!(summary.contains(&snapshot.top_artists[0].name));
        assert!(summary.contains(&format!("Saved tracks: {}", snapshot.saved_tracks.len())));
        assert!(!summary.contains("user-1"));
    }

    #[test]
    fn test_profile_summary_caps_tracks_independently() {
        let snapshot = sample_snapshot("user-1");
        let limits = DocumentConfig {
            summary_top_artists: 10,
            summary_top_tracks: 1,
            ..DocumentConfig::default()
        };
        let summary = profile_summary(&snapshot, &limits);
        assert!(summary.contains(&snapshot.top_tracks[0].name));
        assert!(!summary.contains(&snapshot.top_tracks[1].name));
        assert!(summary.contains(&snapshot.top_artists[2].name));
    }

    #[test]
    fn test_profile_summary_for_empty_library() {
        let snapshot = ProfileSnapshot::new(UserProfile {
            id: "u".to_string(),
            display_name: "Kim".to_string(),
        });
        let summary = profile_summary(&snapshot, &DocumentConfig::default());
        assert!(summary.contains("Genres: unknown"));
        assert!(summary.contains("Playlists: 0"));
    }

    #[test]
    fn test_relevant_info_prefixes_type() {
        let document = RetrievableDocument {
            id: DocumentId::random(),
            content: "ARTIST: Björk".to_string(),
            metadata: DocumentMetadata::new(DocumentKind::Artist, "u"),
        };
        assert_eq!(relevant_info(&[document]), "[ARTIST] ARTIST: Björk");
        assert_eq!(relevant_info(&[]), NO_RELEVANT_INFO);
    }

    #[test]
    fn test_conversation_context_uses_last_turns() {
        let mut history = ConversationHistory::default();
        assert_eq!(conversation_context(&history, 6), "");
        for i in 0..4 {
            history.record_exchange(format!("q{i}"), format!("a{i}"));
        }
        let context = conversation_context(&history, 6);
        assert!(!context.contains("q0"));
        assert!(context.contains("User: q1\nChatify: a1\n"));
        assert!(context.ends_with("Chatify: a3\n"));
    }

    #[test]
    fn test_ask_prompt_sections() {
        let prompt = build_ask_prompt(&AskPrompt {
            profile_summary: "Name: Ana",
            relevant_info: NO_RELEVANT_INFO,
            conversation_context: "",
            question: "¿Qué escucho más?",
            self_healed: true,
        });
        let profile = prompt.find("[PROFILE]").unwrap();
        let info = prompt.find("[RELEVANT INFORMATION]").unwrap();
        let question = prompt.find("¿Qué escucho más?").unwrap();
        assert!(profile < info && info < question);
        assert!(prompt.contains("re-indexed"));
    }

    #[test]
    fn test_analysis_prompt_embeds_summary() {
        let prompt = build_analysis_prompt("Name: Ana\nGenres: rock (2)");
        assert!(prompt.contains("Genres: rock (2)"));
        assert!(prompt.contains("Suggestions for exploration"));
    }
}
