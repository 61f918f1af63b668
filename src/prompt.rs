//! Prompt assembly for the answer pipeline.
//!
//! Retrieved context and web findings are kept in clearly separated blocks
//! so the model can attribute what it cites.

use serde::{Deserialize, Serialize};

use crate::search::WebSearchResult;

const MAX_CONTEXT_CHUNKS: usize = 5;
const MAX_WEB_RESULTS: usize = 5;
const WEB_SNIPPET_CHARS: usize = 160;

/// Concise answers in a few sentences, or step-by-step detail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Concise,
    Detailed,
}

pub fn build_system_prompt(use_case: &str) -> String {
    format!(
        "You are ShipAssist, a helpful agent for shipment tracking and warranty support. \
         Be accurate, cite sources when given, and clearly separate retrieved context \
         from web findings. Use case focus: {}.",
        use_case
    )
}

pub fn build_user_prompt(
    question: &str,
    rag_chunks: &[String],
    web_hits: &[WebSearchResult],
    mode: ResponseMode,
) -> String {
    let mut context = String::new();

    if !rag_chunks.is_empty() {
        context.push_str("Retrieved Context:\n");
        let chunks: Vec<&str> = rag_chunks
            .iter()
            .take(MAX_CONTEXT_CHUNKS)
            .map(|c| c.as_str())
            .collect();
        context.push_str(&chunks.join("\n---\n"));
        context.push_str("\n\n");
    }

    if !web_hits.is_empty() {
        context.push_str("Web Search Results:\n");
        for hit in web_hits.iter().take(MAX_WEB_RESULTS) {
            let snippet: String = hit.snippet.chars().take(WEB_SNIPPET_CHARS).collect();
            context.push_str(&format!("- {} | {} | {}\n", hit.title, hit.link, snippet));
        }
        context.push_str("\n");
    }

    let instructions = match mode {
        ResponseMode::Concise => "Answer concisely in 3-5 sentences.",
        ResponseMode::Detailed => {
            "Give a detailed, step-by-step answer. Include assumptions and next actions."
        }
    };

    format!(
        "{}User Question:\n{}\n\nInstructions:\n{}\n",
        context, question, instructions
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str) -> WebSearchResult {
        WebSearchResult {
            title: title.to_string(),
            link: format!("https://example.com/{}", title),
            snippet: "snippet text".to_string(),
        }
    }

    #[test]
    fn system_prompt_carries_the_use_case() {
        let prompt = build_system_prompt("Warranty Support");
        assert!(prompt.contains("Use case focus: Warranty Support."));
    }

    #[test]
    fn user_prompt_separates_context_and_web_blocks() {
        let chunks = vec!["chunk one".to_string(), "chunk two".to_string()];
        let hits = vec![hit("delays")];

        let prompt = build_user_prompt("where is my parcel", &chunks, &hits, ResponseMode::Concise);

        assert!(prompt.contains("Retrieved Context:\nchunk one\n---\nchunk two"));
        assert!(prompt.contains("Web Search Results:\n- delays | https://example.com/delays"));
        assert!(prompt.contains("User Question:\nwhere is my parcel"));
        assert!(prompt.contains("Answer concisely"));
    }

    #[test]
    fn user_prompt_omits_empty_blocks_and_caps_counts() {
        let prompt = build_user_prompt("question", &[], &[], ResponseMode::Detailed);
        assert!(!prompt.contains("Retrieved Context"));
        assert!(!prompt.contains("Web Search Results"));
        assert!(prompt.contains("step-by-step"));

        let many: Vec<String> = (0..10).map(|i| format!("chunk {}", i)).collect();
        let prompt = build_user_prompt("question", &many, &[], ResponseMode::Concise);
        assert!(prompt.contains("chunk 4"));
        assert!(!prompt.contains("chunk 5"));
    }

    #[test]
    fn response_mode_deserializes_from_lowercase() {
        let mode: ResponseMode = serde_json::from_str("\"detailed\"").unwrap();
        assert_eq!(mode, ResponseMode::Detailed);
        assert_eq!(ResponseMode::default(), ResponseMode::Concise);
    }
}
