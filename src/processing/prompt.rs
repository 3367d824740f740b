//! Grounded prompt assembly.

use super::types::{DocumentChunk, ResponseStyle};

/// What the retrieved context represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptScope {
    /// Chunks come from the whole knowledge base.
    KnowledgeBase,
    /// Chunks come from a single named document.
    Document(String),
}

impl ResponseStyle {
    /// Label used in prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Concise => "Concise",
            Self::Detailed => "Detailed",
            Self::Technical => "Technical",
            Self::ExecutiveSummary => "Executive Summary",
        }
    }

    fn guidance(self) -> &'static str {
        match self {
            Self::Concise => "Answer in a few direct sentences.",
            Self::Detailed => "Give a thorough answer that covers every relevant detail in the context.",
            Self::Technical => "Answer precisely and keep the terminology used in the context.",
            Self::ExecutiveSummary => {
                "Summarize the answer for a decision maker: key facts first, then implications."
            }
        }
    }
}

/// Build a prompt that confines the model to `chunks`.
pub fn build_prompt(
    query: &str,
    chunks: &[DocumentChunk],
    style: ResponseStyle,
    scope: &PromptScope,
) -> String {
    let restriction = match scope {
        PromptScope::KnowledgeBase => "Answer using ONLY the context below.".to_string(),
        PromptScope::Document(name) => {
            format!("Answer using ONLY the context below, taken from the document \"{name}\".")
        }
    };
    let context = chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are DocuMind, a document question-answering assistant.\n\
         {restriction}\n\
         If the answer is not in the context, say that you don't know. Do not use outside knowledge.\n\
         Response style: {label}. {guidance}\n\n\
         Context:\n{context}\n\n\
         Question:\n{query}\n",
        label = style.label(),
        guidance = style.guidance(),
    )
}
