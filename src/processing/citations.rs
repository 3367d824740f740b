//! Sentence-level source attribution for generated answers.
//!
//! Each answer sentence is credited to the retrieved chunk it is most similar to in embedding
//! space. This shows which source best matches a sentence; it does not verify the sentence.

use crate::embedding::{EmbeddingClientError, SharedEmbedder};
use crate::index::distance::cosine_similarity;

use super::types::{DocumentChunk, SourceRef};

/// One answer sentence and the source credited for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitedSentence {
    /// Sentence text including its terminal punctuation.
    pub text: String,
    /// Best-matching source, `None` when no sources were retrieved.
    pub citation: Option<SourceRef>,
}

/// An answer broken into attributed sentences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitedAnswer {
    /// Sentences in answer order.
    pub sentences: Vec<CitedSentence>,
}

impl CitedAnswer {
    /// Render as Markdown: every sentence followed by its source marker, blank-line separated.
    pub fn render(&self) -> String {
        self.sentences
            .iter()
            .map(|sentence| match &sentence.citation {
                Some(source) => format!("{}\n\n*({source})*", sentence.text),
                None => sentence.text.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Split after `.`, `!` or `?` when followed by whitespace; empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_offset, next)) = chars.peek() else {
            continue;
        };
        if next.is_whitespace() {
            sentences.push(&text[start..next_offset]);
            start = next_offset;
        }
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .map(str::to_string)
        .collect()
}

/// Credits answer sentences to retrieved chunks by cosine similarity.
#[derive(Clone)]
pub struct CitationAttributor {
    embedder: SharedEmbedder,
}

impl CitationAttributor {
    /// Create an attributor using `embedder` for sentences and sources.
    pub fn new(embedder: SharedEmbedder) -> Self {
        Self { embedder }
    }

    /// Attribute every sentence of `answer` to one of `sources`.
    ///
    /// A single source is cited for every sentence without any embedding call. Otherwise all
    /// sentences and sources are embedded in one batch and ties resolve to the earliest source.
    pub async fn attribute(
        &self,
        answer: &str,
        sources: &[DocumentChunk],
    ) -> Result<CitedAnswer, EmbeddingClientError> {
        let sentences = split_sentences(answer);

        let citations: Vec<Option<SourceRef>> = match sources {
            [] => vec![None; sentences.len()],
            [only] => vec![Some(only.source_ref()); sentences.len()],
            _ if sentences.is_empty() => Vec::new(),
            _ => {
                let mut texts = sentences.clone();
                texts.extend(sources.iter().map(|chunk| chunk.text.clone()));
                let mut vectors = self.embedder.generate_embeddings(texts).await?;
                if vectors.len() != sentences.len() + sources.len() {
                    return Err(EmbeddingClientError::InvalidResponse(format!(
                        "expected {} embeddings, received {}",
                        sentences.len() + sources.len(),
                        vectors.len()
                    )));
                }
                let source_vectors = vectors.split_off(sentences.len());
                vectors
                    .iter()
                    .map(|sentence| {
                        let best = best_match(sentence, &source_vectors);
                        Some(sources[best].source_ref())
                    })
                    .collect()
            }
        };

        Ok(CitedAnswer {
            sentences: sentences
                .into_iter()
                .zip(citations)
                .map(|(text, citation)| CitedSentence { text, citation })
                .collect(),
        })
    }
}

/// Index of the most similar candidate; the first wins ties.
fn best_match(query: &[f32], candidates: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (idx, candidate) in candidates.iter().enumerate() {
        let score = cosine_similarity(query, candidate);
        if score > best_score {
            best = idx;
            best_score = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClient;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps texts onto axes by keyword and counts calls.
    #[derive(Default)]
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for KeywordEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    vec![
                        if lower.contains("budget") { 1.0 } else { 0.0 },
                        if lower.contains("timeline") { 1.0 } else { 0.0 },
                        0.1,
                    ]
                })
                .collect())
        }
    }

    fn chunk(text: &str, source: &str, page: Option<u32>) -> DocumentChunk {
        DocumentChunk {
            text: text.into(),
            source_filename: source.into(),
            page_number: page,
        }
    }

    #[test]
    fn splits_on_terminal_punctuation_followed_by_whitespace() {
        assert_eq!(
            split_sentences("First one. Second!  Third? v1.2 stays.\nLast"),
            vec!["First one.", "Second!", "Third?", "v1.2 stays.", "Last"]
        );
        assert!(split_sentences("   ").is_empty());
        assert_eq!(split_sentences("No punctuation"), vec!["No punctuation"]);
    }

    #[tokio::test]
    async fn single_source_is_always_cited_without_embedding() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let attributor = CitationAttributor::new(embedder.clone());
        let cited = attributor
            .attribute(
                "The budget is $4M. The timeline is Q3.",
                &[chunk("Budget: $4M", "plan.pdf", Some(2))],
            )
            .await
            .expect("cited");

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cited.sentences.len(), 2);
        assert!(cited.sentences.iter().all(|s| {
            s.citation
                == Some(SourceRef {
                    source: "plan.pdf".into(),
                    page: Some(2),
                })
        }));
    }

    #[tokio::test]
    async fn sentences_cite_most_similar_source_in_one_call() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let attributor = CitationAttributor::new(embedder.clone());
        let sources = [
            chunk("The timeline ends in Q3.", "plan.pdf", Some(1)),
            chunk("The budget is capped.", "finance.pdf", Some(7)),
        ];
        let cited = attributor
            .attribute("Budget is $4M. Timeline is Q3.", &sources)
            .await
            .expect("cited");

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cited.render(),
            "Budget is $4M.\n\n*(Source: finance.pdf · Page 7)*\n\n\
             Timeline is Q3.\n\n*(Source: plan.pdf · Page 1)*"
        );
    }

    #[tokio::test]
    async fn ties_go_to_the_earliest_source() {
        let attributor = CitationAttributor::new(Arc::new(KeywordEmbedder::default()));
        let sources = [
            chunk("alpha", "first.txt", None),
            chunk("beta", "second.txt", None),
        ];
        let cited = attributor
            .attribute("Unrelated sentence.", &sources)
            .await
            .expect("cited");
        assert_eq!(cited.render(), "Unrelated sentence.\n\n*(Source: first.txt · Page N/A)*");
    }

    #[tokio::test]
    async fn no_sources_leaves_sentences_uncited() {
        let attributor = CitationAttributor::new(Arc::new(KeywordEmbedder::default()));
        let cited = attributor.attribute("I don't know. Sorry.", &[]).await.expect("cited");
        assert_eq!(cited.render(), "I don't know.\n\nSorry.");
    }
}
