//! Character-window and boundary-aware chunking.
//!
//! - Window: consecutive windows of `size` characters advancing by `size - overlap`; the last
//!   windows may be shorter. Window `i` starts at character `i * (size - overlap)`.
//! - Semantic: `semchunk-rs` splits on the strongest available boundary (paragraphs, sentences,
//!   words) so that each piece fits `size - overlap` characters, then each piece is prefixed
//!   with the tail of its predecessor so neighbouring chunks still share context.
//!
//! Sizes are counted in Unicode scalar values, never bytes, so slicing cannot split a character.

use crate::config::{ChunkStrategy, Config};
use crate::extract::PageText;
use semchunk_rs::Chunker;

use super::types::{ChunkingError, DocumentChunk};

/// Chunking parameters resolved from configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingSettings {
    /// Splitting strategy.
    pub strategy: ChunkStrategy,
    /// Maximum characters per chunk.
    pub size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
}

impl ChunkingSettings {
    /// Read chunking parameters from the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            strategy: config.chunk_strategy,
            size: config.chunk_size,
            overlap: config.chunk_overlap,
        }
    }

    /// Split `text` with the configured strategy.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ChunkingError> {
        match self.strategy {
            ChunkStrategy::Window => chunk_windows(text, self.size, self.overlap),
            ChunkStrategy::Semantic => chunk_semantic(text, self.size, self.overlap),
        }
    }
}

fn validate(size: usize, overlap: usize) -> Result<(), ChunkingError> {
    if size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= size {
        return Err(ChunkingError::OverlapTooLarge { overlap, size });
    }
    Ok(())
}

/// Split `text` into fixed character windows.
///
/// Returns an empty vector when the input is all whitespace.
pub fn chunk_windows(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkingError> {
    validate(size, overlap)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let stride = size - overlap;
    Ok((0..chars.len())
        .step_by(stride)
        .map(|start| chars[start..(start + size).min(chars.len())].iter().collect())
        .collect())
}

/// Split `text` on natural boundaries, then carry `overlap` characters between chunks.
///
/// Every returned chunk holds at most `size` characters.
pub fn chunk_semantic(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkingError> {
    validate(size, overlap)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let budget = size - overlap;
    let chunker = Chunker::new(budget, Box::new(|segment: &str| char_len(segment)));
    let pieces = chunker
        .chunk(text)
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .flat_map(|piece| fit_to_budget(&piece, budget))
        .collect();
    Ok(apply_overlap(pieces, size, overlap))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Re-split a piece the boundary splitter left over `budget`, packing whole words greedily.
///
/// A single word longer than `budget` is cut into `budget`-sized runs.
fn fit_to_budget(piece: &str, budget: usize) -> Vec<String> {
    if char_len(piece) <= budget {
        return vec![piece.to_string()];
    }

    let mut packed = Vec::new();
    let mut current = String::new();
    for word in piece.split_whitespace() {
        let needed = if current.is_empty() {
            char_len(word)
        } else {
            char_len(&current) + 1 + char_len(word)
        };
        if needed <= budget {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }

        if !current.is_empty() {
            packed.push(std::mem::take(&mut current));
        }
        if char_len(word) <= budget {
            current.push_str(word);
        } else {
            let chars: Vec<char> = word.chars().collect();
            let mut runs = chars.chunks(budget).map(|run| run.iter().collect::<String>());
            let last = runs.next_back();
            packed.extend(runs);
            current = last.unwrap_or_default();
        }
    }
    if !current.is_empty() {
        packed.push(current);
    }
    packed
}

/// Prefix every chunk after the first with the tail of its predecessor.
///
/// The tail is at most `overlap - 1` characters plus one joining space. The combined chunk is
/// trimmed from the front if it still exceeds `size`.
fn apply_overlap(chunks: Vec<String>, size: usize, overlap: usize) -> Vec<String> {
    if overlap <= 1 || chunks.len() < 2 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut previous: Option<String> = None;
    for current in chunks {
        let combined = match previous.as_deref() {
            Some(prev) => build_overlapped_chunk(prev, &current, overlap - 1, size),
            None => current.clone(),
        };
        overlapped.push(combined);
        previous = Some(current);
    }

    overlapped
}

fn build_overlapped_chunk(previous: &str, current: &str, tail_len: usize, size: usize) -> String {
    let tail = tail_chars(previous, tail_len).trim();
    if tail.is_empty() {
        return trim_to_budget(current, size).to_string();
    }
    let combined = format!("{tail} {current}");
    trim_to_budget(&combined, size).to_string()
}

/// Drop leading characters until `text` fits in `budget` characters.
fn trim_to_budget(text: &str, budget: usize) -> &str {
    if char_len(text) <= budget {
        return text;
    }
    tail_chars(text, budget).trim_start()
}

fn tail_chars(text: &str, count: usize) -> &str {
    let total = char_len(text);
    if total <= count {
        return text;
    }
    let start = text
        .char_indices()
        .nth(total - count)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    &text[start..]
}

/// Chunk every page and attach the source filename and page number.
pub fn chunk_pages(
    pages: &[PageText],
    source_filename: &str,
    settings: &ChunkingSettings,
) -> Result<Vec<DocumentChunk>, ChunkingError> {
    let mut chunks = Vec::new();
    for page in pages {
        for text in settings.chunk(&page.text)? {
            chunks.push(DocumentChunk {
                text,
                source_filename: source_filename.to_string(),
                page_number: page.page_number,
            });
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::sanitize::clean_text;

    #[test]
    fn windows_start_at_multiples_of_stride() {
        let chunks = chunk_windows("abcdefghij", 4, 1).expect("chunks");
        assert_eq!(chunks, vec!["abcd", "defg", "ghij", "j"]);
    }

    #[test]
    fn consecutive_windows_share_exactly_overlap_characters() {
        let text: String = ('a'..='z').cycle().take(257).collect();
        let (size, overlap) = (40, 7);
        let chunks = chunk_windows(&text, size, overlap).expect("chunks");
        let chars: Vec<char> = text.chars().collect();

        for (i, chunk) in chunks.iter().enumerate() {
            let start = i * (size - overlap);
            let expected: String = chars[start..(start + size).min(chars.len())].iter().collect();
            assert_eq!(chunk, &expected);
        }
        for pair in chunks.windows(2) {
            if pair[1].chars().count() < size {
                continue;
            }
            let tail: String = pair[0].chars().skip(size - overlap).collect();
            let head: String = pair[1].chars().take(overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn chunking_is_idempotent() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        assert_eq!(
            chunk_windows(&text, 50, 10).expect("first"),
            chunk_windows(&text, 50, 10).expect("second")
        );
        assert_eq!(
            chunk_semantic(&text, 50, 10).expect("first"),
            chunk_semantic(&text, 50, 10).expect("second")
        );
    }

    #[test]
    fn windows_count_characters_not_bytes() {
        let chunks = chunk_windows("ééééé", 2, 0).expect("chunks");
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn rejects_invalid_sizes() {
        assert!(matches!(
            chunk_windows("text", 0, 0),
            Err(ChunkingError::InvalidChunkSize)
        ));
        assert!(matches!(
            chunk_windows("text", 5, 5),
            Err(ChunkingError::OverlapTooLarge {
                overlap: 5,
                size: 5
            })
        ));
        assert!(matches!(
            chunk_semantic("text", 5, 9),
            Err(ChunkingError::OverlapTooLarge { .. })
        ));
    }

    #[test]
    fn whitespace_input_yields_no_chunks() {
        assert!(chunk_windows("   ", 10, 2).expect("chunks").is_empty());
        assert!(chunk_semantic("\n\n", 10, 2).expect("chunks").is_empty());
    }

    #[test]
    fn semantic_chunks_respect_size_and_keep_words() {
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu.";
        let chunks = chunk_semantic(text, 30, 0).expect("chunks");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30, "oversized chunk: {chunk:?}");
        }
        let words: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(words, original);
    }

    #[test]
    fn semantic_chunks_with_overlap_stay_within_size() {
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu.";
        for (size, overlap) in [(20, 5), (30, 5), (50, 0), (50, 10), (12, 3)] {
            let chunks = chunk_semantic(text, size, overlap).expect("chunks");
            assert!(!chunks.is_empty());
            for chunk in &chunks {
                assert!(
                    chunk.chars().count() <= size,
                    "size={size} overlap={overlap}: oversized chunk {chunk:?}"
                );
            }
            assert!(chunks.last().is_some_and(|last| last.ends_with("mu.")));
        }
    }

    #[test]
    fn oversized_words_are_cut_to_budget() {
        let pieces = fit_to_budget("tiny abcdefghijklmnop end", 6);
        assert_eq!(pieces, vec!["tiny", "abcdef", "ghijkl", "mnop", "end"]);
        assert!(pieces.iter().all(|p| p.chars().count() <= 6));
    }

    #[test]
    fn semantic_overlap_carries_previous_tail() {
        let overlapped = apply_overlap(vec!["first part".into(), "second".into()], 11, 5);
        assert_eq!(overlapped, vec!["first part", "part second"]);
    }

    #[test]
    fn overlapped_chunk_is_trimmed_from_the_front() {
        let overlapped = apply_overlap(vec!["first part".into(), "second".into()], 8, 5);
        assert_eq!(overlapped[1], "t second");
    }

    #[test]
    fn cleaned_pages_split_on_paragraph_breaks() {
        let first = format!("{}Alpha.", "Alpha ".repeat(11));
        let second = format!("{}Beta.", "Beta ".repeat(11));
        let raw = format!("  {first}\n   \n\n{second}  \n");
        let pages = vec![PageText {
            page_number: Some(1),
            text: clean_text(&raw, false),
        }];
        let settings = ChunkingSettings {
            strategy: ChunkStrategy::Semantic,
            size: 100,
            overlap: 0,
        };

        let chunks = chunk_pages(&pages, "notes.pdf", &settings).expect("chunks");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.trim()).collect();
        assert_eq!(texts, vec![first.as_str(), second.as_str()]);
    }

    #[test]
    fn chunk_pages_attaches_origin() {
        let pages = vec![
            PageText {
                page_number: Some(1),
                text: "abcdef".into(),
            },
            PageText {
                page_number: Some(2),
                text: "gh".into(),
            },
        ];
        let settings = ChunkingSettings {
            strategy: ChunkStrategy::Window,
            size: 4,
            overlap: 0,
        };
        let chunks = chunk_pages(&pages, "report.pdf", &settings).expect("chunks");
        let described: Vec<(&str, Option<u32>)> = chunks
            .iter()
            .map(|c| (c.text.as_str(), c.page_number))
            .collect();
        assert_eq!(
            described,
            vec![("abcd", Some(1)), ("ef", Some(1)), ("gh", Some(2))]
        );
        assert!(chunks.iter().all(|c| c.source_filename == "report.pdf"));
    }
}
