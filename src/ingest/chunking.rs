//! Character-budget chunking for CV text and knowledge documents.
//!
//! Splitting happens in three passes:
//!
//! 1. `semchunk-rs` splits semantically (paragraphs, lines, sentences, whitespace) against a base
//!    budget of `chunk_size - overlap` characters.
//! 2. Any base chunk still over that budget is re-split on whitespace, or hard-cut when a single
//!    word is longer than the budget. `semchunk-rs` re-joins pieces with separators it does not
//!    count, so this pass is what actually enforces the limit.
//! 3. Each chunk after the first is prefixed with whole words from the end of the previous base
//!    chunk. The carried tail is shrunk to fit; the current chunk is never trimmed, so the base
//!    chunks together always contain every word of the source in order.

use semchunk_rs::Chunker;
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Caller configured an impossible chunk budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Split `text` into ordered chunks of at most `chunk_size` characters with up to `overlap`
/// characters of carry-over between neighbours.
///
/// Returns an empty vector when the input is all whitespace.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let overlap = overlap.min(chunk_size - 1);
    let base = base_chunks(text, chunk_size - overlap);
    Ok(apply_overlap(base, chunk_size, overlap))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Semantic split followed by the hard cap; every returned chunk fits `budget`.
fn base_chunks(text: &str, budget: usize) -> Vec<String> {
    let chunker = Chunker::new(budget, Box::new(char_len));
    chunker
        .chunk(text)
        .into_iter()
        .flat_map(|chunk| split_to_budget(&chunk, budget))
        .collect()
}

/// Re-split `chunk` so no piece exceeds `budget` characters, cutting at the last whitespace that
/// fits and falling back to a hard cut inside an oversized word.
fn split_to_budget(chunk: &str, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = chunk.trim();

    while char_len(remaining) > budget {
        let Some((limit, _)) = remaining.char_indices().nth(budget) else {
            break;
        };
        let at_boundary = remaining[limit..].starts_with(char::is_whitespace);
        let cut = if at_boundary {
            limit
        } else {
            match remaining[..limit].rfind(char::is_whitespace) {
                Some(index) if index > 0 => index,
                _ => limit,
            }
        };
        pieces.push(remaining[..cut].trim_end().to_string());
        remaining = remaining[cut..].trim_start();
    }

    if !remaining.is_empty() {
        pieces.push(remaining.to_string());
    }
    pieces
}

fn apply_overlap(chunks: Vec<String>, chunk_size: usize, overlap: usize) -> Vec<String> {
    if overlap == 0 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    for (index, current) in chunks.iter().enumerate() {
        let Some(previous) = index.checked_sub(1).map(|prev| chunks[prev].as_str()) else {
            overlapped.push(current.clone());
            continue;
        };
        // One character of the room goes to the joining space.
        let room = chunk_size.saturating_sub(char_len(current));
        let tail = word_tail(previous, overlap.min(room).saturating_sub(1));
        if tail.is_empty() {
            overlapped.push(current.clone());
        } else {
            overlapped.push(format!("{tail} {current}"));
        }
    }
    overlapped
}

/// Longest run of whole words at the end of `text` that fits in `limit` characters.
fn word_tail(text: &str, limit: usize) -> &str {
    let text = text.trim_end();
    if limit == 0 {
        return "";
    }
    let total = char_len(text);
    if total <= limit {
        return text.trim_start();
    }

    let Some((start, _)) = text.char_indices().nth(total - limit) else {
        return "";
    };
    let candidate = &text[start..];
    let on_boundary = text[..start].ends_with(char::is_whitespace);
    if on_boundary {
        return candidate.trim_start();
    }
    match candidate.find(char::is_whitespace) {
        Some(index) => candidate[index..].trim_start(),
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words<S: AsRef<str>>(chunks: &[S]) -> Vec<String> {
        chunks
            .iter()
            .flat_map(|chunk| {
                chunk
                    .as_ref()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn resume_text(paragraphs: usize) -> String {
        let paragraph = "Designed distributed ingestion services in Rust and Python. \
            Led a team of four engineers through two product launches. \
            Reduced infrastructure spend by thirty percent.";
        vec![paragraph; paragraphs].join("\n\n")
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let error = chunk_text("hello", 0, 0).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn whitespace_only_input_yields_no_chunks() {
        assert!(chunk_text("  \n\t ", 500, 50).expect("chunks").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("5 years Python, led team of 4", 500, 50).expect("chunks");
        assert_eq!(chunks, vec!["5 years Python, led team of 4"]);
    }

    #[test]
    fn chunks_never_exceed_budget_and_preserve_word_order() {
        let text = resume_text(12);

        let chunks = chunk_text(&text, 500, 0).expect("chunks");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500, "chunk too long: {}", chunk.len());
        }
        assert_eq!(words(&chunks), words(&[text.as_str()]));
    }

    #[test]
    fn default_budget_with_overlap_keeps_limit_and_every_word() {
        let text = resume_text(20);

        let chunks = chunk_text(&text, 500, 50).expect("chunks");
        let base = base_chunks(&text, 450);
        assert_eq!(chunks.len(), base.len());
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500, "chunk too long: {chunk:?}");
        }
        for (chunk, base_chunk) in chunks.iter().zip(&base) {
            assert!(base_chunk.chars().count() <= 450);
            assert!(chunk.ends_with(base_chunk.as_str()), "{chunk:?} lost source text");
        }
        assert_eq!(words(&base), words(&[text.as_str()]));
        assert!(chunks[0].starts_with("Designed"));
        for index in 1..chunks.len() {
            let carried = chunks[index][..chunks[index].len() - base[index].len()].trim();
            assert!(carried.chars().count() <= 50, "overlap too long: {carried:?}");
            assert!(
                base[index - 1].ends_with(carried),
                "{carried:?} is not a whole-word tail of the previous chunk"
            );
        }
    }

    #[test]
    fn oversized_pieces_are_split_on_whitespace() {
        let pieces = split_to_budget("alpha beta gamma delta", 11);
        assert_eq!(pieces, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn words_longer_than_budget_are_hard_cut() {
        let pieces = split_to_budget("abcdefghij klm", 4);
        assert_eq!(pieces, vec!["abcd", "efgh", "ij", "klm"]);
    }

    #[test]
    fn tail_keeps_whole_words_only() {
        assert_eq!(word_tail("led a team of four", 9), "of four");
        assert_eq!(word_tail("led a team of four", 7), "of four");
        assert_eq!(word_tail("led a team of four", 6), "four");
        assert_eq!(word_tail("supercalifragilistic", 5), "");
        assert_eq!(word_tail("short", 0), "");
    }

    #[test]
    fn overlap_repeats_previous_tail_within_budget() {
        let text = "aa bb cc dd ee ff gg hh ii jj kk ll mm nn";
        let chunks = chunk_text(text, 20, 8).expect("chunks");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20, "chunk too long: {chunk:?}");
        }
        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().expect("first word");
            assert!(
                pair[0].split_whitespace().any(|word| word == first_word),
                "{:?} does not start with a tail of {:?}",
                pair[1],
                pair[0]
            );
        }
        assert!(chunks.last().expect("last").ends_with("nn"));
    }

    #[test]
    fn multibyte_text_is_counted_in_characters() {
        let text = "éé ".repeat(20);
        let chunks = chunk_text(&text, 10, 2).expect("chunks");
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
    }
}
