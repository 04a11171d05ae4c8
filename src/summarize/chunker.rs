//! Token-aware recursive text splitting.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;

use super::tokens::TokenOracle;
use crate::{Result, SummarizerError};

/// Separators tried in order of preference: paragraphs, lines, sentences, words.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// One token-bounded piece of the input, 0-based index in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
struct Budget {
    max: usize,
    overlap: usize,
}

/// Splits text into chunks of at most `max_tokens` tokens, sharing roughly
/// `overlap_tokens` tokens between neighbours.
///
/// Natural boundaries are preferred; token slicing is the last resort when a
/// single piece without separators is still over budget.
pub struct Chunker {
    oracle: Arc<dyn TokenOracle>,
}

impl Chunker {
    pub fn new(oracle: Arc<dyn TokenOracle>) -> Self {
        Self { oracle }
    }

    pub fn split(
        &self,
        text: &str,
        max_tokens: usize,
        overlap_tokens: usize,
    ) -> Result<Vec<TextChunk>> {
        if max_tokens <= overlap_tokens {
            return Err(SummarizerError::Validation(format!(
                "Chunk size ({} tokens) must be greater than chunk overlap ({} tokens)",
                max_tokens, overlap_tokens
            )));
        }

        if text.is_empty() {
            return Ok(Vec::new());
        }

        let budget = Budget {
            max: max_tokens,
            overlap: overlap_tokens,
        };

        let mut pieces = Vec::new();
        self.split_recursive(text, SEPARATORS, budget, &mut pieces)?;

        // Merged chunks are sized by summed piece counts; re-check against the real count
        let mut bounded = Vec::with_capacity(pieces.len());
        for piece in pieces {
            if self.oracle.count(&piece)? > budget.max {
                bounded.extend(self.slice_by_tokens(&piece, budget)?);
            } else {
                bounded.push(piece);
            }
        }

        Ok(bounded
            .iter()
            .map(|piece| piece.trim())
            .filter(|piece| !piece.is_empty())
            .enumerate()
            .map(|(index, text)| TextChunk {
                index,
                text: text.to_string(),
            })
            .collect())
    }

    fn split_recursive(
        &self,
        text: &str,
        separators: &[&str],
        budget: Budget,
        out: &mut Vec<String>,
    ) -> Result<()> {
        let Some(position) = separators.iter().position(|sep| text.contains(sep)) else {
            if self.oracle.count(text)? <= budget.max {
                out.push(text.to_string());
            } else {
                out.extend(self.slice_by_tokens(text, budget)?);
            }
            return Ok(());
        };

        let separator = separators[position];
        let finer = &separators[position + 1..];

        let mut fitting: Vec<(&str, usize)> = Vec::new();
        for piece in text.split_inclusive(separator).filter(|p| !p.is_empty()) {
            let count = self.oracle.count(piece)?;
            if count <= budget.max {
                fitting.push((piece, count));
                continue;
            }

            if !fitting.is_empty() {
                out.extend(merge_pieces(&fitting, budget));
                fitting.clear();
            }

            if finer.is_empty() {
                out.extend(self.slice_by_tokens(piece, budget)?);
            } else {
                self.split_recursive(piece, finer, budget, out)?;
            }
        }

        if !fitting.is_empty() {
            out.extend(merge_pieces(&fitting, budget));
        }

        Ok(())
    }

    /// Fixed windows over the token sequence, each advancing by `max - overlap`
    fn slice_by_tokens(&self, text: &str, budget: Budget) -> Result<Vec<String>> {
        let spans = self.oracle.encode(text)?;
        if spans.is_empty() {
            return Ok(vec![text.to_string()]);
        }

        let mut slices = Vec::new();
        let mut start = 0;
        loop {
            let mut end = (start + budget.max).min(spans.len());
            let mut slice = span_text(text, &spans[start..end]);

            // Re-encoding a slice can yield more tokens than the window it came from
            while end > start + 1 && self.oracle.count(slice)? > budget.max {
                end -= 1;
                slice = span_text(text, &spans[start..end]);
            }

            slices.push(slice.to_string());
            if end >= spans.len() {
                break;
            }

            let width = end - start;
            start += if width > budget.overlap {
                width - budget.overlap
            } else {
                1
            };
        }

        Ok(slices)
    }
}

/// Greedily pack fitting pieces into chunks, carrying a tail of at most
/// `overlap` tokens into the next chunk.
fn merge_pieces(pieces: &[(&str, usize)], budget: Budget) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0;

    for &(piece, count) in pieces {
        if total + count > budget.max && !current.is_empty() {
            chunks.push(concat(&current));

            while total > budget.overlap || (total + count > budget.max && total > 0) {
                match current.pop_front() {
                    Some((_, dropped)) => total -= dropped,
                    None => break,
                }
            }
        }

        current.push_back((piece, count));
        total += count;
    }

    if !current.is_empty() {
        chunks.push(concat(&current));
    }

    chunks
}

fn concat(pieces: &VecDeque<(&str, usize)>) -> String {
    pieces.iter().map(|(piece, _)| *piece).collect()
}

/// Source text covered by a run of token spans, widened to char boundaries
fn span_text<'a>(text: &'a str, spans: &[Range<usize>]) -> &'a str {
    let mut start = spans.iter().map(|s| s.start).min().unwrap_or(0).min(text.len());
    let mut end = spans
        .iter()
        .map(|s| s.end)
        .max()
        .unwrap_or(text.len())
        .min(text.len());

    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }

    &text[start..end.max(start)]
}
