use crate::models::*;
use anyhow::{anyhow, Result};
use rayon::prelude::*;
use std::collections::VecDeque;
use uuid::Uuid;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text on paragraph, line, word and finally character boundaries so that every
/// chunk stays within `chunk_size` characters, with up to `chunk_overlap` characters shared
/// between neighbours.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(anyhow!("chunk_size must be greater than zero"));
        }
        if chunk_overlap >= chunk_size {
            return Err(anyhow!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            ));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    pub fn split_documents(&self, documents: &[Document]) -> Vec<DocumentChunk> {
        let chunks: Vec<DocumentChunk> = documents
            .par_iter()
            .flat_map_iter(|document| self.split_document(document))
            .collect();

        log::info!("Split into {} text chunks.", chunks.len());
        chunks
    }

    fn split_document(&self, document: &Document) -> Vec<DocumentChunk> {
        let text = document.content.as_str();
        let mut chunks = Vec::new();
        let mut previous_start: Option<usize> = None;

        for content in self.split_text(text) {
            let search_from = match previous_start {
                Some(start) => text[start..]
                    .chars()
                    .next()
                    .map(|c| start + c.len_utf8())
                    .unwrap_or(start),
                None => 0,
            };

            let byte_start = text[search_from..]
                .find(content.as_str())
                .map(|offset| search_from + offset)
                .or_else(|| text.find(content.as_str()))
                .unwrap_or_else(|| previous_start.unwrap_or(0));
            previous_start = Some(byte_start);

            let start_index = text[..byte_start].chars().count();
            let end_index = start_index + content.chars().count();

            chunks.push(DocumentChunk {
                id: Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                source: document.source.clone(),
                page: document.page,
                file_id: document.file_id.clone(),
                content,
                start_index,
                end_index,
                embedding: None,
            });
        }

        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good_splits: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(piece.to_string());
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// Greedily packs small pieces into windows. Separators are already attached to the
    /// pieces, so windows are plain concatenations.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    log::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(doc) = join_window(&current) {
                        docs.push(doc);
                    }

                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match current.pop_front() {
                            Some(first) => total -= char_len(first),
                            None => break,
                        }
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_window(&current) {
            docs.push(doc);
        }

        docs
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_window(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Splits on `separator`, attaching each separator to the start of the piece after it.
/// An empty separator splits into single characters. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[last..idx]);
        last = idx;
    }
    pieces.push(&text[last..]);

    pieces.into_iter().filter(|piece| !piece.is_empty()).collect()
}
