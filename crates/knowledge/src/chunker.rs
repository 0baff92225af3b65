//! Overlapping text windows sized for embedding.
//!
//! Sizes are counted in characters. A window is cut at the last paragraph
//! break it contains, else a line break, else a sentence end, else a comma,
//! else a space, else at the hard limit. The next window starts exactly
//! `overlap` characters before the previous cut, and chunk text is never
//! trimmed, so the body can be reassembled from the chunks.
//!
//! `text_splitter::ChunkConfig::with_overlap` treats overlap as an upper
//! bound and snaps it to semantic boundaries, so the shared span between
//! neighbours varies. That is why the windows are cut here directly.

use crate::document::{Document, Metadata};
use umrah_core::{AppError, AppResult, RetrievalSettings};

/// Cut preferences, most preferred first.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[","], &[" "]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl From<&RetrievalSettings> for ChunkConfig {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            overlap: settings.chunk_overlap,
        }
    }
}

/// A text window of a document, carrying the document's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Zero-based index within the parent document.
    pub position: usize,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    /// # Errors
    /// `AppError::Config` if `chunk_size` is zero or `overlap >= chunk_size`.
    pub fn new(config: ChunkConfig) -> AppResult<Self> {
        if config.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be positive".to_string()));
        }
        if config.overlap >= config.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    /// Lazily split `doc`. Call again to restart from the beginning.
    pub fn chunks<'a>(&self, doc: &'a Document) -> ChunkIter<'a> {
        let body = doc.body();
        let mut offsets: Vec<usize> = body.char_indices().map(|(i, _)| i).collect();
        offsets.push(body.len());

        ChunkIter {
            doc,
            offsets,
            config: self.config,
            start: 0,
            position: 0,
            done: false,
        }
    }
}

pub struct ChunkIter<'a> {
    doc: &'a Document,
    /// Byte offset of every char, plus the body length.
    offsets: Vec<usize>,
    config: ChunkConfig,
    /// Char index where the next window begins.
    start: usize,
    position: usize,
    done: bool,
}

impl ChunkIter<'_> {
    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// End (exclusive char index) of the window beginning at `self.start`,
    /// when the remaining text is longer than one window.
    fn cut_point(&self) -> usize {
        let body = self.doc.body();
        let limit = self.start + self.config.chunk_size;
        let min_end = self.start + self.config.overlap;
        let window_start = self.offsets[self.start];
        let window = &body[window_start..self.offsets[limit]];

        for group in SEPARATORS {
            let best = group
                .iter()
                .filter_map(|sep| window.rfind(sep).map(|at| at + sep.len()))
                .max();
            if let Some(byte_end) = best {
                let end = self
                    .offsets
                    .binary_search(&(window_start + byte_end))
                    .unwrap_or_else(|i| i);
                if end > min_end {
                    return end;
                }
            }
        }

        limit
    }
}

impl Iterator for ChunkIter<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let total = self.char_count();
        let end = if total - self.start <= self.config.chunk_size {
            self.done = true;
            total
        } else {
            self.cut_point()
        };

        let text = self.doc.body()[self.offsets[self.start]..self.offsets[end]].to_string();
        let chunk = Chunk {
            text,
            position: self.position,
            metadata: self.doc.metadata().clone(),
        };

        self.position += 1;
        if !self.done {
            self.start = end - self.config.overlap;
        }

        Some(chunk)
    }
}

impl std::iter::FusedIterator for ChunkIter<'_> {}
