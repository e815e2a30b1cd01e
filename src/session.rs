use crate::chunking::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::document::{extract_pdf_text, SourceDocument};
use crate::error::{Result, TutorError};
use crate::index::RetrievalIndex;
use anyhow::Context;
use log::{debug, info};
use serde::Serialize;
use std::env;

/// Number of chunks handed to the model when answering a question
pub const DEFAULT_CONTEXT_CHUNKS: usize = 2;

/// Configuration for chunking and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub context_chunks: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            context_chunks: DEFAULT_CONTEXT_CHUNKS,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration from environment variables, falling back to defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = SessionConfig::default();

        Ok(SessionConfig {
            chunk_size: env_usize("PDF_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: env_usize("PDF_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            context_chunks: env_usize("PDF_CONTEXT_CHUNKS", defaults.context_chunks)?,
        })
    }

    pub fn chunker(&self) -> Chunker {
        Chunker::new(self.chunk_size, self.chunk_overlap)
    }
}

fn env_usize(key: &str, default: usize) -> anyhow::Result<usize> {
    match env::var(key) {
        Ok(value) => parse_usize(key, &value),
        Err(_) => Ok(default),
    }
}

fn parse_usize(key: &str, value: &str) -> anyhow::Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))
}

/// Read-only view of the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub loaded: bool,
    pub chunk_count: usize,
    /// Name of the loaded document, when it came from a named source
    pub document: Option<String>,
}

/// A retrieved chunk with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub index: usize,
    pub chunk_text: String,
    pub score: f64,
}

/// Chunks and the index built from exactly those chunks
#[derive(Debug)]
struct LoadedDocument {
    name: Option<String>,
    chunks: Vec<String>,
    index: RetrievalIndex,
}

impl LoadedDocument {
    /// Build the index for `chunks`; `None` when there is nothing to index
    fn build(name: Option<String>, chunks: Vec<String>) -> Option<Self> {
        if chunks.is_empty() {
            return None;
        }

        let mut index = RetrievalIndex::new();
        index.build(&chunks);

        Some(LoadedDocument {
            name,
            chunks,
            index,
        })
    }
}

#[derive(Debug, Default)]
enum SessionState {
    #[default]
    Empty,
    Ready(LoadedDocument),
}

/// The single live document: its chunks and retrieval index.
///
/// Loading a document replaces the previous one wholesale. A failed load
/// leaves the previous document in place.
#[derive(Debug)]
pub struct DocumentSession {
    chunker: Chunker,
    state: SessionState,
}

impl Default for DocumentSession {
    fn default() -> Self {
        DocumentSession::new(Chunker::default())
    }
}

impl DocumentSession {
    /// Create an empty session
    pub fn new(chunker: Chunker) -> Self {
        DocumentSession {
            chunker,
            state: SessionState::Empty,
        }
    }

    /// Extract text from PDF bytes and load it, returning the chunk count
    pub fn upload(&mut self, bytes: &[u8]) -> Result<usize> {
        let text = extract_pdf_text(bytes)?;
        Ok(self.load_text(None, &text))
    }

    /// Extract a source document of any supported kind and load it
    pub fn load_document(&mut self, document: &SourceDocument) -> Result<usize> {
        let text = document.extract_text()?;
        Ok(self.load_text(Some(document.name.clone()), &text))
    }

    /// Chunk and index already-extracted text, replacing the current document
    pub fn load_text(&mut self, name: Option<String>, text: &str) -> usize {
        let chunks = self.chunker.split(text);
        let chunk_count = chunks.len();

        self.state = match LoadedDocument::build(name, chunks) {
            Some(document) => SessionState::Ready(document),
            None => SessionState::Empty,
        };

        info!("Split into {} chunks", chunk_count);
        chunk_count
    }

    /// Rank the loaded chunks against `text`.
    ///
    /// Fails with `NotReady` when no document is loaded and with `NoMatch`
    /// when no chunk shares a term with the query.
    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let SessionState::Ready(document) = &self.state else {
            return Err(TutorError::NotReady);
        };

        let hits = document.index.query(text, top_k);
        debug!("Query matched {} of {} chunks", hits.len(), document.chunks.len());

        if hits.iter().all(|hit| hit.score <= 0.0) {
            return Err(TutorError::NoMatch);
        }

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                index: hit.index,
                chunk_text: document.chunks[hit.index].clone(),
                score: hit.score,
            })
            .collect())
    }

    /// Discard the current document
    pub fn clear(&mut self) {
        self.state = SessionState::Empty;
    }

    pub fn status(&self) -> SessionStatus {
        match &self.state {
            SessionState::Empty => SessionStatus {
                loaded: false,
                chunk_count: 0,
                document: None,
            },
            SessionState::Ready(document) => SessionStatus {
                loaded: true,
                chunk_count: document.chunks.len(),
                document: document.name.clone(),
            },
        }
    }
}
