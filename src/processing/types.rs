//! Core data types and error definitions for the ingestion pipeline.

use crate::{config::Config, embedding::EmbeddingClientError, store::StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while splitting raw text into chunks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible size budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new text in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({max_size})")]
    OverlapTooLarge {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested maximum chunk size in characters.
        max_size: usize,
    },
}

/// Failure isolated to a single source during a batch ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The source could not be read by the loader.
    #[error("failed to read {source_uri}: {reason}")]
    Unreadable {
        /// Source that failed.
        source_uri: String,
        /// Human readable cause.
        reason: String,
    },
    /// The source used a format no loader handles.
    #[error("unsupported file type for {source_uri}")]
    Unsupported {
        /// Source that was skipped.
        source_uri: String,
    },
    /// Chunking settings rejected the source text.
    #[error("failed to chunk {source_uri}: {error}")]
    Chunking {
        /// Source that failed.
        source_uri: String,
        /// Underlying chunking error.
        #[source]
        error: ChunkingError,
    },
    /// Embedding provider failed for the source's chunks.
    #[error("failed to embed {source_uri}: {error}")]
    Embedding {
        /// Source that failed.
        source_uri: String,
        /// Underlying embedding error.
        #[source]
        error: EmbeddingClientError,
    },
    /// Vector store rejected the write.
    #[error("failed to store {source_uri}: {error}")]
    Store {
        /// Source that failed.
        source_uri: String,
        /// Underlying store error.
        #[source]
        error: StoreError,
    },
}

impl IngestionError {
    /// Source identifier the failure belongs to.
    pub fn source_uri(&self) -> &str {
        match self {
            Self::Unreadable { source_uri, .. }
            | Self::Unsupported { source_uri }
            | Self::Chunking { source_uri, .. }
            | Self::Embedding { source_uri, .. }
            | Self::Store { source_uri, .. } => source_uri,
        }
    }
}

/// Errors emitted by maintenance and search operations of the processing service.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store operation failed.
    #[error("Vector store request failed: {0}")]
    Store(#[from] StoreError),
}

/// Position of a record inside its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Locator {
    /// One-based page number (PDF).
    Page(u32),
    /// One-based slide number (presentations).
    Slide(u32),
    /// One-based row number (spreadsheets).
    Row(u32),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "Page {n}"),
            Self::Slide(n) => write!(f, "Slide {n}"),
            Self::Row(n) => write!(f, "Row {n}"),
        }
    }
}

/// Normalized text record produced by an external format loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Extracted text.
    pub text: String,
    /// File path or URI the text came from.
    pub source_uri: String,
    /// Optional position inside the source.
    #[serde(default)]
    pub locator: Option<Locator>,
}

impl SourceRecord {
    /// Record without a locator, as produced for plain-text sources.
    pub fn new(text: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_uri: source_uri.into(),
            locator: None,
        }
    }

    /// Attach a locator to the record.
    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }
}

/// Metadata persisted next to every chunk vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Chunk text, kept with the vector so retrieval needs no second lookup.
    pub text: String,
    /// Source the chunk was derived from.
    pub source_uri: String,
    /// Optional position inside the source.
    #[serde(default)]
    pub locator: Option<Locator>,
    /// Zero-based chunk position within its source record.
    pub sequence_index: usize,
    /// RFC3339 timestamp of ingestion.
    #[serde(default)]
    pub ingested_at: Option<String>,
}

/// Immutable chunk produced by the chunker.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Identifier unique within the collection.
    pub id: String,
    /// Text plus provenance.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Chunk text.
    pub fn text(&self) -> &str {
        &self.metadata.text
    }
}

/// Aggregate statistics for a batch ingestion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionStats {
    /// Sources indexed successfully.
    pub sources_processed: usize,
    /// Sources that failed and were skipped.
    pub sources_failed: usize,
    /// Records received across all sources.
    pub total_records: usize,
    /// Chunks written to the store.
    pub total_chunks: usize,
    /// Stale chunks removed after a source was re-ingested.
    pub stale_chunks_removed: usize,
    /// Per-source failure descriptions.
    pub failures: Vec<SourceFailure>,
}

impl IngestionStats {
    /// Count a failed source and keep its rendered error.
    pub fn record_failure(&mut self, error: &IngestionError) {
        self.sources_failed += 1;
        self.failures.push(SourceFailure {
            source_uri: error.source_uri().to_string(),
            reason: error.to_string(),
        });
    }
}

/// A single failed source and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    /// Source that failed.
    pub source_uri: String,
    /// Rendered error.
    pub reason: String,
}

/// Chunking parameters applied to every ingested record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters.
    pub max_size: usize,
    /// Characters shared between neighbouring chunks.
    pub overlap: usize,
}

impl ChunkingSettings {
    /// Chunking parameters from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_size: config.chunk_size,
            overlap: config.chunk_overlap,
        }
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_size: 1000,
            overlap: 200,
        }
    }
}

/// Counts returned by the collection statistics query.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub collection: String,
    /// Number of stored chunks.
    pub total_chunks: usize,
    /// Distinct document filenames, temporary uploads excluded.
    pub total_documents: usize,
}

/// Outcome of a delete-by-filename request.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    /// Filename that was matched.
    pub filename: String,
    /// Chunks removed.
    pub chunks_removed: usize,
}

/// Temporary-upload sources purged by a cleanup pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupOutcome {
    /// Filenames whose chunks were removed.
    pub sources_removed: Vec<String>,
    /// Chunks removed across those sources.
    pub chunks_removed: usize,
}
