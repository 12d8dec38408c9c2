//! Document processing pipeline: chunking, embedding, and collection maintenance.

pub mod chunking;
pub mod sanitize;
mod service;
pub mod types;

pub use service::ProcessingService;
pub use types::{
    Chunk, ChunkMetadata, ChunkingError, ChunkingSettings, CleanupOutcome, CollectionStats,
    DeleteOutcome, IngestionError, IngestionStats, Locator, ProcessingError, SourceFailure,
    SourceRecord,
};
