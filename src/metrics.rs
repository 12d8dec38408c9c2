use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and question traffic.
#[derive(Default)]
pub struct RagMetrics {
    documents_indexed: AtomicU64,
    chunks_indexed: AtomicU64,
    sources_failed: AtomicU64,
    questions_answered: AtomicU64,
    provider_fallbacks: AtomicU64,
    last_chunk_size: AtomicU64,
}

impl RagMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an indexed source, the chunks written for it, and the chunk size in force.
    pub fn record_document(&self, chunk_count: u64, chunk_size: u64) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(chunk_count, Ordering::Relaxed);
        self.last_chunk_size.store(chunk_size, Ordering::Relaxed);
    }

    /// Record a source skipped because of an ingestion error.
    pub fn record_failed_source(&self) {
        self.sources_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered question and how many providers failed before the answer.
    pub fn record_question(&self, fallbacks: u64) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        self.provider_fallbacks
            .fetch_add(fallbacks, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            sources_failed: self.sources_failed.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            provider_fallbacks: self.provider_fallbacks.load(Ordering::Relaxed),
            last_chunk_size: match self.last_chunk_size.load(Ordering::Relaxed) {
                0 => None,
                value => Some(value),
            },
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Sources indexed since startup.
    pub documents_indexed: u64,
    /// Chunks written across all indexed sources.
    pub chunks_indexed: u64,
    /// Sources skipped because ingestion failed.
    pub sources_failed: u64,
    /// Questions answered, including "no information" answers.
    pub questions_answered: u64,
    /// Provider failures that were recovered by falling back.
    pub provider_fallbacks: u64,
    /// Chunk size used for the most recent ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk_size: Option<u64>,
}
