//! Processing service coordinating chunking, embedding, and vector store maintenance.

use crate::{
    config::Config,
    embedding::EmbeddingService,
    metrics::{MetricsSnapshot, RagMetrics},
    processing::{
        chunking::{chunk_id, chunk_record},
        sanitize::{is_temporary_upload, source_filename},
        types::{
            Chunk, ChunkMetadata, ChunkingSettings, CleanupOutcome, CollectionStats, DeleteOutcome,
            IngestionError, IngestionStats, Locator, ProcessingError, SourceRecord,
        },
    },
    store::{LocalVectorStore, MetadataFilter, StoreEntry, StoreError, VectorStore},
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Coordinates the ingestion pipeline and collection maintenance.
///
/// The service owns the single store handle, the embedding service, and the metrics registry so
/// that the CLI, the MCP tools, and the retriever all share the same components. Construct it
/// once near process start and share it through an `Arc`.
pub struct ProcessingService {
    embeddings: Arc<EmbeddingService>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingSettings,
    collection: String,
    metrics: Arc<RagMetrics>,
}

struct SourceOutcome {
    written: usize,
    stale_removed: usize,
}

impl ProcessingService {
    /// Assemble a service from already constructed components.
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingSettings,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embeddings,
            store,
            chunking,
            collection: collection.into(),
            metrics: Arc::new(RagMetrics::new()),
        }
    }

    /// Build the service for the loaded configuration, opening the persisted collection.
    pub async fn from_config(config: &Config) -> Result<Self, ProcessingError> {
        let embeddings = Arc::new(EmbeddingService::from_config(config)?);
        tracing::info!("Embedding client initialized");
        let store = LocalVectorStore::open(
            &config.data_dir,
            &config.collection_name,
            config.distance_metric,
        )
        .await?;
        tracing::debug!(collection = %config.collection_name, "Primary collection ready");

        Ok(Self::new(
            embeddings,
            Arc::new(store),
            ChunkingSettings::from_config(config),
            config.collection_name.clone(),
        ))
    }

    /// Shared embedding service, reused by the retriever.
    pub fn embeddings(&self) -> Arc<EmbeddingService> {
        self.embeddings.clone()
    }

    /// Shared store handle, reused by the retriever.
    pub fn store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    /// Shared metrics registry.
    pub fn metrics(&self) -> Arc<RagMetrics> {
        self.metrics.clone()
    }

    /// Chunking parameters applied to every record.
    pub fn chunking(&self) -> ChunkingSettings {
        self.chunking
    }

    /// Name of the collection this service maintains.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Chunk, embed, and index records, isolating failures per source.
    ///
    /// Records are grouped by `source_uri` in first-seen order. Each source is written as a unit.
    /// For every `(source_uri, locator)` pair written, chunks left over from an earlier, longer
    /// version of that page, slide or row are removed afterwards. Other locators of the same
    /// source are left alone, so a document can be ingested one page per call.
    pub async fn ingest(&self, records: Vec<SourceRecord>) -> IngestionStats {
        let mut stats = IngestionStats {
            total_records: records.len(),
            ..IngestionStats::default()
        };

        for (source_uri, records) in group_by_source(records) {
            match self.ingest_source(&source_uri, &records).await {
                Ok(outcome) => {
                    stats.sources_processed += 1;
                    stats.total_chunks += outcome.written;
                    stats.stale_chunks_removed += outcome.stale_removed;
                }
                Err(error) => {
                    tracing::warn!(source = %source_uri, %error, "Source skipped");
                    self.metrics.record_failed_source();
                    stats.record_failure(&error);
                }
            }
        }

        tracing::info!(
            collection = %self.collection,
            processed = stats.sources_processed,
            failed = stats.sources_failed,
            chunks = stats.total_chunks,
            "Ingestion finished"
        );
        stats
    }

    async fn ingest_source(
        &self,
        source_uri: &str,
        records: &[SourceRecord],
    ) -> Result<SourceOutcome, IngestionError> {
        let ingested_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        let mut chunks = Vec::new();
        let mut next_index: HashMap<Option<Locator>, usize> = HashMap::new();
        for record in records {
            let record_chunks = chunk_record(record, self.chunking, ingested_at.as_deref())
                .map_err(|error| IngestionError::Chunking {
                    source_uri: source_uri.to_string(),
                    error,
                })?;
            let offset = next_index.entry(record.locator).or_insert(0);
            chunks.extend(renumber(record_chunks, *offset));
            *offset = chunks
                .iter()
                .filter(|chunk| chunk.metadata.locator == record.locator)
                .count();
        }

        let written: HashSet<String> = chunks.iter().map(|chunk| chunk.id.clone()).collect();
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text().to_string()).collect();
        let vectors =
            self.embeddings
                .embed_batch(texts)
                .await
                .map_err(|error| IngestionError::Embedding {
                    source_uri: source_uri.to_string(),
                    error,
                })?;

        let entries: Vec<StoreEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| StoreEntry {
                id: chunk.id,
                vector,
                metadata: chunk.metadata,
            })
            .collect();
        let store_error = |error: StoreError| IngestionError::Store {
            source_uri: source_uri.to_string(),
            error,
        };
        if !entries.is_empty() {
            self.store.upsert(entries).await.map_err(store_error)?;
        }

        let owner = source_uri.to_string();
        let rewritten: HashSet<Option<Locator>> =
            records.iter().map(|record| record.locator).collect();
        let filter = move |metadata: &ChunkMetadata| {
            metadata.source_uri == owner && rewritten.contains(&metadata.locator)
        };
        let stale: Vec<String> = self
            .store
            .get_all(Some(&filter as &MetadataFilter))
            .await
            .map_err(store_error)?
            .into_iter()
            .map(|entry| entry.id)
            .filter(|id| !written.contains(id))
            .collect();
        let stale_removed = if stale.is_empty() {
            0
        } else {
            self.store.delete(&stale).await.map_err(store_error)?
        };

        self.metrics
            .record_document(written.len() as u64, self.chunking.max_size as u64);
        tracing::info!(
            source = %source_uri,
            records = records.len(),
            chunks = written.len(),
            stale_removed,
            "Source indexed"
        );

        Ok(SourceOutcome {
            written: written.len(),
            stale_removed,
        })
    }

    /// Distinct source filenames in the collection, temporary uploads excluded.
    pub async fn list_documents(&self) -> Result<Vec<String>, ProcessingError> {
        let entries = self.store.get_all(None).await?;
        let names: BTreeSet<String> = entries
            .iter()
            .map(|entry| source_filename(&entry.metadata.source_uri))
            .filter(|name| !is_temporary_upload(name))
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }

    /// Remove every chunk whose source filename equals `filename`.
    ///
    /// Full paths are reduced to their filename first, so `/uploads/report.pdf` and `report.pdf`
    /// address the same document.
    pub async fn delete_document(&self, filename: &str) -> Result<DeleteOutcome, ProcessingError> {
        let target = source_filename(filename.trim()).to_string();
        let matcher = target.clone();
        let filter =
            move |metadata: &ChunkMetadata| source_filename(&metadata.source_uri) == matcher;
        let ids: Vec<String> = self
            .store
            .get_all(Some(&filter as &MetadataFilter))
            .await?
            .into_iter()
            .map(|entry| entry.id)
            .collect();

        let chunks_removed = if ids.is_empty() {
            0
        } else {
            self.store.delete(&ids).await?
        };
        tracing::info!(filename = %target, chunks_removed, "Document deleted");

        Ok(DeleteOutcome {
            filename: target,
            chunks_removed,
        })
    }

    /// Purge every source whose filename looks like a temporary upload.
    pub async fn cleanup_temporary(&self) -> Result<CleanupOutcome, ProcessingError> {
        let filter =
            |metadata: &ChunkMetadata| is_temporary_upload(source_filename(&metadata.source_uri));
        let entries = self
            .store
            .get_all(Some(&filter as &MetadataFilter))
            .await?;
        if entries.is_empty() {
            return Ok(CleanupOutcome::default());
        }

        let sources: BTreeSet<String> = entries
            .iter()
            .map(|entry| source_filename(&entry.metadata.source_uri).to_string())
            .collect();
        let ids: Vec<String> = entries.into_iter().map(|entry| entry.id).collect();
        let chunks_removed = self.store.delete(&ids).await?;
        tracing::info!(
            sources = sources.len(),
            chunks_removed,
            "Temporary uploads purged"
        );

        Ok(CleanupOutcome {
            sources_removed: sources.into_iter().collect(),
            chunks_removed,
        })
    }

    /// Remove every chunk in the collection, returning how many were stored.
    pub async fn clear(&self) -> Result<usize, ProcessingError> {
        let removed = self.store.count().await?;
        self.store.reset().await?;
        tracing::info!(collection = %self.collection, removed, "Collection cleared");
        Ok(removed)
    }

    /// Chunk and document counts for the collection.
    ///
    /// Documents are counted the way [`Self::list_documents`] lists them: by filename, with
    /// temporary uploads excluded. `total_chunks` still includes every stored chunk.
    pub async fn stats(&self) -> Result<CollectionStats, ProcessingError> {
        let entries = self.store.get_all(None).await?;
        let sources: HashSet<&str> = entries
            .iter()
            .map(|entry| source_filename(&entry.metadata.source_uri))
            .filter(|name| !is_temporary_upload(name))
            .collect();
        Ok(CollectionStats {
            collection: self.collection.clone(),
            total_chunks: entries.len(),
            total_documents: sources.len(),
        })
    }

    /// Return the current ingestion and question metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Group records by source, keeping the first-seen order of sources and records.
fn group_by_source(records: Vec<SourceRecord>) -> Vec<(String, Vec<SourceRecord>)> {
    let mut groups: Vec<(String, Vec<SourceRecord>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for record in records {
        match positions.get(&record.source_uri) {
            Some(&position) => groups[position].1.push(record),
            None => {
                positions.insert(record.source_uri.clone(), groups.len());
                groups.push((record.source_uri.clone(), vec![record]));
            }
        }
    }
    groups
}

/// Shift sequence indexes when several records share a source and locator, keeping ids unique.
fn renumber(chunks: Vec<Chunk>, offset: usize) -> Vec<Chunk> {
    if offset == 0 {
        return chunks;
    }
    chunks
        .into_iter()
        .map(|mut chunk| {
            chunk.metadata.sequence_index += offset;
            chunk.id = chunk_id(
                &chunk.metadata.source_uri,
                chunk.metadata.locator,
                chunk.metadata.sequence_index,
            );
            chunk
        })
        .collect()
}
