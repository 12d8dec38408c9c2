//! Embedded vector store persisted as one JSON snapshot per collection.
//!
//! Readers clone an `Arc` to the current snapshot and never take the writer lock. Writers are
//! serialized by an async mutex, build a modified copy, persist it with a temp-file rename, and
//! only then publish the new snapshot. A crash mid-write leaves the previous file intact.

use super::types::{DistanceMetric, MetadataFilter, QueryHit, StoreEntry, StoreError};
use super::VectorStore;
use crate::processing::types::ChunkMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    dimension: Option<usize>,
    next_sequence: u64,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: String,
    sequence: u64,
    vector: Vec<f32>,
    metadata: ChunkMetadata,
}

impl From<&StoredEntry> for StoreEntry {
    fn from(entry: &StoredEntry) -> Self {
        Self {
            id: entry.id.clone(),
            vector: entry.vector.clone(),
            metadata: entry.metadata.clone(),
        }
    }
}

/// Exact-scan vector store rooted in a data directory.
pub struct LocalVectorStore {
    collection: String,
    path: PathBuf,
    metric: DistanceMetric,
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl LocalVectorStore {
    /// Open (or create) `collection` under `data_dir`.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        collection: &str,
        metric: DistanceMetric,
    ) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: data_dir.to_path_buf(),
                source,
            })?;

        let path = data_dir.join(format!("{collection}.json"));
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                let empty = Snapshot::default();
                persist(&path, &empty).await?;
                tracing::info!(collection, path = %path.display(), "Initialized empty collection");
                empty
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(
            collection,
            entries = snapshot.entries.len(),
            dimension = ?snapshot.dimension,
            %metric,
            "Opened vector store"
        );

        Ok(Self {
            collection: collection.to_string(),
            path,
            metric,
            snapshot: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        })
    }

    /// Collection name this store persists.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Metric used to rank query results.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn publish(&self, next: Snapshot) -> Result<(), StoreError> {
        persist(&self.path, &next).await?;
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(())
    }
}

async fn persist(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(snapshot)?;
    let temp = path.with_extension("json.tmp");
    tokio::fs::write(&temp, bytes)
        .await
        .map_err(|source| StoreError::Io {
            path: temp.clone(),
            source,
        })?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn check_dimension(expected: Option<usize>, actual: usize) -> Result<(), StoreError> {
    match expected {
        Some(expected) if expected != actual => {
            Err(StoreError::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn upsert(&self, entries: Vec<StoreEntry>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let _guard = self.writer.lock().await;
        let mut next = (*self.current()).clone();

        let dimension = next.dimension.unwrap_or(entries[0].vector.len());
        for entry in &entries {
            check_dimension(Some(dimension), entry.vector.len())?;
        }
        next.dimension = Some(dimension);

        let replaced: HashSet<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
        next.entries
            .retain(|stored| !replaced.contains(stored.id.as_str()));

        let count = entries.len();
        for entry in entries {
            let sequence = next.next_sequence;
            next.next_sequence += 1;
            // A repeated id within one batch keeps only its last occurrence.
            next.entries.retain(|stored| stored.id != entry.id);
            next.entries.push(StoredEntry {
                id: entry.id,
                sequence,
                vector: entry.vector,
                metadata: entry.metadata,
            });
        }

        self.publish(next).await?;
        tracing::debug!(collection = %self.collection, entries = count, "Upserted entries");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, StoreError> {
        let snapshot = self.current();
        check_dimension(snapshot.dimension, vector.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, &StoredEntry)> = snapshot
            .entries
            .iter()
            .map(|entry| (self.metric.distance(vector, &entry.vector), entry))
            .collect();
        scored.sort_by(|(left_distance, left), (right_distance, right)| {
            left_distance
                .total_cmp(right_distance)
                .then(left.sequence.cmp(&right.sequence))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, entry)| QueryHit {
                id: entry.id.clone(),
                metadata: entry.metadata.clone(),
                distance,
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.writer.lock().await;
        let mut next = (*self.current()).clone();
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = next.entries.len();
        next.entries
            .retain(|stored| !targets.contains(stored.id.as_str()));
        let removed = before - next.entries.len();
        if removed == 0 {
            return Ok(0);
        }

        self.publish(next).await?;
        tracing::debug!(collection = %self.collection, removed, "Deleted entries");
        Ok(removed)
    }

    async fn get_all(
        &self,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<StoreEntry>, StoreError> {
        let snapshot = self.current();
        Ok(snapshot
            .entries
            .iter()
            .filter(|entry| filter.is_none_or(|predicate| predicate(&entry.metadata)))
            .map(StoreEntry::from)
            .collect())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let _guard = self.writer.lock().await;
        let next = Snapshot {
            next_sequence: self.current().next_sequence,
            ..Snapshot::default()
        };
        self.publish(next).await?;
        tracing::info!(collection = %self.collection, "Collection reset");
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.current().entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn entry(id: &str, vector: Vec<f32>, source: &str) -> StoreEntry {
        StoreEntry {
            id: id.to_string(),
            vector,
            metadata: ChunkMetadata {
                text: format!("text of {id}"),
                source_uri: source.to_string(),
                locator: None,
                sequence_index: 0,
                ingested_at: None,
            },
        }
    }

    async fn open(dir: &TempDir) -> LocalVectorStore {
        LocalVectorStore::open(dir.path(), "rag_collection", DistanceMetric::SquaredEuclidean)
            .await
            .expect("store")
    }

    #[tokio::test]
    async fn fresh_directory_initializes_empty_collection() {
        let dir = TempDir::new().expect("tempdir");
        let store = open(&dir).await;
        assert_eq!(store.count().await.expect("count"), 0);
        assert!(dir.path().join("rag_collection.json").exists());
    }

    #[tokio::test]
    async fn query_returns_at_most_k_sorted_by_distance() {
        let dir = TempDir::new().expect("tempdir");
        let store = open(&dir).await;
        store
            .upsert(vec![
                entry("far", vec![5.0, 0.0], "a.txt"),
                entry("near", vec![1.0, 0.0], "a.txt"),
                entry("mid", vec![3.0, 0.0], "a.txt"),
            ])
            .await
            .expect("upsert");

        let hits = store.query(&[0.0, 0.0], 2).await.expect("query");
        let ids: Vec<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits.windows(2).all(|pair| pair[0].distance <= pair[1].distance));
        assert!((hits[0].distance - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn ties_prefer_earlier_insertion() {
        let dir = TempDir::new().expect("tempdir");
        let store = open(&dir).await;
        store
            .upsert(vec![entry("first", vec![1.0, 0.0], "a.txt")])
            .await
            .expect("upsert");
        store
            .upsert(vec![entry("second", vec![0.0, 1.0], "a.txt")])
            .await
            .expect("upsert");

        let hits = store.query(&[0.0, 0.0], 2).await.expect("query");
        assert_eq!(hits[0].id, "first");
        assert_eq!(hits[1].id, "second");
    }

    #[tokio::test]
    async fn upsert_replaces_existing_id() {
        let dir = TempDir::new().expect("tempdir");
        let store = open(&dir).await;
        store
            .upsert(vec![entry("chunk", vec![1.0, 0.0], "old.txt")])
            .await
            .expect("upsert");
        store
            .upsert(vec![entry("chunk", vec![0.0, 1.0], "new.txt")])
            .await
            .expect("upsert");

        assert_eq!(store.count().await.expect("count"), 1);
        let all = store.get_all(None).await.expect("scan");
        assert_eq!(all[0].metadata.source_uri, "new.txt");
        assert_eq!(all[0].vector, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn rejects_mixed_dimensions() {
        let dir = TempDir::new().expect("tempdir");
        let store = open(&dir).await;
        store
            .upsert(vec![entry("a", vec![1.0, 0.0], "a.txt")])
            .await
            .expect("upsert");

        let error = store
            .upsert(vec![entry("b", vec![1.0, 0.0, 0.0], "a.txt")])
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(
            error,
            StoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));

        let error = store.query(&[1.0], 1).await.expect_err("query mismatch");
        assert!(matches!(error, StoreError::DimensionMismatch { .. }));
        assert_eq!(store.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn delete_ignores_unknown_ids() {
        let dir = TempDir::new().expect("tempdir");
        let store = open(&dir).await;
        store
            .upsert(vec![
                entry("a", vec![1.0, 0.0], "a.txt"),
                entry("b", vec![0.0, 1.0], "b.txt"),
            ])
            .await
            .expect("upsert");

        let removed = store
            .delete(&["a".to_string(), "missing".to_string()])
            .await
            .expect("delete");
        assert_eq!(removed, 1);
        assert_eq!(store.delete(&["missing".to_string()]).await.expect("delete"), 0);
        assert_eq!(store.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn get_all_applies_metadata_filter() {
        let dir = TempDir::new().expect("tempdir");
        let store = open(&dir).await;
        store
            .upsert(vec![
                entry("a", vec![1.0, 0.0], "a.txt"),
                entry("b", vec![0.0, 1.0], "b.txt"),
            ])
            .await
            .expect("upsert");

        let only_b = |metadata: &ChunkMetadata| metadata.source_uri == "b.txt";
        let entries = store.get_all(Some(&only_b)).await.expect("scan");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "b");
    }

    #[tokio::test]
    async fn contents_survive_reopen() {
        let dir = TempDir::new().expect("tempdir");
        {
            let store = open(&dir).await;
            store
                .upsert(vec![
                    entry("a", vec![1.0, 0.0], "a.txt"),
                    entry("b", vec![0.0, 1.0], "b.txt"),
                ])
                .await
                .expect("upsert");
        }

        let reopened = open(&dir).await;
        assert_eq!(reopened.count().await.expect("count"), 2);
        let hits = reopened.query(&[0.0, 1.0], 1).await.expect("query");
        assert_eq!(hits[0].id, "b");
        assert_eq!(hits[0].metadata.text, "text of b");
    }

    #[tokio::test]
    async fn reset_clears_collection_and_dimension() {
        let dir = TempDir::new().expect("tempdir");
        let store = open(&dir).await;
        store
            .upsert(vec![entry("a", vec![1.0, 0.0], "a.txt")])
            .await
            .expect("upsert");
        store.reset().await.expect("reset");

        assert_eq!(store.count().await.expect("count"), 0);
        store
            .upsert(vec![entry("b", vec![1.0, 0.0, 0.0], "b.txt")])
            .await
            .expect("new dimension accepted after reset");
    }

    #[tokio::test]
    async fn cosine_metric_ranks_by_angle() {
        let dir = TempDir::new().expect("tempdir");
        let store = LocalVectorStore::open(dir.path(), "angles", DistanceMetric::Cosine)
            .await
            .expect("store");
        store
            .upsert(vec![
                entry("long", vec![10.0, 1.0], "a.txt"),
                entry("orthogonal", vec![0.0, 1.0], "a.txt"),
            ])
            .await
            .expect("upsert");

        let hits = store.query(&[1.0, 0.0], 2).await.expect("query");
        assert_eq!(hits[0].id, "long");
        assert_eq!(store.metric(), DistanceMetric::Cosine);
    }

    fn round_entry(id: &str, round: u32) -> StoreEntry {
        let value = round as f32;
        let mut entry = entry(id, vec![value, value], "live.md");
        entry.metadata.text = format!("round {round}");
        entry.metadata.sequence_index = round as usize;
        entry
    }

    fn assert_whole(vector: &[f32], metadata: &ChunkMetadata) {
        assert_eq!(vector[0], vector[1], "vector torn: {vector:?}");
        assert_eq!(vector[0] as usize, metadata.sequence_index);
        assert_eq!(metadata.text, format!("round {}", metadata.sequence_index));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_only_observe_whole_entries_during_writes() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(open(&dir).await);
        store
            .upsert(vec![round_entry("a", 0), round_entry("b", 0)])
            .await
            .expect("seed");

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for round in 1..=40 {
                    store
                        .upsert(vec![round_entry("a", round), round_entry("b", round)])
                        .await
                        .expect("upsert");
                }
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let entries = store.get_all(None).await.expect("get_all");
                        assert_eq!(entries.len(), 2);
                        for entry in &entries {
                            assert_whole(&entry.vector, &entry.metadata);
                        }
                        // Both ids are replaced in one upsert, so they always share a round.
                        assert_eq!(
                            entries[0].metadata.sequence_index,
                            entries[1].metadata.sequence_index
                        );

                        for hit in store.query(&[0.0, 0.0], 2).await.expect("query") {
                            let round = hit.metadata.sequence_index as f32;
                            assert_eq!(hit.distance, 2.0 * round * round);
                            assert_eq!(
                                hit.metadata.text,
                                format!("round {}", hit.metadata.sequence_index)
                            );
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.expect("writer task");
        for reader in readers {
            reader.await.expect("reader task");
        }

        let entries = store.get_all(None).await.expect("get_all");
        assert!(entries.iter().all(|entry| entry.metadata.sequence_index == 40));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_proceed_while_writer_lock_is_held() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(open(&dir).await);
        store
            .upsert(vec![round_entry("a", 1)])
            .await
            .expect("seed");

        let guard = store.writer.lock().await;

        let reader = store.clone();
        let (hits, entries, count) = tokio::time::timeout(Duration::from_secs(2), async move {
            (
                reader.query(&[0.0, 0.0], 5).await.expect("query"),
                reader.get_all(None).await.expect("get_all"),
                reader.count().await.expect("count"),
            )
        })
        .await
        .expect("reads completed while the writer lock was held");
        assert_eq!(hits.len(), 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(count, 1);

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.upsert(vec![round_entry("b", 2)]).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished(), "writes wait for the writer lock");
        assert_eq!(store.count().await.expect("count"), 1);

        drop(guard);
        pending.await.expect("join").expect("upsert");
        assert_eq!(store.count().await.expect("count"), 2);
    }
}
