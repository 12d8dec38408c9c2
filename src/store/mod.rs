//! Persistent vector store abstraction and its embedded implementation.

pub mod local;
pub mod types;

pub use local::LocalVectorStore;
pub use types::{DistanceMetric, MetadataFilter, QueryHit, StoreEntry, StoreError};

use async_trait::async_trait;

/// Queryable collection of `(id, vector, metadata)` entries.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or fully replace entries by id. All vectors must share the collection dimension.
    async fn upsert(&self, entries: Vec<StoreEntry>) -> Result<(), StoreError>;

    /// Return at most `k` entries ordered by ascending distance; ties favour earlier insertions.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, StoreError>;

    /// Remove entries by id, returning how many existed. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError>;

    /// Scan every entry, optionally keeping only those whose metadata matches `filter`.
    async fn get_all(&self, filter: Option<&MetadataFilter>)
    -> Result<Vec<StoreEntry>, StoreError>;

    /// Remove every entry from the collection.
    async fn reset(&self) -> Result<(), StoreError>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize, StoreError>;
}
