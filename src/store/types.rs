//! Shared types used by vector store implementations.

use crate::processing::types::ChunkMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors returned while reading or writing the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("Vector store I/O failed for {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Snapshot could not be encoded or decoded.
    #[error("Vector store snapshot is corrupt or unwritable: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Vector width differs from the collection dimension.
    #[error("Vector dimension mismatch: collection uses {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the first write to the collection.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Store operation exceeded its time budget.
    #[error("Vector store operation timed out")]
    Timeout,
}

/// Persisted `(id, vector, metadata)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    /// Chunk identifier, unique within the collection.
    pub id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Chunk text and provenance.
    pub metadata: ChunkMetadata,
}

/// Nearest-neighbour match returned by [`VectorStore::query`](super::VectorStore::query).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    /// Chunk identifier.
    pub id: String,
    /// Chunk text and provenance.
    pub metadata: ChunkMetadata,
    /// Raw distance under the collection metric; lower is closer.
    pub distance: f32,
}

/// Predicate applied to entry metadata during a full scan.
pub type MetadataFilter = dyn Fn(&ChunkMetadata) -> bool + Send + Sync;

/// Distance function used to rank stored vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Sum of squared component differences.
    #[default]
    SquaredEuclidean,
    /// Straight-line distance.
    Euclidean,
    /// One minus cosine similarity.
    Cosine,
}

impl DistanceMetric {
    /// Distance between two vectors of equal width.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::SquaredEuclidean => squared_euclidean(a, b),
            Self::Euclidean => squared_euclidean(a, b).sqrt(),
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|y| y * y).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
        }
    }
}

fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SquaredEuclidean => "squared_euclidean",
            Self::Euclidean => "euclidean",
            Self::Cosine => "cosine",
        };
        f.write_str(name)
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "squared_euclidean" | "l2" => Ok(Self::SquaredEuclidean),
            "euclidean" => Ok(Self::Euclidean),
            "cosine" => Ok(Self::Cosine),
            other => Err(format!("unknown distance metric `{other}`")),
        }
    }
}
