//! Query-time retrieval: embed, over-fetch, score, filter, truncate.
//!
//! Retrieval never fails outward. Embedding or store errors (and timeouts) are logged and turn
//! into an empty result list, which the answer layer treats as "nothing relevant found".

mod citation;

pub use citation::{Citation, dedupe_citations};

use crate::{
    config::Config,
    embedding::EmbeddingService,
    processing::types::Chunk,
    store::{StoreError, VectorStore},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Over-fetch factor applied before score filtering.
const CANDIDATE_MULTIPLIER: usize = 2;
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Text returned by the search surface when nothing clears the score floor.
pub const NO_DOCUMENTS_FOUND: &str = "No relevant documents found for the query.";

/// Defaults applied when callers omit `k` or `min_score`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalSettings {
    /// Results returned when the caller does not ask for a specific count.
    pub default_limit: usize,
    /// Similarity floor in `[0, 1]`.
    pub min_score: f32,
    /// Upper bound for a single store query.
    pub store_timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_limit: 5,
            min_score: 0.3,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl RetrievalSettings {
    /// Derive retrieval settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_limit: config.search_default_limit.max(1),
            min_score: config.search_min_score,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// A chunk that survived retrieval, with its raw and derived scores.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedResult {
    /// Stored chunk.
    pub chunk: Chunk,
    /// Distance reported by the store.
    pub raw_distance: f32,
    /// `1 / (1 + distance)`, in `[0, 1]`.
    pub similarity_score: f32,
}

impl RetrievedResult {
    /// Citation for this result's source.
    pub fn citation(&self) -> Citation {
        Citation::from_metadata(&self.chunk.metadata)
    }
}

/// Retrieval output plus its rendering for tool surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    /// Query as received.
    pub query: String,
    /// Number of results.
    pub total: usize,
    /// Per-result details.
    pub hits: Vec<SearchHit>,
    /// `Result i:` blocks joined by separators, or the no-results message.
    pub formatted: String,
}

/// Serializable view of one retrieved chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Chunk identifier.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Original source identifier.
    pub source_uri: String,
    /// Rendered citation string.
    pub citation: String,
    /// Similarity score.
    pub score: f32,
    /// Raw distance.
    pub distance: f32,
}

/// Map a raw distance onto a similarity in `[0, 1]`; strictly decreasing in distance.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Turns query strings into ranked, filtered chunks.
#[derive(Clone)]
pub struct Retriever {
    embeddings: Arc<EmbeddingService>,
    store: Arc<dyn VectorStore>,
    settings: RetrievalSettings,
}

impl Retriever {
    /// Create a retriever over the shared embedding service and store handle.
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        store: Arc<dyn VectorStore>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embeddings,
            store,
            settings,
        }
    }

    /// Active defaults.
    pub fn settings(&self) -> RetrievalSettings {
        self.settings
    }

    /// Retrieve up to `k` chunks whose similarity is at least `min_score`.
    ///
    /// `None` falls back to the configured defaults. Failures degrade to an empty list.
    pub async fn retrieve(
        &self,
        query: &str,
        k: Option<usize>,
        min_score: Option<f32>,
    ) -> Vec<RetrievedResult> {
        let k = k.unwrap_or(self.settings.default_limit);
        let min_score = min_score.unwrap_or(self.settings.min_score);
        if k == 0 || query.trim().is_empty() {
            return Vec::new();
        }

        let vector = match self.embeddings.embed(query).await {
            Ok(vector) => vector,
            Err(error) => {
                tracing::warn!(%error, "Query embedding failed; returning no results");
                return Vec::new();
            }
        };

        let candidates = k * CANDIDATE_MULTIPLIER;
        let hits = match tokio::time::timeout(
            self.settings.store_timeout,
            self.store.query(&vector, candidates),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout))
        {
            Ok(hits) => hits,
            Err(error) => {
                tracing::warn!(%error, "Vector store query failed; returning no results");
                return Vec::new();
            }
        };

        let fetched = hits.len();
        let results: Vec<RetrievedResult> = hits
            .into_iter()
            .map(|hit| RetrievedResult {
                similarity_score: similarity_from_distance(hit.distance),
                raw_distance: hit.distance,
                chunk: Chunk {
                    id: hit.id,
                    metadata: hit.metadata,
                },
            })
            .filter(|result| result.similarity_score >= min_score)
            .take(k)
            .collect();

        match (results.first(), results.last()) {
            (Some(best), Some(worst)) => tracing::debug!(
                candidates = fetched,
                returned = results.len(),
                min_score,
                best = best.similarity_score,
                worst = worst.similarity_score,
                "Retrieved chunks"
            ),
            _ => tracing::debug!(candidates = fetched, min_score, "No results above threshold"),
        }

        results
    }

    /// Retrieve and render results for tool and CLI consumers.
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        min_score: Option<f32>,
    ) -> SearchReport {
        let results = self.retrieve(query, k, min_score).await;
        SearchReport {
            query: query.to_string(),
            total: results.len(),
            formatted: format_results(&results),
            hits: results
                .iter()
                .map(|result| SearchHit {
                    id: result.chunk.id.clone(),
                    text: result.chunk.metadata.text.clone(),
                    source_uri: result.chunk.metadata.source_uri.clone(),
                    citation: result.citation().to_string(),
                    score: result.similarity_score,
                    distance: result.raw_distance,
                })
                .collect(),
        }
    }
}

/// Render results as numbered blocks separated by `---` rules.
pub fn format_results(results: &[RetrievedResult]) -> String {
    if results.is_empty() {
        return NO_DOCUMENTS_FOUND.to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            format!(
                "Result {}:\n{}\n{}",
                index + 1,
                result.chunk.text(),
                result.citation()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
