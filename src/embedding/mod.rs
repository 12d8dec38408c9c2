//! Embedding providers and the service wrapper that enforces their contract.
//!
//! Backends only turn text into raw vectors. [`EmbeddingService`] sits in front of whichever
//! backend is configured and owns the cross-cutting rules: one vector per input in input order,
//! a fixed dimension, optional unit normalization, and a per-call timeout.

mod hashing;
mod ollama;
mod openai;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a body that could not be decoded.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Provider returned vectors of the wrong width.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the collection.
        expected: usize,
        /// Dimension returned by the provider.
        actual: usize,
    },
    /// Provider returned a different number of vectors than inputs.
    #[error("Embedding count mismatch: sent {expected} texts, received {actual} vectors")]
    CountMismatch {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
    /// Provider did not answer within the configured timeout.
    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Contract enforced by [`EmbeddingService`] on every backend response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingSettings {
    /// Required vector width.
    pub dimension: usize,
    /// Scale every vector to unit length.
    pub normalize: bool,
    /// Upper bound for a single backend call.
    pub timeout: Duration,
}

impl EmbeddingSettings {
    /// Derive embedding settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            dimension: config.embedding_dimension,
            normalize: config.embedding_normalize,
            timeout: config.embedding_timeout(),
        }
    }
}

/// Embedding backend plus the validation applied to everything it returns.
pub struct EmbeddingService {
    client: Box<dyn EmbeddingClient>,
    settings: EmbeddingSettings,
}

impl EmbeddingService {
    /// Wrap a backend with the given contract.
    pub fn new(client: Box<dyn EmbeddingClient>, settings: EmbeddingSettings) -> Self {
        Self { client, settings }
    }

    /// Build the service for the configured backend.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingClientError> {
        Ok(Self::new(
            build_embedding_client(config)?,
            EmbeddingSettings::from_config(config),
        ))
    }

    /// Vector width every call returns.
    pub fn dimension(&self) -> usize {
        self.settings.dimension
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let mut vectors = self.embed_batch(vec![text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingClientError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }

    /// Embed many texts, returning vectors in input order.
    pub async fn embed_batch(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        tracing::debug!(
            texts = expected,
            dimension = self.settings.dimension,
            "Generating embeddings"
        );

        let mut vectors =
            tokio::time::timeout(self.settings.timeout, self.client.generate_embeddings(texts))
                .await
                .map_err(|_| EmbeddingClientError::Timeout(self.settings.timeout))??;

        if vectors.len() != expected {
            return Err(EmbeddingClientError::CountMismatch {
                expected,
                actual: vectors.len(),
            });
        }

        for vector in &mut vectors {
            if vector.len() != self.settings.dimension {
                return Err(EmbeddingClientError::DimensionMismatch {
                    expected: self.settings.dimension,
                    actual: vector.len(),
                });
            }
            if self.settings.normalize {
                normalize(vector);
            }
        }

        Ok(vectors)
    }
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Build an embedding client suitable for the current configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient>, EmbeddingClientError> {
    tracing::info!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Initializing embedding client"
    );
    match config.embedding_provider {
        EmbeddingProvider::Local => Ok(Box::new(HashingEmbedder::new(config.embedding_dimension))),
        EmbeddingProvider::Ollama => {
            let base_url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Ok(Box::new(OllamaEmbeddingClient::new(
                base_url,
                config.embedding_model.clone(),
            )?))
        }
        EmbeddingProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
            })?;
            let base_url = config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
            Ok(Box::new(OpenAiEmbeddingClient::new(
                base_url,
                api_key,
                config.embedding_model.clone(),
            )?))
        }
    }
}
