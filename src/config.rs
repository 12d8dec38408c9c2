use crate::generation::ProviderKind;
use crate::store::DistanceMetric;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the question-answering pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory holding the persisted vector collection.
    pub data_dir: PathBuf,
    /// Name of the collection used for document storage.
    pub collection_name: String,
    /// Distance metric used by the vector store.
    pub distance_metric: DistanceMetric,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Whether every embedding is scaled to unit length.
    pub embedding_normalize: bool,
    /// Per-call timeout for embedding requests, in seconds.
    pub embedding_timeout_secs: u64,
    /// Base URL of the Ollama runtime (embeddings and generation).
    pub ollama_url: Option<String>,
    /// API key for the OpenAI-compatible embeddings endpoint.
    pub openai_api_key: Option<String>,
    /// Base URL for the OpenAI-compatible embeddings endpoint.
    pub openai_base_url: Option<String>,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between neighbouring chunks in characters.
    pub chunk_overlap: usize,
    /// Default number of chunks returned by retrieval.
    pub search_default_limit: usize,
    /// Default similarity floor applied by retrieval.
    pub search_min_score: f32,
    /// Ordered fallback chain used by the `auto` provider policy.
    pub llm_providers: Vec<ProviderKind>,
    /// Per-attempt timeout for LLM providers, in seconds.
    pub llm_timeout_secs: u64,
    /// Google Generative Language API key.
    pub google_api_key: Option<String>,
    /// Gemini model identifier.
    pub gemini_model: String,
    /// Optional Gemini endpoint override.
    pub gemini_base_url: Option<String>,
    /// OpenRouter API key.
    pub openrouter_api_key: Option<String>,
    /// OpenRouter model identifier.
    pub openrouter_model: String,
    /// Optional OpenRouter endpoint override.
    pub openrouter_base_url: Option<String>,
    /// Model used when Ollama generates answers.
    pub ollama_llm_model: Option<String>,
    /// Provider used for grounding validation, if any.
    pub validation_provider: Option<ProviderKind>,
}

/// Supported embedding backends for the ingestion and query pipelines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic in-process hashing embedder.
    Local,
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
}

pub(crate) const DEFAULT_COLLECTION: &str = "rag_collection";
pub(crate) const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-001";
pub(crate) const DEFAULT_OPENROUTER_MODEL: &str = "qwen/qwen-2.5-7b-instruct:free";

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_provider = match load_env_optional("EMBEDDING_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            None => EmbeddingProvider::Local,
        };

        let llm_providers = match load_env_optional("LLM_PROVIDERS") {
            Some(value) => parse_provider_chain(&value)?,
            None => vec![ProviderKind::Gemini, ProviderKind::OpenRouter],
        };

        let validation_provider = match load_env_optional("VALIDATION_PROVIDER") {
            Some(value) if value.eq_ignore_ascii_case("none") => None,
            Some(value) => Some(
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("VALIDATION_PROVIDER".into()))?,
            ),
            None => None,
        };

        let config = Self {
            data_dir: load_env_optional("RAG_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("rag_data")),
            collection_name: load_env_optional("RAG_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            distance_metric: match load_env_optional("DISTANCE_METRIC") {
                Some(value) => value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("DISTANCE_METRIC".into()))?,
                None => DistanceMetric::SquaredEuclidean,
            },
            embedding_provider,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| default_embedding_model(embedding_provider).to_string()),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", 384)?,
            embedding_normalize: parse_bool_or("EMBEDDING_NORMALIZE", true)?,
            embedding_timeout_secs: parse_or("EMBEDDING_TIMEOUT_SECS", 30)?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL"),
            chunk_size: parse_or("CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_or("CHUNK_OVERLAP", 200)?,
            search_default_limit: parse_or("SEARCH_DEFAULT_LIMIT", 5)?,
            search_min_score: parse_or("SEARCH_MIN_SCORE", 0.3)?,
            llm_providers,
            llm_timeout_secs: parse_or("LLM_TIMEOUT_SECS", 30)?,
            google_api_key: load_env_optional("GOOGLE_API_KEY"),
            gemini_model: load_env_optional("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: load_env_optional("GEMINI_BASE_URL"),
            openrouter_api_key: load_env_optional("OPENROUTER_API_KEY"),
            openrouter_model: load_env_optional("OPENROUTER_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            openrouter_base_url: load_env_optional("OPENROUTER_BASE_URL"),
            ollama_llm_model: load_env_optional("OLLAMA_LLM_MODEL"),
            validation_provider,
        };

        if config.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::InvalidValue("CHUNK_OVERLAP".into()));
        }
        if config.embedding_provider == EmbeddingProvider::OpenAI && config.openai_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }

        Ok(config)
    }

    /// Timeout applied to each embedding call.
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs.max(1))
    }

    /// Timeout applied to each LLM provider attempt.
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs.max(1))
    }
}

fn default_embedding_model(provider: EmbeddingProvider) -> &'static str {
    match provider {
        EmbeddingProvider::Local => "hashing-v1",
        EmbeddingProvider::Ollama => "all-minilm",
        EmbeddingProvider::OpenAI => "text-embedding-3-small",
    }
}

/// Parse a comma separated provider list such as `gemini,openrouter`.
pub(crate) fn parse_provider_chain(value: &str) -> Result<Vec<ProviderKind>, ConfigError> {
    let mut chain = Vec::new();
    for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let kind: ProviderKind = item
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("LLM_PROVIDERS ({item})")))?;
        if !chain.contains(&kind) {
            chain.push(kind);
        }
    }
    if chain.is_empty() {
        return Err(ConfigError::InvalidValue("LLM_PROVIDERS".into()));
    }
    Ok(chain)
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

fn parse_bool_or(key: &str, default: bool) -> Result<bool, ConfigError> {
    match load_env_optional(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        },
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        collection = %config.collection_name,
        embedding_provider = ?config.embedding_provider,
        llm_providers = ?config.llm_providers,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
