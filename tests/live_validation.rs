use std::{env, sync::Once};

use agentic_rag::{
    answer::AnswerOrchestrator,
    config::{self, EmbeddingProvider},
    embedding::EmbeddingService,
    generation::{ProviderKind, ProviderPolicy, ProviderSet},
    processing::{ProcessingService, SourceRecord},
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() -> &'static config::Config {
    INIT.call_once(|| {
        let data_dir = env::temp_dir().join(format!("agentic-rag-live-{}", std::process::id()));
        set_default_env("RAG_DATA_DIR", &data_dir.display().to_string());
        set_default_env("RAG_COLLECTION_NAME", "live_validation");
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "nomic-embed-text");
        set_default_env("EMBEDDING_DIMENSION", "768");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        config::init_config().expect("live configuration");
    });
    config::get_config()
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    let config = init_config_once();
    assert_eq!(config.embedding_provider, EmbeddingProvider::Ollama);
    let service = EmbeddingService::from_config(config).expect("embedding service");
    let vectors = service
        .embed_batch(vec!["agentic-rag live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    assert_eq!(
        vectors[0].len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings and GOOGLE_API_KEY"]
async fn live_gemini_answers_with_citation() {
    let config = init_config_once();
    let providers = ProviderSet::from_config(config);
    assert!(
        providers.configured().contains(&ProviderKind::Gemini),
        "GOOGLE_API_KEY must be set"
    );

    let processing = ProcessingService::from_config(config)
        .await
        .expect("processing service");
    processing.clear().await.expect("clear collection");
    let stats = processing
        .ingest(vec![SourceRecord::new(
            "The on-call rotation hands over every Monday at 09:00 UTC.",
            "/docs/oncall.md",
        )])
        .await;
    assert_eq!(stats.sources_failed, 0, "ingest failed: {stats:?}");

    let answers = AnswerOrchestrator::from_config(config, &processing);
    let session = answers
        .answer(
            "When does the on-call rotation hand over?",
            ProviderPolicy::Explicit(ProviderKind::Gemini),
        )
        .await
        .expect("gemini answer");
    assert_eq!(session.provider_used, Some(ProviderKind::Gemini));
    assert!(!session.answer_text.trim().is_empty());
    assert!(
        session
            .citations
            .iter()
            .any(|citation| citation.source_filename == "oncall.md"),
        "citations: {:?}",
        session.citations
    );
}
