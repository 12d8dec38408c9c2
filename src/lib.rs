#![deny(missing_docs)]

//! Retrieval-augmented question answering over local documents.
//!
//! Ingestion pushes text through chunking, embedding, and a persistent vector store. Questions
//! are answered by retrieving cited passages and generating with an ordered chain of LLM
//! providers, optionally streamed and optionally checked by a validation model.

/// Question answering orchestration and streaming events.
pub mod answer;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// LLM providers, prompts, and the fallback chain.
pub mod generation;
/// Plain-text source loader used by the CLI.
pub mod loader;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Ingestion and question counters.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Query-time retrieval and citations.
pub mod retrieval;
/// Persistent vector store.
pub mod store;
/// Grounding checks for generated answers.
pub mod validation;
