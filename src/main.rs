use std::{path::PathBuf, sync::Arc};

use agentic_rag::{
    answer::AnswerOrchestrator, config, generation::ProviderPolicy, loader, logging,
    processing::ProcessingService,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use futures_util::{StreamExt, pin_mut};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "agentic-rag",
    about = "Index local documents and answer questions about them"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index `.txt` and `.md` files (directories are walked recursively).
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Answer a question from the indexed documents.
    Ask {
        question: String,
        /// `auto`, `gemini`, `openrouter`, or `ollama`.
        #[arg(long, default_value = "auto")]
        provider: String,
        /// Print staged server-sent events instead of a single response.
        #[arg(long, conflicts_with = "validate")]
        stream: bool,
        /// Check the answer against its context.
        #[arg(long)]
        validate: bool,
    },
    /// Show the passages retrieval would feed to the model.
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        min_score: Option<f32>,
    },
    /// List indexed filenames.
    Documents,
    /// Remove every chunk of a document.
    Delete { filename: String },
    /// Purge temporary-upload sources.
    Cleanup,
    /// Remove every chunk in the collection.
    Clear,
    /// Collection counts and pipeline counters.
    Stats,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();

    let processing = Arc::new(
        ProcessingService::from_config(config)
            .await
            .context("failed to initialize the processing pipeline")?,
    );

    match cli.command {
        Command::Ingest { paths } => ingest(&processing, &paths).await,
        Command::Ask {
            question,
            provider,
            stream,
            validate,
        } => {
            let policy: ProviderPolicy = provider.parse().map_err(|err: String| anyhow!(err))?;
            let answers = AnswerOrchestrator::from_config(config, &processing);
            ask(&answers, &question, policy, stream, validate).await
        }
        Command::Search {
            query,
            limit,
            min_score,
        } => {
            let answers = AnswerOrchestrator::from_config(config, &processing);
            let report = answers.retriever().search(&query, limit, min_score).await;
            println!("{}", report.formatted);
            Ok(())
        }
        Command::Documents => {
            for name in processing.list_documents().await? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Delete { filename } => print_json(&processing.delete_document(&filename).await?),
        Command::Cleanup => print_json(&processing.cleanup_temporary().await?),
        Command::Clear => {
            let removed = processing.clear().await?;
            println!("Removed {removed} chunks from {}", processing.collection());
            Ok(())
        }
        Command::Stats => {
            let stats = processing.stats().await?;
            print_json(&serde_json::json!({
                "collection": stats,
                "metrics": processing.metrics_snapshot(),
            }))
        }
    }
}

async fn ingest(processing: &ProcessingService, paths: &[PathBuf]) -> Result<()> {
    let mut records = Vec::new();
    let mut load_failures = Vec::new();
    for path in paths {
        let loaded = loader::load_path(path);
        records.extend(loaded.records);
        load_failures.extend(loaded.failures);
    }

    let mut stats = processing.ingest(records).await;
    for failure in &load_failures {
        tracing::warn!(error = %failure, "Source not loaded");
        processing.metrics().record_failed_source();
        stats.record_failure(failure);
    }
    print_json(&stats)
}

async fn ask(
    answers: &AnswerOrchestrator,
    question: &str,
    policy: ProviderPolicy,
    stream: bool,
    validate: bool,
) -> Result<()> {
    if stream {
        let events = answers.answer_stream(question, policy);
        pin_mut!(events);
        while let Some(event) = events.next().await {
            print!("{}", event.to_sse());
        }
        return Ok(());
    }

    if validate {
        let answer = answers.answer_validated(question, policy).await?;
        return print_json(&serde_json::json!({
            "response": answer.session.to_response(),
            "validation": answer.validation,
        }));
    }

    let session = answers.answer(question, policy).await?;
    print_json(&session.to_response())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
