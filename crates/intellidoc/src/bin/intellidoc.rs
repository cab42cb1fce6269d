//! intellidoc command line
//!
//! Run with: cargo run -p intellidoc -- --config ./intellidoc.toml <command>

use anyhow::Context;
use clap::{Parser, Subcommand};
use intellidoc::{AppState, IngestRequest, QueryRequest, QueryResponse, RagConfig};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Ask questions about your documents and get answers with citations
#[derive(Parser)]
#[command(name = "intellidoc", version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a plain-text file (pages separated by form feeds)
    Ingest {
        file: PathBuf,
        /// Override the configured chunk size
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Override the configured chunk overlap
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Ask a single question
    Ask {
        #[arg(long, default_value = "default")]
        session: String,
        /// Number of passages to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        question: String,
    },
    /// Ask questions read line by line from stdin within one session
    Chat {
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// List ingested documents
    List,
    /// Delete a document and its passages
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intellidoc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = RagConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Commands::Ingest {
        chunk_size,
        chunk_overlap,
        ..
    } = &cli.command
    {
        if let Some(size) = chunk_size {
            config.chunking.chunk_size = *size;
        }
        if let Some(overlap) = chunk_overlap {
            config.chunking.chunk_overlap = *overlap;
        }
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Backend: {:?}", config.backend);
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!("  - Data dir: {}", config.storage.data_dir.display());

    let state = AppState::new(config)?;

    match cli.command {
        Commands::Ingest { file, .. } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.display().to_string());

            let summary = state.ingest(IngestRequest::new(filename, text)).await?;
            println!(
                "{}  {}  ({} passages)",
                summary.id, summary.filename, summary.total_chunks
            );
        }
        Commands::Ask {
            session,
            top_k,
            question,
        } => {
            let mut request = QueryRequest::new(session, question);
            request.top_k = top_k;
            print_response(&state.ask(request).await?);
        }
        Commands::Chat { session } => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                match state
                    .ask(QueryRequest::new(session.as_str(), question))
                    .await
                {
                    Ok(response) => print_response(&response),
                    Err(e) => eprintln!("error [{}]: {}", e.code(), e),
                }
            }
        }
        Commands::List => {
            for doc in state.list() {
                println!(
                    "{}  {}  {} passages  {}",
                    doc.id,
                    doc.filename,
                    doc.total_chunks,
                    doc.ingested_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Delete { id } => {
            let summary = state.delete(&id).await?;
            println!("Deleted {} ({})", summary.filename, summary.id);
        }
    }

    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.answer);
    if !response.citations.is_empty() {
        println!();
        for citation in &response.citations {
            println!("  {}", citation.format_inline());
        }
    }
}
