//! Command-line front end for docrag.
//!
//! Each invocation builds a [`DocumentIndexService`] over a
//! [`FileIndexStore`] and runs one caller-facing operation, printing the
//! result as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docrag::hashing::DEFAULT_HASH_DIMENSIONS;
use docrag::openai::OpenAIEmbeddingProvider;
use docrag::{
    DocumentIndexService, EmbeddingProvider, FileIndexStore, HashEmbeddingProvider, RagConfig,
    RetrievalSession,
};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Index documents and retrieve context for questions.
#[derive(Debug, Parser)]
#[command(name = "docrag-cli", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding persisted indexes.
    #[arg(long, env = "DOCRAG_INDEX_DIR", default_value = "indexes", global = true)]
    pub index_dir: PathBuf,

    /// JSON file with chunk_size, chunk_overlap, and top_k.
    #[arg(long, env = "DOCRAG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Maximum chunk size in characters (overrides the config file).
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks (overrides the config file).
    #[arg(long, global = true)]
    pub chunk_overlap: Option<usize>,

    /// Embedding backend.
    #[arg(
        long,
        value_enum,
        env = "DOCRAG_EMBEDDER",
        default_value_t = EmbedderKind::Hash,
        global = true
    )]
    pub embedder: EmbedderKind,

    /// Embedding model name (openai backend).
    #[arg(long, env = "DOCRAG_EMBEDDING_MODEL", global = true)]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible embeddings API.
    #[arg(long, env = "DOCRAG_EMBEDDING_URL", global = true)]
    pub base_url: Option<String>,

    /// API key for the openai backend.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Embedding dimensions.
    #[arg(long, global = true)]
    pub dimensions: Option<usize>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build and persist the index for a document.
    Index {
        #[arg(long)]
        document_id: String,
        /// Text file to index.
        #[arg(long)]
        file: PathBuf,
    },
    /// Retrieve the chunks most relevant to a question.
    Query {
        #[arg(long)]
        document_id: String,
        #[arg(long)]
        question: String,
        /// Number of chunks to retrieve (defaults to the configured top_k).
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Remove a document's index.
    Delete {
        #[arg(long)]
        document_id: String,
    },
    /// Show whether a document is indexed.
    Status {
        #[arg(long)]
        document_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Offline feature-hashing embedder.
    Hash,
    /// OpenAI-compatible embeddings API.
    Openai,
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    // Ignore the error when a subscriber is already installed.
    let _ = if json { builder.json().try_init() } else { builder.try_init() };
}

impl Cli {
    /// Resolve the effective config: file (or defaults), then flag overrides.
    pub fn rag_config(&self) -> Result<RagConfig> {
        let base = match &self.config {
            Some(path) => RagConfig::from_json_file(path)?,
            None => RagConfig::default(),
        };
        let mut builder = RagConfig::builder()
            .chunk_size(self.chunk_size.unwrap_or(base.chunk_size))
            .chunk_overlap(self.chunk_overlap.unwrap_or(base.chunk_overlap))
            .top_k(base.top_k);
        if let Command::Query { k: Some(k), .. } = self.command {
            builder = builder.top_k(k);
        }
        Ok(builder.build()?)
    }

    /// Construct the selected embedding backend.
    pub fn embedding_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        match self.embedder {
            EmbedderKind::Hash => Ok(Arc::new(HashEmbeddingProvider::new(
                self.dimensions.unwrap_or(DEFAULT_HASH_DIMENSIONS),
            )?)),
            EmbedderKind::Openai => {
                let api_key = self
                    .api_key
                    .clone()
                    .context("the openai embedder needs --api-key or OPENAI_API_KEY")?;
                let mut provider = OpenAIEmbeddingProvider::new(api_key)?;
                if let Some(base_url) = &self.base_url {
                    provider = provider.with_base_url(base_url);
                }
                if let Some(model) = &self.model {
                    provider = provider.with_model(model);
                }
                if let Some(dimensions) = self.dimensions {
                    provider = provider.with_dimensions(dimensions);
                }
                Ok(Arc::new(provider))
            }
        }
    }
}

/// Run one command and return its JSON output.
pub async fn run(cli: Cli) -> Result<String> {
    let config = cli.rag_config()?;
    let top_k = config.top_k;
    debug!(?config, index_dir = %cli.index_dir.display(), "resolved configuration");

    let session = RetrievalSession::builder()
        .config(config)
        .embedding_provider(cli.embedding_provider()?)
        .build()?;
    let service =
        DocumentIndexService::new(Arc::new(session), Arc::new(FileIndexStore::new(&cli.index_dir)));

    let output = match &cli.command {
        Command::Index { document_id, file } => {
            let source = tokio::fs::read(file)
                .await
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            let summary = service
                .index_source(document_id, &source)
                .await
                .with_context(|| format!("failed to index document '{document_id}'"))?;
            json!({
                "document_id": document_id,
                "num_chunks": summary.num_chunks,
                "dimension": summary.dimension,
            })
        }
        Command::Query { document_id, question, .. } => {
            let answer = service
                .query_document(document_id, question, top_k)
                .await
                .with_context(|| format!("failed to query document '{document_id}'"))?;
            serde_json::to_value(&answer)?
        }
        Command::Delete { document_id } => {
            service.delete_document(document_id).await?;
            json!({ "document_id": document_id, "deleted": true })
        }
        Command::Status { document_id } => {
            let state = service.state(document_id).await?;
            json!({ "document_id": document_id, "state": state })
        }
    };

    Ok(serde_json::to_string_pretty(&output)?)
}
