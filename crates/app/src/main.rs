use chrono::Utc;
use clap::{Parser, Subcommand};
use corpus_qa_core::{
    choose_strategy, discover_text_files, document_name_from_path, fingerprint_document,
    AiEndpointConfig, ChatEngine, ChunkStore, ConversationTurn, DocumentPipeline, DocumentStatus,
    DocumentStore, HttpChatModel, HttpEmbedder, RestStore, RetrievalOptions, SegmenterOptions,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "corpus-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the REST data store.
    #[arg(long, env = "CORPUS_STORE_URL", default_value = "http://localhost:3000")]
    store_url: String,

    /// API key for the REST data store.
    #[arg(long, env = "CORPUS_STORE_KEY")]
    store_key: Option<String>,

    /// Base URL of the OpenAI-compatible AI endpoint.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    ai_endpoint: String,

    /// API key for the AI endpoint.
    #[arg(long, env = "OPENAI_API_KEY")]
    ai_key: Option<String>,

    /// Embedding model identifier.
    #[arg(long, default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Embedding vector width.
    #[arg(long, default_value = "1536")]
    embedding_dimensions: usize,

    /// Chat completion model identifier.
    #[arg(long, default_value = "gpt-4o-mini")]
    chat_model: String,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a text file, or every .txt/.md file under a folder, and embed
    /// its chunks.
    Upload {
        /// File or folder to upload.
        #[arg(long)]
        path: PathBuf,
        /// Target chunk size in characters.
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
        /// Characters of context carried between consecutive chunks.
        #[arg(long, default_value = "200")]
        overlap: usize,
    },
    /// Ask a question against the uploaded corpus.
    Ask {
        /// The question text.
        #[arg(long)]
        question: String,
        /// Number of chunk candidates to retrieve.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Minimum similarity for a chunk to count as evidence.
        #[arg(long, default_value = "0.5")]
        min_similarity: f64,
        /// Similarity above which a document counts as a strong match.
        #[arg(long, default_value = "0.6")]
        high_similarity: f64,
    },
    /// Show document and chunk counts.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = RestStore::new(&cli.store_url, cli.store_key.clone())?;
    let ai_config = AiEndpointConfig {
        endpoint: cli.ai_endpoint.clone(),
        api_key: cli.ai_key.clone(),
    };

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "corpus-qa boot"
    );

    match cli.command {
        Command::Upload {
            path,
            chunk_size,
            overlap,
        } => {
            let embedder = HttpEmbedder::new(
                ai_config,
                &cli.embedding_model,
                cli.embedding_dimensions,
            );
            let options = SegmenterOptions {
                chunk_size,
                overlap,
            };
            let pipeline =
                DocumentPipeline::new(store.clone(), store.clone(), embedder, options);

            let files = if path.is_dir() {
                discover_text_files(&path)
            } else {
                vec![path.clone()]
            };

            if files.is_empty() {
                println!("no .txt or .md files found under {}", path.display());
                return Ok(());
            }

            for file in files {
                upload_one(&store, &pipeline, &file).await?;
            }
        }
        Command::Ask {
            question,
            top_k,
            min_similarity,
            high_similarity,
        } => {
            let options = RetrievalOptions {
                min_similarity,
                high_similarity,
                top_k,
                ..RetrievalOptions::default()
            };

            let embedder = HttpEmbedder::new(
                ai_config.clone(),
                &cli.embedding_model,
                cli.embedding_dimensions,
            );
            let chat = HttpChatModel::new(ai_config, &cli.chat_model);
            let strategy = choose_strategy(
                store.clone(),
                store.clone(),
                options.min_similarity,
                options.fetch_limit,
            )
            .await?;

            let engine = ChatEngine::new(
                store.clone(),
                store,
                embedder,
                chat,
                strategy,
                options,
            );

            let history: Vec<ConversationTurn> = Vec::new();
            let answer = engine.answer(&question, &history).await?;

            println!("{}", answer.text);
            if !answer.citations.is_empty() {
                println!();
                println!("Fuentes:");
                for citation in answer.citations {
                    println!("- {}: {}", citation.document_name, citation.excerpt);
                }
            }
        }
        Command::Status => {
            let total = store.count_documents(None).await?;
            let processed = store
                .count_documents(Some(DocumentStatus::Processed))
                .await?;
            let errored = store.count_documents(Some(DocumentStatus::Error)).await?;
            let chunks = store.count_chunks(None).await?;
            let embedded = store.count_embedded().await?;

            println!("documents: {total} total, {processed} processed, {errored} errored");
            println!("chunks: {chunks} total, {embedded} embedded");
        }
    }

    Ok(())
}

async fn upload_one<E>(
    store: &RestStore,
    pipeline: &DocumentPipeline<RestStore, RestStore, E>,
    file: &Path,
) -> anyhow::Result<()>
where
    E: corpus_qa_core::Embedder + Sync,
{
    let name = document_name_from_path(file)?;
    let bytes = tokio::fs::read(file).await?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let document = fingerprint_document(&name, &bytes);
    store.insert_document(&document).await?;

    info!(document_id = %document.id, name = %document.name, "processing upload");
    let report = pipeline.process(&document, &text).await?;

    if !report.claimed {
        warn!(document_id = %document.id, "document was already being processed elsewhere");
        return Ok(());
    }

    println!(
        "{}: {} chunks stored ({} embedded, {} structural skipped, {} embedding failures)",
        document.name,
        report.total_chunks,
        report.embedded_chunks,
        report.structural_skipped,
        report.failed_embeddings
    );
    Ok(())
}
