use anyhow::{Context, Result};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use ragchat::{
    ChatClient, DocumentExtractor, OpenAiEmbedder, RagConfig, RagPipeline, SessionState,
};

fn get_log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

fn setup_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(get_log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }
    setup_logging();

    let config = RagConfig::from_env()?;
    tracing::info!(
        embedding_model = %config.embedding_model,
        generation_model = %config.generation_model,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        top_k = config.top_k,
        "Configuration loaded"
    );

    let path = std::env::args()
        .nth(1)
        .context("usage: ragchat <document.pdf|document.txt>")?;
    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read document {path}"))?;

    let embedder = OpenAiEmbedder::new(&config)?;
    let generator = ChatClient::new(&config)?;
    let mut pipeline = RagPipeline::new(DocumentExtractor, embedder, generator, config)?;

    tracing::info!("Indexing {}...", path);
    pipeline.load(&data).await?;
    if let SessionState::Ready(doc) = pipeline.state() {
        tracing::info!(
            chunks = doc.chunk_count(),
            fingerprint = %doc.fingerprint(),
            "Document indexed"
        );
    }
    tracing::info!("Ready. Type a question and press Enter (Ctrl-D to exit).");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        match pipeline.ask(query).await {
            Ok(answer) => println!("{answer}\n"),
            Err(e) if e.is_retryable() => eprintln!("error: {e} (transient, try again)"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}
