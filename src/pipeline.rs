use sha2::{Digest, Sha256};

use crate::chunk::split_text;
use crate::config::RagConfig;
use crate::embeddings::Embedder;
use crate::error::RagError;
use crate::extract::TextExtractor;
use crate::generation::Generator;
use crate::index::{RetrievedChunk, VectorIndex};

/// Session state machine: `Empty → Building → Ready`, with a new
/// document re-entering `Building` and any stage failure landing in
/// `Failed` (from which a retried `load` re-enters `Building`).
#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    Empty,
    Building,
    Ready(IndexedDocument),
    Failed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Building => "building",
            SessionState::Ready(_) => "ready",
            SessionState::Failed => "failed",
        }
    }
}

/// The built index together with the fingerprint of the document it was
/// built from. Replaced wholesale when the document changes.
#[derive(Debug)]
pub struct IndexedDocument {
    fingerprint: String,
    index: VectorIndex,
}

impl IndexedDocument {
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }
}

/// Orchestrates extract → chunk → embed → index and owns the cached
/// index for the current document.
///
/// `load` is memoized on the document's content fingerprint: re-loading
/// the identical document performs no extraction or embedding work.
/// The pipeline is the sole writer of its index and replaces it (never
/// mutates it) when the document changes, so no partial index is ever
/// queryable.
///
/// One in-flight `load`/`ask` per session: `load` takes `&mut self`, so
/// a host serving concurrent requests wraps the pipeline in
/// `Arc<RwLock<…>>` and serializes writes through it.
pub struct RagPipeline<X, E, G> {
    extractor: X,
    embedder: E,
    generator: G,
    config: RagConfig,
    state: SessionState,
}

impl<X, E, G> RagPipeline<X, E, G>
where
    X: TextExtractor,
    E: Embedder,
    G: Generator,
{
    pub fn new(extractor: X, embedder: E, generator: G, config: RagConfig) -> Result<Self, RagError> {
        config.validate()?;
        Ok(Self {
            extractor,
            embedder,
            generator,
            config,
            state: SessionState::Empty,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Deterministic content identity for cache keys.
    pub fn fingerprint(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    /// Indexes `data`, replacing any previously loaded document.
    ///
    /// If the session is already `Ready` for this exact content, this
    /// is a no-op: no extraction, chunking, or embedding happens again.
    /// On any stage failure the session transitions to `Failed`, the
    /// first error is surfaced, and nothing remains queryable.
    pub async fn load(&mut self, data: &[u8]) -> Result<(), RagError> {
        let fingerprint = Self::fingerprint(data);

        if let SessionState::Ready(doc) = &self.state {
            if doc.fingerprint == fingerprint {
                tracing::info!(
                    fingerprint = %fingerprint,
                    "Document unchanged since last load, index reused"
                );
                return Ok(());
            }
            tracing::info!("Document changed, discarding previous index");
        }

        self.state = SessionState::Building;
        tracing::info!(bytes = data.len(), fingerprint = %fingerprint, "Indexing document");

        match self.build_index(data).await {
            Ok(index) => {
                tracing::info!(chunks = index.len(), "Document indexed and ready");
                self.state = SessionState::Ready(IndexedDocument { fingerprint, index });
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Indexing failed");
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn build_index(&self, data: &[u8]) -> Result<VectorIndex, RagError> {
        let text = self.extractor.extract(data).await?;
        if text.trim().is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let chunks = split_text(&text, self.config.chunk_size, self.config.chunk_overlap)?;
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }
        tracing::debug!(chunks = chunks.len(), "Text chunked");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        tracing::debug!(vectors = vectors.len(), "Chunks embedded");

        VectorIndex::build(chunks, vectors)
    }

    /// Returns the top-`k` chunks for `query` without generation.
    /// Fails with `NotReady` unless a document is indexed.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RagError> {
        let doc = match &self.state {
            SessionState::Ready(doc) => doc,
            _ => return Err(RagError::NotReady),
        };

        let query_vector = self.embedder.embed_one(query).await?;
        let results = doc.index.search(&query_vector, k);
        tracing::debug!(
            query = %query,
            results = results.len(),
            top_score = results.first().map(|r| r.score).unwrap_or(0.0),
            "Retrieved chunks"
        );
        Ok(results)
    }

    /// Answers `query` from the loaded document: embeds the query,
    /// retrieves the configured top-k chunks, and delegates to the
    /// generation collaborator. The answer is returned verbatim;
    /// generation failures are surfaced without retry.
    pub async fn ask(&self, query: &str) -> Result<String, RagError> {
        if !self.is_ready() {
            return Err(RagError::NotReady);
        }

        let context = self.retrieve(query, self.config.top_k).await?;
        self.generator.complete(query, &context).await
    }
}
