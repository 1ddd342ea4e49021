use thiserror::Error;

/// Error taxonomy for the retrieval pipeline.
///
/// Every stage failure maps to exactly one variant, and the `Display`
/// strings are the user-facing messages: callers can report them
/// directly and the failing stage is identifiable from the kind.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document bytes could not be read as any supported format.
    #[error("failed to extract text from document: {0}")]
    Extraction(String),

    /// The document parsed fine but carries no usable text. Distinct
    /// from `Extraction`: the file is not corrupt, just empty.
    #[error("document contains no extractable text")]
    EmptyDocument,

    /// Invalid parameters or a missing credential.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The embedding service failed after any retries were exhausted.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The answer-generation service failed. Not retried.
    #[error("generation service error: {0}")]
    Generation(String),

    /// `ask` (or retrieval) was called while no index is ready.
    #[error("no document is loaded and ready for questions")]
    NotReady,
}

impl RagError {
    /// True for failures worth retrying at a higher level (a new `load`
    /// attempt may succeed). State-machine misuse is not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingService(_) | RagError::Generation(_) | RagError::Extraction(_)
        )
    }
}
