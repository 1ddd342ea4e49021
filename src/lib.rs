//! Retrieval-augmented question answering over a single document.
//!
//! The pipeline extracts text from an uploaded document, splits it into
//! overlapping chunks, embeds the chunks, and serves top-k similarity
//! retrieval over the resulting in-memory index; answer composition is
//! delegated to an external chat-completion service. The built index is
//! cached per content fingerprint for the lifetime of the session.

pub mod chunk;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod pipeline;

pub use chunk::{split_text, Chunk};
pub use config::RagConfig;
pub use embeddings::{Embedder, OpenAiEmbedder};
pub use error::RagError;
pub use extract::{DocumentExtractor, TextExtractor};
pub use generation::{ChatClient, Generator};
pub use index::{RetrievedChunk, VectorIndex};
pub use pipeline::{RagPipeline, SessionState};
