use crate::chunk::Chunk;
use crate::error::RagError;

/// A chunk returned from a similarity search, with its score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine similarity between the query and the chunk, in [-1, 1].
    pub score: f32,
}

struct IndexEntry {
    chunk: Chunk,
    /// L2-normalized embedding, so cosine similarity is a dot product.
    vector: Vec<f32>,
}

/// In-memory similarity index over one document's chunks.
///
/// Similarity metric: cosine. Vectors are normalized once at build time
/// and search is an exhaustive scan, which is the reference behavior for
/// ranking correctness at single-document sizes. The index is immutable
/// after `build`; a changed document gets a new index, never a mutation.
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dim: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("len", &self.entries.len())
            .field("dim", &self.dim)
            .finish()
    }
}

impl VectorIndex {
    /// Stores one `(chunk, vector)` pair per input, in order.
    /// Fails with `RagError::Configuration` when the inputs are empty,
    /// their lengths differ, or the vectors disagree on dimension.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self, RagError> {
        if chunks.is_empty() || vectors.is_empty() {
            return Err(RagError::Configuration(
                "cannot build an index from zero chunks".to_string(),
            ));
        }
        if chunks.len() != vectors.len() {
            return Err(RagError::Configuration(format!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let dim = vectors[0].len();
        if dim == 0 {
            return Err(RagError::Configuration(
                "embedding vectors must not be empty".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, mut vector) in chunks.into_iter().zip(vectors) {
            if vector.len() != dim {
                return Err(RagError::Configuration(format!(
                    "inconsistent embedding dimensions: expected {}, got {}",
                    dim,
                    vector.len()
                )));
            }
            normalize(&mut vector);
            entries.push(IndexEntry { chunk, vector });
        }

        tracing::debug!(chunks = entries.len(), dim, "Vector index built");
        Ok(Self { entries, dim })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the top-`k` chunks by descending cosine similarity.
    ///
    /// `k` is clamped to the index size. Score ties keep insertion
    /// order (the earlier chunk wins); the sort is stable, so repeated
    /// searches with the same vector return identical orderings.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Vec<RetrievedChunk> {
        let mut query = query_vector.to_vec();
        normalize(&mut query);

        let mut scored: Vec<RetrievedChunk> = self
            .entries
            .iter()
            .map(|entry| RetrievedChunk {
                chunk: entry.chunk.clone(),
                score: dot_product(&query, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k.min(self.entries.len()));
        scored
    }
}

/// Scales `v` to unit length. Zero vectors are left untouched rather
/// than dividing by zero; they score 0 against everything.
pub(crate) fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub(crate) fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
