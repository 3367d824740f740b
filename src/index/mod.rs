//! In-memory vector index: an HNSW graph plus the chunk table addressed by node id.

pub mod distance;
mod hnsw;

pub use hnsw::{HnswGraph, HnswParams, Neighbor};

use crate::processing::DocumentChunk;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Index shared between request handlers.
pub type SharedIndex = Arc<RwLock<VectorIndex>>;

/// Errors raised while inserting into or querying the index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Batch supplied a different number of vectors and chunks.
    #[error("received {vectors} vectors for {chunks} chunks")]
    LengthMismatch {
        /// Number of vectors supplied.
        vectors: usize,
        /// Number of chunks supplied.
        chunks: usize,
    },
    /// Vector dimension does not match the index.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the index.
        expected: usize,
        /// Dimension of the rejected vector.
        actual: usize,
    },
    /// Vector had no components.
    #[error("vector is empty")]
    EmptyVector,
    /// Vector contained NaN or infinity.
    #[error("vector contains non-finite components")]
    NonFiniteComponent,
    /// Id space exhausted.
    #[error("index capacity exceeded")]
    CapacityExceeded,
}

/// Outcome of [`VectorIndex::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AddSummary {
    /// Entries appended by this call.
    pub count: usize,
    /// Entries held by the index after this call.
    pub total: usize,
}

/// Append-only HNSW index that stores the chunk text behind every vector.
#[derive(Debug)]
pub struct VectorIndex {
    graph: HnswGraph,
    chunks: Vec<DocumentChunk>,
}

impl VectorIndex {
    /// Create an empty index.
    pub fn new(params: HnswParams) -> Self {
        tracing::debug!(
            m = params.m,
            ef_construction = params.ef_construction,
            ef_search = params.ef_search,
            "HNSW index initialized"
        );
        Self {
            graph: HnswGraph::new(params),
            chunks: Vec::new(),
        }
    }

    /// Wrap a fresh index for sharing across tasks.
    pub fn shared(params: HnswParams) -> SharedIndex {
        Arc::new(RwLock::new(Self::new(params)))
    }

    /// Append `vectors` with their `chunks`; ids continue from the current total.
    ///
    /// The batch is validated before the first insert, so a rejected batch leaves the index
    /// unchanged.
    pub fn add(
        &mut self,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<DocumentChunk>,
    ) -> Result<AddSummary, IndexError> {
        if vectors.len() != chunks.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }
        let batch_dimension = vectors.first().map(Vec::len);
        for vector in &vectors {
            self.graph.check_vector(vector, batch_dimension)?;
        }

        let count = chunks.len();
        for (vector, chunk) in vectors.into_iter().zip(chunks) {
            let id = self.graph.insert(vector)?;
            debug_assert_eq!(id as usize, self.chunks.len());
            self.chunks.push(chunk);
        }

        Ok(AddSummary {
            count,
            total: self.chunks.len(),
        })
    }

    /// Return up to `k` chunks ordered by ascending distance to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<DocumentChunk>, IndexError> {
        if self.graph.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.graph.check_vector(query, None)?;

        Ok(self
            .graph
            .search(query, k)
            .into_iter()
            .filter_map(|neighbor| self.chunks.get(neighbor.id as usize).cloned())
            .collect())
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether nothing has been indexed yet.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector dimension, once the first vector has been added.
    pub fn dimension(&self) -> Option<usize> {
        self.graph.dimension()
    }

    /// HNSW parameters of the underlying graph.
    pub fn params(&self) -> HnswParams {
        self.graph.params()
    }
}
