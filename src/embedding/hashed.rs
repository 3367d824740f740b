use super::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;

/// Deterministic offline embedding client.
///
/// Bytes are folded into `dimension` slots and the result is L2-normalized. Texts sharing many
/// bytes in similar positions land close together, which is enough for demos and tests but
/// carries no semantics.
#[derive(Debug, Clone, Copy)]
pub struct HashedEmbeddingClient {
    dimension: usize,
}

impl HashedEmbeddingClient {
    /// Construct a client producing vectors of `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];
        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            // Mix the position in so anagrams do not collide.
            let slot = (usize::from(byte).wrapping_mul(31) + idx) % self.dimension;
            embedding[slot] += f32::from(byte) / 255.0;
        }

        let norm = embedding.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashedEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }
}
