use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use nalgebra::DVector;

/// Dimension of every embedding the engine stores. Implementation constant;
/// callers must not assume a specific value.
pub const EMBEDDING_DIM: usize = 256;

/// Deterministic feature-hashing embedder.
///
/// Tokens (and adjacent token pairs, to keep a little phrase structure) are
/// hashed into a fixed-dimension vector with a sign trick, then the vector
/// is L2-normalized. Deterministic across runs, so re-ingesting the same
/// text always lands on the same point.
pub struct Embedder {
    dim: usize,
}

impl Embedder {
    pub fn new() -> Self {
        Self { dim: EMBEDDING_DIM }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn embed(&self, text: &str) -> DVector<f32> {
        let mut values = vec![0.0f32; self.dim];
        let tokens = tokenize(text);

        for token in &tokens {
            self.accumulate(&mut values, token);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut values, &format!("{} {}", pair[0], pair[1]));
        }

        let mut vector = DVector::from_vec(values);
        let norm = vector.norm();
        if norm > 0.0 {
            vector /= norm;
        }
        vector
    }

    pub fn embed_batch(&self, texts: &[String]) -> Vec<DVector<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn accumulate(&self, values: &mut [f32], feature: &str) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let hash = hasher.finish();

        let index = (hash % self.dim as u64) as usize;
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        values[index] += sign;
    }
}

impl Default for Embedder {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}
