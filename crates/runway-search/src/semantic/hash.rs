//! Model-free feature-hashing embedder.
//!
//! Each lower-cased word contributes itself plus its character trigrams
//! (padded with a space on both ends). Features are FNV-1a hashed into a
//! signed bucket and the result is L2-normalized. Texts sharing words or
//! word fragments land close together, which is enough for the vector
//! strategies to find spelling variants without an ONNX model.

use runway_core::EMBEDDING_DIM;
use runway_core::model::embedding::l2_normalize;

use super::embedder::{EmbedError, Embedder};

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic FNV-1a feature-hashing embedder.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: EMBEDDING_DIM }
    }
}

impl HashEmbedder {
    pub const ID: &'static str = "hash-fnv1a-v1";

    /// Embed without the `Result` wrapper; hashing cannot fail.
    #[must_use]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0.0_f32; self.dim];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            self.accumulate(&mut out, word.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> = std::iter::once(' ')
                .chain(word.chars())
                .chain(std::iter::once(' '))
                .collect();
            let mut buf = String::with_capacity(12);
            for window in padded.windows(3) {
                buf.clear();
                buf.extend(window);
                self.accumulate(&mut out, buf.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        l2_normalize(&mut out);
        out
    }

    fn accumulate(&self, out: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a_64(feature);
        let bucket = usize::try_from(hash % self.dim as u64).unwrap_or(0);
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        out[bucket] += sign * weight;
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        Self::ID
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.embed_text(text))
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
