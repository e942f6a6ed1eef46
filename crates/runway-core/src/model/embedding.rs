//! Embedding vector helpers shared by the catalog and the vector strategies.
//!
//! Vectors are persisted as JSON arrays of `f32` (the same text form
//! `sqlite-vec`'s `vec_f32()` accepts).

use super::airport::EMBEDDING_DIM;

/// A stored vector that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("malformed embedding JSON: {0}")]
    Malformed(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    #[error("embedding contains non-finite values")]
    NonFinite,
}

/// Encode a vector as a compact JSON array.
#[must_use]
pub fn encode_embedding_json(embedding: &[f32]) -> String {
    let mut encoded = String::with_capacity(embedding.len() * 10 + 2);
    encoded.push('[');
    for (idx, value) in embedding.iter().enumerate() {
        if idx != 0 {
            encoded.push(',');
        }
        encoded.push_str(&value.to_string());
    }
    encoded.push(']');
    encoded
}

/// Decode and validate a stored vector.
///
/// # Errors
///
/// Fails on invalid JSON, a length other than [`EMBEDDING_DIM`], or NaN/inf
/// components.
pub fn decode_embedding_json(raw: &str) -> Result<Vec<f32>, EmbeddingError> {
    let embedding: Vec<f32> =
        serde_json::from_str(raw).map_err(|err| EmbeddingError::Malformed(err.to_string()))?;
    check_embedding(&embedding)?;
    Ok(embedding)
}

/// Validate dimension and finiteness.
///
/// # Errors
///
/// See [`EmbeddingError`].
pub fn check_embedding(embedding: &[f32]) -> Result<(), EmbeddingError> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(EmbeddingError::Dimension {
            expected: EMBEDDING_DIM,
            got: embedding.len(),
        });
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::NonFinite);
    }
    Ok(())
}

/// Cosine similarity in `[-1, 1]`, or `None` when either side has zero norm
/// or the lengths differ.
#[must_use]
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f32> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut left_norm_sq = 0.0_f32;
    let mut right_norm_sq = 0.0_f32;

    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f32::EPSILON {
        return None;
    }

    Some((dot / denom).clamp(-1.0, 1.0))
}

/// Cosine distance (`1 - similarity`), in `[0, 2]`.
#[must_use]
pub fn cosine_distance(left: &[f32], right: &[f32]) -> Option<f32> {
    cosine_similarity(left, right).map(|sim| 1.0 - sim)
}

/// True when the vector has (numerically) zero length; cosine is undefined.
#[must_use]
pub fn is_zero_vector(embedding: &[f32]) -> bool {
    embedding.iter().map(|v| v * v).sum::<f32>() <= f32::EPSILON
}

/// Scale to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(embedding: &mut [f32]) {
    let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in embedding.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(idx: usize, sign: f32) -> Vec<f32> {
        let mut v = vec![0.0_f32; EMBEDDING_DIM];
        v[idx] = sign;
        v
    }

    #[test]
    fn json_roundtrip_preserves_values() {
        let mut v = axis(3, 1.0);
        v[7] = -0.25;
        let decoded = decode_embedding_json(&encode_embedding_json(&v)).expect("decode");
        assert_eq!(decoded, v);
    }

    #[test]
    fn decode_rejects_wrong_dimension() {
        let err = decode_embedding_json("[1.0, 2.0]").unwrap_err();
        assert_eq!(
            err,
            EmbeddingError::Dimension {
                expected: EMBEDDING_DIM,
                got: 2
            }
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_embedding_json("not-json"),
            Err(EmbeddingError::Malformed(_))
        ));
    }

    #[test]
    fn cosine_identities() {
        let a = axis(0, 1.0);
        let b = axis(1, 1.0);
        let c = axis(0, -1.0);
        assert!((cosine_similarity(&a, &a).unwrap_or_default() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &b).unwrap_or(1.0).abs() < 1e-6);
        assert!((cosine_distance(&a, &c).unwrap_or_default() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vectors_have_no_cosine() {
        let zero = vec![0.0_f32; EMBEDDING_DIM];
        assert!(is_zero_vector(&zero));
        assert_eq!(cosine_similarity(&zero, &axis(0, 1.0)), None);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let mut v = vec![3.0_f32, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }
}
