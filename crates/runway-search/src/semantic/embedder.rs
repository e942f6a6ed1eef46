use runway_core::EMBEDDING_DIM;

/// Failure to turn text into a vector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbedError {
    #[error("embedder unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("embedder returned {got} values, expected {expected}")]
    Dimension { expected: usize, got: usize },

    #[error("embedder returned non-finite values")]
    NonFinite,
}

/// Maps text to a fixed-length vector.
///
/// Implementations are shared across strategy workers, so they must be
/// `Send + Sync` and internally synchronized when inference needs `&mut`.
pub trait Embedder: Send + Sync {
    /// Stable identifier recorded next to stored vectors; changing the
    /// embedder invalidates them.
    fn id(&self) -> &str;

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Embed one text.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] when inference fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed several texts, in order.
    ///
    /// # Errors
    ///
    /// Fails on the first text that cannot be embedded.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Embed and reject vectors with the wrong length or NaN/inf components.
///
/// # Errors
///
/// Propagates the embedder's error or reports the malformed output.
pub fn embed_checked(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, EmbedError> {
    let embedding = embedder.embed(text)?;
    check_output(&embedding, embedder.dimension())?;
    Ok(embedding)
}

pub(crate) fn check_output(embedding: &[f32], expected: usize) -> Result<(), EmbedError> {
    if embedding.len() != expected {
        return Err(EmbedError::Dimension {
            expected,
            got: embedding.len(),
        });
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(EmbedError::NonFinite);
    }
    Ok(())
}
