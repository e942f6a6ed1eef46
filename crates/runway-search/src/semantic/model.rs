//! all-MiniLM-L6-v2 over ONNX Runtime.
//!
//! The model directory must contain `model.onnx` and `tokenizer.json`. The
//! forward pass yields per-token hidden states which are mean-pooled over the
//! attention mask and L2-normalized.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use super::embedder::{EmbedError, Embedder};

#[cfg(feature = "semantic-ort")]
use anyhow::Context;
#[cfg(feature = "semantic-ort")]
use std::sync::Mutex;

#[cfg(feature = "semantic-ort")]
use ort::{session::Session, value::Tensor};
#[cfg(feature = "semantic-ort")]
use tokenizers::{Tokenizer, TruncationParams};

const MODEL_FILENAME: &str = "model.onnx";
const TOKENIZER_FILENAME: &str = "tokenizer.json";
#[cfg(feature = "semantic-ort")]
const MAX_TOKENS: usize = 256;

/// Sentence embedder backed by an ONNX Runtime session.
pub struct SemanticModel {
    id: String,
    #[cfg(feature = "semantic-ort")]
    session: Mutex<Session>,
    #[cfg(feature = "semantic-ort")]
    tokenizer: Tokenizer,
}

impl SemanticModel {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    ///
    /// # Errors
    ///
    /// Fails when either file is missing, cannot be loaded, or the crate was
    /// built without the `semantic-ort` feature.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let (model_path, tokenizer_path) = Self::model_files(model_dir);
        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                bail!("embedding model file missing: {}", path.display());
            }
        }

        #[cfg(feature = "semantic-ort")]
        {
            let session = Session::builder()
                .context("failed to create ONNX Runtime session builder")?
                .commit_from_file(&model_path)
                .with_context(|| {
                    format!("failed to load semantic model from {}", model_path.display())
                })?;

            let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|err| {
                anyhow::anyhow!("failed to load tokenizer {}: {err}", tokenizer_path.display())
            })?;
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length: MAX_TOKENS,
                    ..TruncationParams::default()
                }))
                .map_err(|err| anyhow::anyhow!("failed to configure truncation: {err}"))?;

            tracing::info!(model = %model_path.display(), "loaded semantic model");
            return Ok(Self {
                id: model_id(model_dir),
                session: Mutex::new(session),
                tokenizer,
            });
        }

        #[cfg(not(feature = "semantic-ort"))]
        {
            let _ = model_id(model_dir);
            bail!("semantic runtime unavailable: compile runway-search with `semantic-ort`");
        }
    }

    /// Paths of the ONNX graph and tokenizer inside `model_dir`.
    #[must_use]
    pub fn model_files(model_dir: &Path) -> (PathBuf, PathBuf) {
        (
            model_dir.join(MODEL_FILENAME),
            model_dir.join(TOKENIZER_FILENAME),
        )
    }

    #[cfg(feature = "semantic-ort")]
    fn infer(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|err| anyhow::anyhow!("tokenization failed: {err}"))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|v| i64::from(*v)).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|v| i64::from(*v))
            .collect();
        let types: Vec<i64> = encoding.get_type_ids().iter().map(|v| i64::from(*v)).collect();
        let seq_len = ids.len();

        let input_ids = Tensor::from_array(([1_usize, seq_len], ids))?;
        let attention_mask = Tensor::from_array(([1_usize, seq_len], mask.clone()))?;
        let token_type_ids = Tensor::from_array(([1_usize, seq_len], types))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
            .context("ONNX forward pass failed")?;

        let (shape, hidden) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("failed to decode ONNX output")?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        let [1, tokens, width] = dims.as_slice() else {
            bail!("unexpected ONNX output shape {dims:?}");
        };
        let tokens = usize::try_from(*tokens).context("token count")?;
        let width = usize::try_from(*width).context("hidden width")?;

        Ok(mean_pool(hidden, &mask, tokens, width))
    }
}

impl Embedder for SemanticModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        #[cfg(feature = "semantic-ort")]
        {
            self.infer(text)
                .map_err(|err| EmbedError::Inference(format!("{err:#}")))
        }

        #[cfg(not(feature = "semantic-ort"))]
        {
            let _ = text;
            Err(EmbedError::Unavailable(
                "compile runway-search with `semantic-ort`".to_string(),
            ))
        }
    }
}

/// Whether a model can be loaded from `model_dir`.
#[must_use]
pub fn is_semantic_available(model_dir: &Path) -> bool {
    SemanticModel::load(model_dir).is_ok()
}

fn model_id(model_dir: &Path) -> String {
    let name = model_dir
        .file_name()
        .map_or_else(|| "model".to_string(), |n| n.to_string_lossy().into_owned());
    format!("onnx:{name}")
}

/// Average token states where `mask` is set, then L2-normalize.
#[cfg_attr(not(feature = "semantic-ort"), allow(dead_code))]
fn mean_pool(hidden: &[f32], mask: &[i64], tokens: usize, width: usize) -> Vec<f32> {
    let mut sum = vec![0.0_f32; width];
    let mut count = 0.0_f32;

    for (token_idx, token) in hidden.chunks_exact(width).take(tokens).enumerate() {
        if mask.get(token_idx).copied().unwrap_or(0) == 0 {
            continue;
        }
        count += 1.0;
        for (acc, value) in sum.iter_mut().zip(token) {
            *acc += value;
        }
    }

    if count > 0.0 {
        for value in &mut sum {
            *value /= count;
        }
    }
    runway_core::model::embedding::l2_normalize(&mut sum);
    sum
}
