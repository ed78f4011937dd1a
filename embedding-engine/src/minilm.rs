use crate::EmbeddingProvider;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use std::path::{Path, PathBuf};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};
use trend_core::{CoreError, EmbeddingError};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Sentence embeddings from a BERT-family MiniLM checkpoint (e.g. all-MiniLM-L6-v2).
///
/// Vectors are attention-mask mean pooled and L2-normalized, matching the
/// sentence-transformers pipeline for this model family.
pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    batch_size: usize,
    model_dir: PathBuf,
}

impl MiniLmEmbedder {
    pub fn load(
        model_dir: impl AsRef<Path>,
        batch_size: usize,
        max_tokens: usize,
    ) -> Result<Self, CoreError> {
        let model_dir = model_dir.as_ref();
        let config_path = require_file(model_dir, CONFIG_FILE)?;
        let tokenizer_path = require_file(model_dir, TOKENIZER_FILE)?;
        let weights_path = require_file(model_dir, WEIGHTS_FILE)?;

        info!("Loading embedding model from {}", model_dir.display());

        let config_text = std::fs::read_to_string(&config_path)?;
        let config: Config =
            serde_json::from_str(&config_text).map_err(|e| load_failed(&config_path, e))?;

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| load_failed(&tokenizer_path, e))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(|e| load_failed(&tokenizer_path, e))?;

        let device = Device::Cpu;
        // SAFETY: the weights file is memory-mapped read-only and not modified while loaded.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.clone()], DTYPE, &device)
                .map_err(|e| load_failed(&weights_path, e))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| load_failed(&weights_path, e))?;

        info!("Embedding model ready (batch size {})", batch_size);

        Ok(Self {
            model,
            tokenizer,
            device,
            batch_size: batch_size.max(1),
            model_dir: model_dir.to_path_buf(),
        })
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self.tokenizer.encode_batch(inputs, true).map_err(|e| {
            EmbeddingError::TokenizationFailed {
                reason: e.to_string(),
            }
        })?;

        let pooled = self
            .forward_pooled(&encodings)
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: e.to_string(),
            })?;
        Ok(pooled)
    }

    fn forward_pooled(
        &self,
        encodings: &[tokenizers::Encoding],
    ) -> candle_core::Result<Vec<Vec<f32>>> {
        let mut ids = Vec::with_capacity(encodings.len());
        let mut type_ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());

        for encoding in encodings {
            ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            type_ids.push(Tensor::new(encoding.get_type_ids(), &self.device)?);
            masks.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
        }

        let input_ids = Tensor::stack(&ids, 0)?;
        let token_type_ids = Tensor::stack(&type_ids, 0)?;
        let mask = Tensor::stack(&masks, 0)?.to_dtype(DTYPE)?.unsqueeze(2)?;

        // (batch, seq, hidden)
        let hidden = self.model.forward(&input_ids, &token_type_ids)?;

        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        pooled.broadcast_div(&norms)?.to_vec2::<f32>()
    }
}

impl EmbeddingProvider for MiniLmEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (index, chunk) in texts.chunks(self.batch_size).enumerate() {
            debug!("Embedding batch {} ({} texts)", index, chunk.len());
            vectors.extend(self.embed_chunk(chunk)?);
        }

        debug!("Embedded {} texts", vectors.len());
        Ok(vectors)
    }
}

fn require_file(model_dir: &Path, name: &str) -> Result<PathBuf, CoreError> {
    let path = model_dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(EmbeddingError::ModelNotFound {
            model_name: path.display().to_string(),
        }
        .into())
    }
}

fn load_failed(path: &Path, error: impl std::fmt::Display) -> CoreError {
    EmbeddingError::ModelLoadingFailed {
        model_path: format!("{}: {}", path.display(), error),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_directory_is_reported() {
        let dir = std::env::temp_dir().join("trend-hunter-missing-model");
        let result = MiniLmEmbedder::load(&dir, 32, 256);

        match result {
            Err(CoreError::Embedding(EmbeddingError::ModelNotFound { model_name })) => {
                assert!(model_name.ends_with(CONFIG_FILE));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("loading from a missing directory must fail"),
        }
    }
}
