//! Text embedding for the trend pipeline.
//!
//! The clustering engine only depends on [`EmbeddingProvider`]; the shipped
//! implementation runs a sentence-transformer MiniLM model locally on candle.

mod minilm;
pub mod vector;

pub use minilm::MiniLmEmbedder;

use trend_core::CoreError;

/// Maps texts to fixed-dimension vectors, one per input and in input order.
pub trait EmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError>;
}
