//! Inference capabilities.
//!
//! Both models are external: the session only sees the two traits below and
//! never the model internals behind them.

mod hf;

pub use hf::HfInferenceClient;

use crate::model::{GenerationRequest, SentimentResult};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status.
    #[error("inference endpoint returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected inference response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SentimentResult, InferenceError>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the generated sequences, first one first.
    async fn generate(&self, req: GenerationRequest) -> Result<Vec<String>, InferenceError>;
}
