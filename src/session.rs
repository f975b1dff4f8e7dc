//! UI/inference session.
//!
//! Holds the two inference capabilities and turns user input (prompt plus the
//! two page choices) into a sentiment status and a generated continuation.

use crate::engine::{SentimentClassifier, TextGenerator};
use crate::model::{
    GeneratedText, GenerationRequest, LengthChoice, SentimentChoice, SentimentResult,
    SentimentStatus, SENTIMENT_MAX_CHARS,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Upper bound on cached sentiment results before the cache is reset.
const SENTIMENT_CACHE_CAP: usize = 256;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error("Please enter a prompt")]
    EmptyPrompt,
    #[error("{0}")]
    Inference(String),
}

pub struct InferenceSession {
    classifier: Arc<dyn SentimentClassifier>,
    generator: Arc<dyn TextGenerator>,
    sentiment_cache: Mutex<HashMap<String, SentimentResult>>,
}

/// First `SENTIMENT_MAX_CHARS` characters of the prompt.
pub fn truncate_for_sentiment(prompt: &str) -> &str {
    match prompt.char_indices().nth(SENTIMENT_MAX_CHARS) {
        Some((idx, _)) => &prompt[..idx],
        None => prompt,
    }
}

/// Effective generation input: the sentiment fragment immediately followed by the raw prompt.
pub fn steered_input(prompt: &str, sentiment: SentimentChoice) -> String {
    let prefix = sentiment.prefix();
    let mut input = String::with_capacity(prefix.len() + prompt.len());
    input.push_str(prefix);
    input.push_str(prompt);
    input
}

impl InferenceSession {
    pub fn new(classifier: Arc<dyn SentimentClassifier>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            classifier,
            generator,
            sentiment_cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &str) -> Option<SentimentResult> {
        self.sentiment_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(key).cloned())
    }

    fn remember(&self, key: &str, result: &SentimentResult) {
        if let Ok(mut cache) = self.sentiment_cache.lock() {
            if cache.len() >= SENTIMENT_CACHE_CAP {
                cache.clear();
            }
            cache.insert(key.to_string(), result.clone());
        }
    }

    /// Score the prompt's sentiment. Repeated calls with the same text reuse the
    /// previous result; failures are reported and never cached.
    pub async fn score_sentiment(&self, prompt: &str) -> SentimentStatus {
        if prompt.is_empty() {
            return SentimentStatus::Pending;
        }
        let text = truncate_for_sentiment(prompt);
        if let Some(hit) = self.cached(text) {
            tracing::trace!(chars = text.chars().count(), "sentiment cache hit");
            return SentimentStatus::Ready(hit);
        }

        match self.classifier.classify(text).await {
            Ok(result) => {
                self.remember(text, &result);
                SentimentStatus::Ready(result)
            }
            Err(e) => {
                tracing::warn!("sentiment scoring failed: {e}");
                SentimentStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Generate a continuation of `prompt` steered toward `sentiment`.
    pub async fn generate(
        &self,
        prompt: &str,
        sentiment: SentimentChoice,
        length: LengthChoice,
    ) -> Result<GeneratedText, GenerateError> {
        if prompt.is_empty() {
            return Err(GenerateError::EmptyPrompt);
        }

        let req = GenerationRequest {
            input: steered_input(prompt, sentiment),
            max_length: length.max_tokens(),
            num_return_sequences: 1,
        };
        tracing::info!(
            sentiment = sentiment.label(),
            max_length = req.max_length,
            "generating text"
        );

        let sequences = self.generator.generate(req).await.map_err(|e| {
            tracing::warn!("text generation failed: {e}");
            GenerateError::Inference(e.to_string())
        })?;
        let text = sequences
            .into_iter()
            .next()
            .ok_or_else(|| GenerateError::Inference("generator returned no text".into()))?;

        Ok(GeneratedText {
            text,
            prompt: prompt.to_string(),
            sentiment,
            length,
            generated_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .ok(),
        })
    }
}
