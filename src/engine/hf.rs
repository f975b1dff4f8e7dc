use super::{InferenceError, SentimentClassifier, TextGenerator};
use crate::model::{GenerationRequest, SentimentResult, SessionConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Client for a Hugging Face style inference API (`POST {endpoint}/models/{model}`).
pub struct HfInferenceClient {
    http: reqwest::Client,
    endpoint: String,
    sentiment_model: String,
    generation_model: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

/// Classification output comes either nested per input or flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
struct GeneratedSequence {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HfInferenceClient {
    pub fn new(cfg: &SessionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .context("failed to build inference HTTP client")?;

        let token = cfg
            .token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|t| !t.trim().is_empty());
        if token.is_none() {
            tracing::debug!("no inference API token configured; sending anonymous requests");
        }

        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            sentiment_model: cfg.sentiment_model.clone(),
            generation_model: cfg.generation_model.clone(),
            token,
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{}", self.endpoint, model)
    }

    async fn post(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, InferenceError> {
        let mut req = self.http.post(self.model_url(model)).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text);
        Err(InferenceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pick the highest-scoring label from a classification response.
fn best_label(resp: ClassifyResponse) -> Result<SentimentResult, InferenceError> {
    let scores = match resp {
        ClassifyResponse::Nested(mut outer) => {
            if outer.is_empty() {
                Vec::new()
            } else {
                outer.swap_remove(0)
            }
        }
        ClassifyResponse::Flat(v) => v,
    };
    scores
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|ls| SentimentResult {
            label: ls.label,
            confidence: ls.score.clamp(0.0, 1.0),
        })
        .ok_or_else(|| InferenceError::Malformed("classifier returned no labels".into()))
}

#[async_trait]
impl SentimentClassifier for HfInferenceClient {
    async fn classify(&self, text: &str) -> Result<SentimentResult, InferenceError> {
        let resp = self
            .post(&self.sentiment_model, json!({ "inputs": text }))
            .await?;
        let parsed: ClassifyResponse = resp
            .json()
            .await
            .map_err(|e| InferenceError::Malformed(e.to_string()))?;
        best_label(parsed)
    }
}

#[async_trait]
impl TextGenerator for HfInferenceClient {
    async fn generate(&self, req: GenerationRequest) -> Result<Vec<String>, InferenceError> {
        let body = json!({
            "inputs": req.input,
            "parameters": {
                "max_length": req.max_length,
                "num_return_sequences": req.num_return_sequences,
            },
        });
        let resp = self.post(&self.generation_model, body).await?;
        let parsed: Vec<GeneratedSequence> = resp
            .json()
            .await
            .map_err(|e| InferenceError::Malformed(e.to_string()))?;
        if parsed.is_empty() {
            return Err(InferenceError::Malformed(
                "generator returned no sequences".into(),
            ));
        }
        Ok(parsed.into_iter().map(|s| s.generated_text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    /// One request as the fake inference endpoint saw it.
    #[derive(Debug, Clone)]
    struct Seen {
        model: String,
        authorization: Option<String>,
        body: serde_json::Value,
    }

    type SeenLog = Arc<Mutex<Vec<Seen>>>;

    async fn fake_model(
        State(log): State<SeenLog>,
        Path(model): Path<String>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Response {
        log.lock().unwrap().push(Seen {
            model: model.clone(),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
        match model.as_str() {
            "gpt2" => Json(json!([{ "generated_text": "steered words" }])).into_response(),
            "sst2" => Json(json!([[
                { "label": "NEGATIVE", "score": 0.1 },
                { "label": "POSITIVE", "score": 0.9 }
            ]]))
            .into_response(),
            "loading" => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Model is loading" })),
            )
                .into_response(),
            _ => (StatusCode::NOT_FOUND, "no such model").into_response(),
        }
    }

    async fn spawn_endpoint() -> (String, SeenLog) {
        let log = SeenLog::default();
        let app = Router::new()
            .route("/models/*model", post(fake_model))
            .with_state(log.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (base, log)
    }

    fn client_for(
        endpoint: &str,
        generation_model: &str,
        token_env: Option<&str>,
    ) -> HfInferenceClient {
        let cfg = SessionConfig {
            page_title: "t".into(),
            endpoint: endpoint.into(),
            sentiment_model: "sst2".into(),
            generation_model: generation_model.into(),
            request_timeout: std::time::Duration::from_secs(5),
            token_env: token_env.map(str::to_string),
            user_agent: "test".into(),
        };
        let mut client = HfInferenceClient::new(&cfg).unwrap();
        // keep loopback traffic away from any proxy configured on the host
        client.http = reqwest::Client::builder().no_proxy().build().unwrap();
        client
    }

    #[tokio::test]
    async fn generate_sends_pipeline_parameters() {
        let (base, log) = spawn_endpoint().await;
        let client = client_for(&base, "gpt2", None);
        let out = client
            .generate(GenerationRequest {
                input: "Here is information: p".into(),
                max_length: 50,
                num_return_sequences: 1,
            })
            .await
            .unwrap();
        assert_eq!(out, vec!["steered words".to_string()]);

        let seen = log.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "gpt2");
        assert_eq!(seen[0].authorization, None);
        assert_eq!(
            seen[0].body,
            json!({
                "inputs": "Here is information: p",
                "parameters": { "max_length": 50, "num_return_sequences": 1 }
            })
        );
    }

    #[tokio::test]
    async fn classify_sends_bearer_token_from_env() {
        let var = "SENTIGEN_TEST_TOKEN_CLASSIFY";
        std::env::set_var(var, "hf_secret");
        let (base, log) = spawn_endpoint().await;
        let client = client_for(&base, "gpt2", Some(var));

        let best = client.classify("lovely day").await.unwrap();
        assert_eq!(best.label, "POSITIVE");
        assert!((best.confidence - 0.9).abs() < 1e-6);

        let seen = log.lock().unwrap();
        assert_eq!(seen[0].model, "sst2");
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer hf_secret"));
        assert_eq!(seen[0].body, json!({ "inputs": "lovely day" }));
    }

    #[tokio::test]
    async fn error_body_becomes_status_message() {
        let (base, _log) = spawn_endpoint().await;
        let client = client_for(&base, "loading", None);
        let err = client
            .generate(GenerationRequest {
                input: "x".into(),
                max_length: 100,
                num_return_sequences: 1,
            })
            .await
            .unwrap_err();
        match err {
            InferenceError::Status { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Model is loading");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_error_body_is_kept_verbatim() {
        let (base, _log) = spawn_endpoint().await;
        let client = client_for(&base, "missing", None);
        let err = client
            .generate(GenerationRequest {
                input: "x".into(),
                max_length: 100,
                num_return_sequences: 1,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "inference endpoint returned 404: no such model"
        );
    }

    #[test]
    fn nested_response_picks_top_score() {
        let raw = r#"[[{"label":"NEGATIVE","score":0.02},{"label":"POSITIVE","score":0.98}]]"#;
        let parsed: ClassifyResponse = serde_json::from_str(raw).unwrap();
        let best = best_label(parsed).unwrap();
        assert_eq!(best.label, "POSITIVE");
        assert!((best.confidence - 0.98).abs() < 1e-6);
    }

    #[test]
    fn flat_response_is_accepted() {
        let raw = r#"[{"label":"NEGATIVE","score":0.7}]"#;
        let parsed: ClassifyResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(best_label(parsed).unwrap().label, "NEGATIVE");
    }

    #[test]
    fn empty_response_is_malformed() {
        let parsed: ClassifyResponse = serde_json::from_str("[]").unwrap();
        assert!(matches!(
            best_label(parsed),
            Err(InferenceError::Malformed(_))
        ));
    }

    #[test]
    fn model_url_ignores_trailing_slash() {
        let cfg = SessionConfig {
            page_title: "t".into(),
            endpoint: "http://localhost:9000/".into(),
            sentiment_model: "s".into(),
            generation_model: "gpt2".into(),
            request_timeout: std::time::Duration::from_secs(5),
            token_env: None,
            user_agent: "test".into(),
        };
        let client = HfInferenceClient::new(&cfg).unwrap();
        assert_eq!(client.model_url("gpt2"), "http://localhost:9000/models/gpt2");
    }
}
