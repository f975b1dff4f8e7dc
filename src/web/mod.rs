//! HTTP surface of the inference session.
//!
//! Serves the interactive page plus a small JSON API. `/healthz` is the
//! readiness signal the launcher polls before opening the tunnel.

mod page;

pub(crate) use page::PageView;

use crate::model::{LengthChoice, SentimentChoice};
use crate::session::{GenerateError, InferenceSession};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

pub(crate) struct AppState {
    pub session: InferenceSession,
    pub page_title: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FormAction {
    #[default]
    Analyze,
    Generate,
}

#[derive(Debug, Deserialize)]
struct PageForm {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    sentiment: SentimentChoice,
    #[serde(default)]
    length: LengthChoice,
    #[serde(default)]
    action: FormAction,
}

#[derive(Debug, Deserialize)]
struct SentimentBody {
    #[serde(default)]
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    sentiment: SentimentChoice,
    #[serde(default)]
    length: LengthChoice,
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/api/sentiment", post(api_sentiment))
        .route("/api/generate", post(api_generate))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve the app on an already bound listener until `shutdown` resolves.
pub(crate) async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    tracing::info!("serving on http://{addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(PageView::empty(&state.page_title).render())
}

async fn submit(State(state): State<Arc<AppState>>, Form(form): Form<PageForm>) -> Html<String> {
    let sentiment_status = state.session.score_sentiment(&form.prompt).await;
    let generation = match form.action {
        FormAction::Analyze => None,
        FormAction::Generate => Some(
            state
                .session
                .generate(&form.prompt, form.sentiment, form.length)
                .await,
        ),
    };

    let view = PageView {
        title: &state.page_title,
        prompt: &form.prompt,
        sentiment: form.sentiment,
        length: form.length,
        sentiment_status,
        generation,
    };
    Html(view.render())
}

async fn api_sentiment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SentimentBody>,
) -> Response {
    Json(state.session.score_sentiment(&body.prompt).await).into_response()
}

async fn api_generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateBody>,
) -> Response {
    match state
        .session
        .generate(&body.prompt, body.sentiment, body.length)
        .await
    {
        Ok(out) => Json(out).into_response(),
        Err(e) => {
            let status = match e {
                GenerateError::EmptyPrompt => StatusCode::UNPROCESSABLE_ENTITY,
                GenerateError::Inference(_) => StatusCode::BAD_GATEWAY,
            };
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{RecordingClassifier, RecordingGenerator};

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    async fn spawn_app(
        classifier: Arc<RecordingClassifier>,
        generator: Arc<RecordingGenerator>,
    ) -> (String, tokio::sync::oneshot::Sender<()>) {
        let state = Arc::new(AppState {
            session: InferenceSession::new(classifier, generator),
            page_title: "Test Generator".into(),
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(serve(listener, state, async move {
            let _ = rx.await;
        }));
        (base, tx)
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (base, _stop) = spawn_app(Arc::default(), Arc::default()).await;
        let body = client()
            .get(format!("{base}/healthz"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn index_shows_awaiting_input() {
        let (base, _stop) = spawn_app(Arc::default(), Arc::default()).await;
        let html = client().get(&base).send().await.unwrap().text().await.unwrap();
        assert!(html.contains("Test Generator"));
        assert!(html.contains("Enter a prompt to analyze sentiment"));
    }

    #[tokio::test]
    async fn form_generate_renders_output() {
        let generator = Arc::new(RecordingGenerator::default());
        let (base, _stop) = spawn_app(Arc::default(), generator.clone()).await;
        let html = client()
            .post(&base)
            .form(&[
                ("prompt", "Robots <3 cats"),
                ("sentiment", "Negative"),
                ("length", "Long"),
                ("action", "generate"),
            ])
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(html.contains("Text generated successfully!"));
        assert!(html.contains("This is unfortunate and sad. Robots &lt;3 cats and then some"));
        assert!(html.contains("75.00% confidence"));
        assert_eq!(generator.seen.lock().unwrap()[0].max_length, 150);
    }

    #[tokio::test]
    async fn form_generate_with_empty_prompt_is_rejected() {
        let generator = Arc::new(RecordingGenerator::default());
        let (base, _stop) = spawn_app(Arc::default(), generator.clone()).await;
        let html = client()
            .post(&base)
            .form(&[("prompt", ""), ("action", "generate")])
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(html.contains("Please enter a prompt"));
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_generate_maps_errors_to_status() {
        let failing = Arc::new(RecordingGenerator {
            fail: true,
            ..Default::default()
        });
        let (base, _stop) = spawn_app(Arc::default(), failing).await;
        let client = client();

        let resp = client
            .post(format!("{base}/api/generate"))
            .json(&json!({ "prompt": "" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), StatusCode::UNPROCESSABLE_ENTITY.as_u16());

        let resp = client
            .post(format!("{base}/api/generate"))
            .json(&json!({ "prompt": "hi", "sentiment": "Neutral", "length": "Short" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), StatusCode::BAD_GATEWAY.as_u16());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "inference endpoint returned 500: CUDA out of memory");
    }

    #[tokio::test]
    async fn api_sentiment_returns_tagged_status() {
        let (base, _stop) = spawn_app(Arc::default(), Arc::default()).await;
        let body: serde_json::Value = client()
            .post(format!("{base}/api/sentiment"))
            .json(&json!({ "prompt": "great stuff" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ready");
        assert_eq!(body["label"], "POSITIVE");
    }
}
