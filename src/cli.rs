use crate::engine::HfInferenceClient;
use crate::model::{LaunchConfig, LaunchEvent, SessionConfig, TunnelConfig};
use crate::session::InferenceSession;
use crate::web::{self, AppState};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "sentigen",
    version,
    about = "Sentiment-steered text generator with an optional public tunnel"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the generator page on a local port
    Serve(ServeArgs),
    /// Start the app on a free port and expose it through a public tunnel
    Launch(LaunchArgs),
}

#[derive(Debug, Args, Clone)]
pub struct InferenceArgs {
    /// Page title
    #[arg(long, default_value = "AI Text Generator with Sentiment Analysis")]
    pub title: String,

    /// Base URL of the Hugging Face style inference API
    #[arg(
        long,
        env = "SENTIGEN_ENDPOINT",
        default_value = "https://api-inference.huggingface.co"
    )]
    pub endpoint: String,

    /// Model used for sentiment classification
    #[arg(long, default_value = "distilbert-base-uncased-finetuned-sst-2-english")]
    pub sentiment_model: String,

    /// Model used for text generation
    #[arg(long, default_value = "gpt2")]
    pub generation_model: String,

    /// Timeout for a single inference request
    #[arg(long, default_value = "60s")]
    pub request_timeout: humantime::Duration,

    /// Environment variable holding the inference API token
    #[arg(long, default_value = "HF_TOKEN")]
    pub token_env: String,
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub inference: InferenceArgs,

    /// Read the app definition from a session file instead of the flags above
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, default_value_t = 8501)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: IpAddr,

    /// Do not open a browser window once the server is up
    #[arg(long)]
    pub headless: bool,
}

#[derive(Debug, Args, Clone)]
pub struct LaunchArgs {
    #[command(flatten)]
    pub inference: InferenceArgs,

    /// Fixed app port (default: allocate a free one)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for the generated session file
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// How long to wait for the app to answer its health check
    #[arg(long, default_value = "180s")]
    pub ready_timeout: humantime::Duration,

    /// Tunnel command; `{port}` is replaced by the app port
    #[arg(long, default_value = "npx localtunnel --port {port}")]
    pub tunnel_command: String,

    /// How long to wait for the tunnel to print its URL (0s waits forever)
    #[arg(long, default_value = "120s")]
    pub tunnel_timeout: humantime::Duration,

    /// Serve locally only, without a tunnel
    #[arg(long)]
    pub no_tunnel: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    match args.command {
        Command::Serve(serve) => run_serve(serve).await,
        Command::Launch(launch) => run_launch(launch).await,
    }
}

fn user_agent() -> String {
    format!("sentigen/{}", env!("CARGO_PKG_VERSION"))
}

/// Build a `SessionConfig` from CLI arguments.
pub fn build_session(args: &InferenceArgs) -> SessionConfig {
    SessionConfig {
        page_title: args.title.clone(),
        endpoint: args.endpoint.clone(),
        sentiment_model: args.sentiment_model.clone(),
        generation_model: args.generation_model.clone(),
        request_timeout: Duration::from(args.request_timeout),
        token_env: Some(args.token_env.clone()).filter(|s| !s.is_empty()),
        user_agent: user_agent(),
    }
}

fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("sentigen"))
        .unwrap_or_else(std::env::temp_dir)
}

/// Build a `LaunchConfig` from CLI arguments.
pub fn build_launch_config(args: &LaunchArgs) -> Result<LaunchConfig> {
    let tunnel = if args.no_tunnel {
        None
    } else {
        let limit = Duration::from(args.tunnel_timeout);
        let timeout = (!limit.is_zero()).then_some(limit);
        Some(
            TunnelConfig::from_command_line(&args.tunnel_command, timeout)
                .context("--tunnel-command must not be empty")?,
        )
    };

    Ok(LaunchConfig {
        port: args.port,
        work_dir: args.work_dir.clone().unwrap_or_else(default_work_dir),
        ui_program: std::env::current_exe().context("cannot locate the running executable")?,
        session: build_session(&args.inference),
        ready_timeout: Duration::from(args.ready_timeout),
        tunnel,
    })
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let session_cfg = match args.session_file.as_deref() {
        Some(path) => SessionConfig::read_from(path)?,
        None => build_session(&args.inference),
    };

    let client = Arc::new(HfInferenceClient::new(&session_cfg)?);
    tracing::info!(
        endpoint = %session_cfg.endpoint,
        sentiment_model = %session_cfg.sentiment_model,
        generation_model = %session_cfg.generation_model,
        "inference backend configured"
    );
    let state = Arc::new(AppState {
        session: InferenceSession::new(client.clone(), client),
        page_title: session_cfg.page_title,
    });

    let listener = tokio::net::TcpListener::bind((args.bind, args.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", args.bind, args.port))?;
    let addr = listener.local_addr()?;

    if !args.headless {
        let url = format!("http://{addr}");
        if let Err(e) = open::that_detached(&url) {
            tracing::warn!("could not open a browser for {url}: {e}");
        }
    }

    web::serve(listener, state, shutdown_signal(tokio::signal::ctrl_c())).await
}

/// Resolve once `signal` fires. If the handler cannot be installed the
/// server keeps running and must be stopped externally.
async fn shutdown_signal<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::error!("failed to listen for Ctrl-C, serving until killed: {e}");
            futures::future::pending::<()>().await;
        }
    }
}

async fn run_launch(args: LaunchArgs) -> Result<()> {
    let cfg = build_launch_config(&args)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<LaunchEvent>();

    let tunnel_enabled = cfg.tunnel.is_some();
    let printer = tokio::spawn(async move {
        while let Some(ev) = evt_rx.recv().await {
            // URLs are the operator-facing result; progress goes to stderr.
            let line = match &ev {
                LaunchEvent::TunnelReady { .. } => OutputLine::Stdout(ev.to_message()),
                LaunchEvent::UiReady { .. } if !tunnel_enabled => {
                    OutputLine::Stdout(ev.to_message())
                }
                _ => OutputLine::Stderr(ev.to_message()),
            };
            let _ = out_tx.send(line);
        }
    });

    let res = crate::orchestrator::run_launcher(&cfg, evt_tx).await;

    let _ = printer.await;
    let _ = out_handle.await;
    res
}
