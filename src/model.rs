use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of characters of a prompt handed to the sentiment classifier.
pub const SENTIMENT_MAX_CHARS: usize = 512;

/// Sentiment the generated continuation should lean toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SentimentChoice {
    #[default]
    Positive,
    Negative,
    Neutral,
}

impl SentimentChoice {
    pub const ALL: [SentimentChoice; 3] = [
        SentimentChoice::Positive,
        SentimentChoice::Negative,
        SentimentChoice::Neutral,
    ];

    /// Fixed sentence fragment prepended to the prompt before generation.
    pub fn prefix(self) -> &'static str {
        match self {
            SentimentChoice::Positive => "This is wonderful and amazing. ",
            SentimentChoice::Negative => "This is unfortunate and sad. ",
            SentimentChoice::Neutral => "Here is information: ",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SentimentChoice::Positive => "Positive",
            SentimentChoice::Negative => "Negative",
            SentimentChoice::Neutral => "Neutral",
        }
    }
}

/// Requested output length, mapped to a token ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LengthChoice {
    Short,
    #[default]
    Medium,
    Long,
}

impl LengthChoice {
    pub const ALL: [LengthChoice; 3] = [LengthChoice::Short, LengthChoice::Medium, LengthChoice::Long];

    pub fn max_tokens(self) -> u32 {
        match self {
            LengthChoice::Short => 50,
            LengthChoice::Medium => 100,
            LengthChoice::Long => 150,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LengthChoice::Short => "Short",
            LengthChoice::Medium => "Medium",
            LengthChoice::Long => "Long",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: String,
    /// Classifier score in [0, 1].
    pub confidence: f32,
}

impl SentimentResult {
    /// Confidence formatted as a percentage with two decimals, e.g. `"99.87% confidence"`.
    pub fn confidence_text(&self) -> String {
        format!("{:.2}% confidence", self.confidence * 100.0)
    }
}

/// Outcome of scoring the current prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SentimentStatus {
    /// No prompt yet; nothing was scored.
    Pending,
    Failed { reason: String },
    Ready(SentimentResult),
}

/// A single request to the text generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub input: String,
    pub max_length: u32,
    pub num_return_sequences: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,
    pub prompt: String,
    pub sentiment: SentimentChoice,
    pub length: LengthChoice,
    /// RFC 3339 UTC timestamp; absent if the clock could not be formatted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

/// App definition written by the launcher and read by the `serve` child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub page_title: String,
    pub endpoint: String,
    pub sentiment_model: String,
    pub generation_model: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Name of the environment variable holding the API token, if any.
    #[serde(default)]
    pub token_env: Option<String>,
    pub user_agent: String,
}

impl SessionConfig {
    pub fn read_from(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid session file {}", path.display()))
    }

    pub fn write_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        use anyhow::Context;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let out = serde_json::to_string_pretty(self)?;
        std::fs::write(path, out)
            .with_context(|| format!("failed to write session file {}", path.display()))
    }
}

/// Everything the launcher needs to stand the app up behind a public URL.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Fixed port; a free one is allocated when unset.
    pub port: Option<u16>,
    pub work_dir: PathBuf,
    /// Executable started as the app process (normally this binary).
    pub ui_program: PathBuf,
    pub session: SessionConfig,
    pub ready_timeout: Duration,
    /// `None` serves locally only.
    pub tunnel: Option<TunnelConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TunnelConfig {
    pub program: String,
    /// Arguments; `{port}` is replaced by the app port.
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl TunnelConfig {
    /// Parse a whitespace separated command line such as `npx localtunnel --port {port}`.
    pub fn from_command_line(line: &str, timeout: Option<Duration>) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }

    pub fn args_for_port(&self, port: u16) -> Vec<String> {
        let port = port.to_string();
        self.args.iter().map(|a| a.replace("{port}", &port)).collect()
    }
}

/// Progress events emitted by the launcher and consumed by the CLI layer.
#[derive(Debug, Clone)]
pub enum LaunchEvent {
    PortAllocated { port: u16 },
    SessionWritten { path: PathBuf },
    UiStarted { pid: Option<u32> },
    UiReady { local_url: String },
    TunnelStarted { pid: Option<u32> },
    TunnelReady { public_url: String },
    Info(String),
}

impl LaunchEvent {
    /// Render a human-readable message for the CLI.
    pub fn to_message(&self) -> String {
        match self {
            LaunchEvent::PortAllocated { port } => format!("App will listen on port {port}"),
            LaunchEvent::SessionWritten { path } => {
                format!("Session definition written to {}", path.display())
            }
            LaunchEvent::UiStarted { pid } => match pid {
                Some(pid) => format!("App process started (pid {pid})"),
                None => "App process started".to_string(),
            },
            LaunchEvent::UiReady { local_url } => format!("App is ready at {local_url}"),
            LaunchEvent::TunnelStarted { pid } => match pid {
                Some(pid) => format!("Tunnel process started (pid {pid})"),
                None => "Tunnel process started".to_string(),
            },
            LaunchEvent::TunnelReady { public_url } => {
                format!("Your app is live at: {public_url}")
            }
            LaunchEvent::Info(msg) => msg.clone(),
        }
    }
}
