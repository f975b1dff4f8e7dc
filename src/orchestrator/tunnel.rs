//! Public tunnel child process and URL discovery.

use super::LaunchError;
use crate::model::TunnelConfig;
use anyhow::{Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

/// Prefix the tunnel client prints in front of the assigned public URL.
pub(crate) const URL_MARKER: &str = "your url is: ";

/// Read lines until one carries the URL marker and return the trimmed URL after it.
pub(crate) async fn scrape_public_url<R>(lines: &mut Lines<R>) -> Result<String, LaunchError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        if let Some(idx) = line.find(URL_MARKER) {
            let url = line[idx + URL_MARKER.len()..].trim();
            if !url.is_empty() {
                return Ok(url.to_string());
            }
        }
        tracing::debug!(target: "tunnel", "{line}");
    }
    Err(LaunchError::TunnelClosed)
}

/// Start the tunnel client for `port` with its stdout captured.
pub(crate) fn spawn_tunnel(cfg: &TunnelConfig, port: u16) -> Result<Child> {
    let args = cfg.args_for_port(port);
    tracing::info!(program = %cfg.program, ?args, "starting tunnel");
    Command::new(&cfg.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to start tunnel command `{}`", cfg.program))
}

/// Block until the tunnel reports its URL, then keep draining its output.
///
/// The child is left running either way; stopping it is the caller's job.
pub(crate) async fn await_public_url(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<String> {
    let stdout = child
        .stdout
        .take()
        .context("tunnel stdout was not captured")?;
    let mut lines = BufReader::new(stdout).lines();

    let scraped = match timeout {
        Some(limit) => match tokio::time::timeout(limit, scrape_public_url(&mut lines)).await {
            Ok(res) => res,
            Err(_) => Err(LaunchError::TunnelTimeout(limit)),
        },
        None => scrape_public_url(&mut lines).await,
    };
    let public_url = scraped?;

    tokio::spawn(drain(lines));
    Ok(public_url)
}

/// Keep consuming tunnel output so the child never blocks on a full pipe.
async fn drain(mut lines: Lines<BufReader<ChildStdout>>) {
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "tunnel", "{line}");
    }
}
