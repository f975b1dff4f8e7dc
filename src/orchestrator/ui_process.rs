//! App child process: start it on a port and wait until it answers.

use super::LaunchError;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) fn local_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// Start `program serve` in headless mode on `port`, reading its definition
/// from `session_file`. Returns immediately; the child keeps running.
pub(crate) fn launch_ui_process(program: &Path, session_file: &Path, port: u16) -> Result<Child> {
    tracing::info!(port, program = %program.display(), "starting app process");
    Command::new(program)
        .arg("serve")
        .arg("--session-file")
        .arg(session_file)
        .arg("--port")
        .arg(port.to_string())
        .arg("--headless")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to start app process {}", program.display()))
}

/// Poll `/healthz` on the app until it answers with success.
///
/// Fails early if `child` exits, and after `timeout` otherwise.
pub(crate) async fn wait_until_ready(
    mut child: Option<&mut Child>,
    port: u16,
    timeout: Duration,
) -> Result<(), LaunchError> {
    let client = reqwest::Client::builder()
        .timeout(HEALTH_CHECK_TIMEOUT)
        .no_proxy()
        .build()?;
    let url = format!("{}/healthz", local_url(port));
    let start = Instant::now();

    loop {
        if let Some(c) = child.as_mut() {
            if let Some(status) = c.try_wait()? {
                return Err(LaunchError::UiExited(status));
            }
        }

        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(port, elapsed = ?start.elapsed(), "app answered health check");
                return Ok(());
            }
            Ok(resp) => tracing::trace!(status = %resp.status(), "app not ready yet"),
            Err(e) => tracing::trace!("app not reachable yet: {e}"),
        }

        if start.elapsed() >= timeout {
            return Err(LaunchError::NotReady {
                port,
                waited: start.elapsed(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
