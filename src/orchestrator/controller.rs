//! Launch lifecycle controller.
//!
//! Owns the start/ready/publish/shutdown sequence and emits events for the
//! presentation layer.

use super::port::allocate_free_port;
use super::tunnel::{await_public_url, spawn_tunnel};
use super::ui_process::{launch_ui_process, local_url, wait_until_ready};
use crate::model::{LaunchConfig, LaunchEvent};
use anyhow::{Context, Result};
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Child;
use tokio::sync::mpsc::UnboundedSender;

/// Which child stopped first.
#[derive(Debug)]
pub(crate) enum ChildExit {
    Ui(ExitStatus),
    Tunnel(ExitStatus),
}

/// Handles for a launched app and its optional tunnel.
pub(crate) struct Deployment {
    pub port: u16,
    pub session_file: PathBuf,
    pub public_url: Option<String>,
    ui: Child,
    tunnel: Option<Child>,
}

impl Deployment {
    pub fn local_url(&self) -> String {
        local_url(self.port)
    }

    /// Wait until either child exits on its own.
    pub async fn wait_any(&mut self) -> std::io::Result<ChildExit> {
        let ui = &mut self.ui;
        let tunnel = self.tunnel.as_mut();
        tokio::select! {
            status = ui.wait() => status.map(ChildExit::Ui),
            status = async {
                match tunnel {
                    Some(t) => t.wait().await,
                    None => futures::future::pending().await,
                }
            } => status.map(ChildExit::Tunnel),
        }
    }

    /// Stop the tunnel, then the app, and reap both.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(mut tunnel) = self.tunnel.take() {
            stop_child(&mut tunnel, "tunnel").await?;
        }
        stop_child(&mut self.ui, "app").await?;
        discard_session_file(&self.session_file).await;
        Ok(())
    }
}

async fn discard_session_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!("could not remove {}: {e}", path.display());
    }
}

async fn stop_child(child: &mut Child, what: &str) -> Result<()> {
    // Already exited children reject the kill; waiting still reaps them.
    let _ = child.start_kill();
    let status = child
        .wait()
        .await
        .with_context(|| format!("failed to reap {what} process"))?;
    tracing::info!("{what} process stopped ({status})");
    Ok(())
}

/// Random suffix so concurrent launches never share a session file.
fn gen_launch_id() -> String {
    let mut b = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut b);
    format!("{:08x}", u32::from_le_bytes(b))
}

/// Start the app, wait for it to answer, then open the tunnel.
pub(crate) async fn launch(
    cfg: &LaunchConfig,
    event_tx: &UnboundedSender<LaunchEvent>,
) -> Result<Deployment> {
    let port = match cfg.port {
        Some(p) => p,
        None => allocate_free_port()?,
    };
    let _ = event_tx.send(LaunchEvent::PortAllocated { port });

    let session_file = cfg
        .work_dir
        .join(format!("sentigen-session-{}.json", gen_launch_id()));
    cfg.session.write_to(&session_file)?;
    let _ = event_tx.send(LaunchEvent::SessionWritten {
        path: session_file.clone(),
    });

    let mut ui = match launch_ui_process(&cfg.ui_program, &session_file, port) {
        Ok(child) => child,
        Err(e) => {
            discard_session_file(&session_file).await;
            return Err(e);
        }
    };
    let _ = event_tx.send(LaunchEvent::UiStarted { pid: ui.id() });

    if let Err(e) = wait_until_ready(Some(&mut ui), port, cfg.ready_timeout).await {
        if let Err(kill_err) = ui.kill().await {
            tracing::debug!("could not stop app process: {kill_err}");
        }
        discard_session_file(&session_file).await;
        return Err(e).context("app process did not become ready");
    }
    let _ = event_tx.send(LaunchEvent::UiReady {
        local_url: local_url(port),
    });

    let mut deployment = Deployment {
        port,
        session_file,
        public_url: None,
        ui,
        tunnel: None,
    };

    if let Some(tunnel_cfg) = cfg.tunnel.as_ref() {
        let _ = event_tx.send(LaunchEvent::Info(format!(
            "Exposing port {port} with {}...",
            tunnel_cfg.program
        )));
        let child = match spawn_tunnel(tunnel_cfg, port) {
            Ok(child) => child,
            Err(e) => {
                let _ = deployment.shutdown().await;
                return Err(e);
            }
        };
        let _ = event_tx.send(LaunchEvent::TunnelStarted { pid: child.id() });
        let tunnel = deployment.tunnel.insert(child);

        match await_public_url(tunnel, tunnel_cfg.timeout).await {
            Ok(public_url) => {
                let _ = event_tx.send(LaunchEvent::TunnelReady {
                    public_url: public_url.clone(),
                });
                deployment.public_url = Some(public_url);
            }
            Err(e) => {
                let _ = deployment.shutdown().await;
                return Err(e.context("failed to publish tunnel"));
            }
        }
    }

    Ok(deployment)
}

/// Launch, then keep both children alive until Ctrl-C or until one of them exits.
pub(crate) async fn run_launcher(
    cfg: &LaunchConfig,
    event_tx: UnboundedSender<LaunchEvent>,
) -> Result<()> {
    let mut deployment = launch(cfg, &event_tx).await?;
    tracing::info!(
        local = %deployment.local_url(),
        public = deployment.public_url.as_deref().unwrap_or("-"),
        "deployment is up; press Ctrl-C to stop"
    );

    let outcome = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for Ctrl-C")?;
            let _ = event_tx.send(LaunchEvent::Info("Shutting down…".into()));
            None
        }
        exit = deployment.wait_any() => Some(exit.context("failed to wait on child processes")?),
    };

    if let Some(exit) = &outcome {
        let msg = match exit {
            ChildExit::Ui(status) => format!("App process exited ({status}); stopping"),
            ChildExit::Tunnel(status) => format!("Tunnel process exited ({status}); stopping"),
        };
        tracing::warn!("{msg}");
        let _ = event_tx.send(LaunchEvent::Info(msg));
    }

    deployment.shutdown().await?;

    match outcome {
        Some(ChildExit::Ui(status)) if !status.success() => {
            anyhow::bail!("app process failed ({status})")
        }
        _ => Ok(()),
    }
}
