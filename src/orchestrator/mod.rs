//! Launcher orchestration.
//!
//! Owns the app child process and the tunnel child process: port allocation,
//! readiness, public URL discovery and shutdown. The CLI layer only consumes
//! the emitted `LaunchEvent`s.

mod controller;
mod port;
mod tunnel;
mod ui_process;

pub(crate) use controller::run_launcher;

use std::process::ExitStatus;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("app process exited before becoming ready ({0})")]
    UiExited(ExitStatus),
    #[error("app on port {port} not ready after {waited:?}")]
    NotReady { port: u16, waited: Duration },
    #[error("tunnel output ended before a public URL was printed")]
    TunnelClosed,
    #[error("no public URL from tunnel after {0:?}")]
    TunnelTimeout(Duration),
    #[error("health check client could not be built: {0}")]
    HealthClient(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
