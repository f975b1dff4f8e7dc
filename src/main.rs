mod cli;
mod engine;
mod logging;
mod model;
mod orchestrator;
mod session;
mod web;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    logging::init()?;
    cli::run(args).await
}
