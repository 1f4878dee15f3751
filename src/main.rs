use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::command::ProcessEngine;
use crate::config::Config;
use crate::processor::Orchestrator;
use crate::web::start_web_server;

mod command;
mod config;
mod error;
mod models;
mod processor;
mod storage;
mod validation;
mod web;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("omrserve=info,actix_web=info")),
        )
        .init();

    let config = Config::parse();

    info!(
        "Starting omrserve v{} with engine {}",
        env!("CARGO_PKG_VERSION"),
        config.engine.display()
    );

    if !config.engine.exists() {
        warn!(
            "Engine executable {} does not exist, every job will fail until it is installed",
            config.engine.display()
        );
    }

    let engine = ProcessEngine::new(&config.engine);
    let orchestrator = Orchestrator::new(&config, Arc::new(engine));

    if let Err(err) = orchestrator.storage().ensure_roots() {
        error!("Failed to create storage directories: {}", err);
        return Err(err).context("creating upload and output directories");
    }

    info!(
        "Uploads in {}, results in {}",
        orchestrator.storage().upload_root().display(),
        orchestrator.storage().output_root().display()
    );

    start_web_server(&config, orchestrator)
        .await
        .context("web server failed")
}
