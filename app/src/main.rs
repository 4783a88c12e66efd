//! `agrirec` binary.
//!
//! # Commands
//!
//! - `serve` - start the HTTP prediction server
//! - `train` - fit artifacts from CSV datasets
//! - `demo` - answer predictions from stdin prompts

mod config;
mod demo;
mod routes;
mod state;
mod train;

use agrirec::{DistrictIndex, PredictionService};
use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{Cli, Command, ServeArgs};
use crate::state::AppState;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start the tokio runtime")?;
            runtime.block_on(serve(args))
        }
        Command::Train(args) => train::run(&args),
        Command::Demo(args) => demo::run(&args),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = args.artifacts.service_config()?;
    let service = PredictionService::load(&args.artifacts.paths(), config);
    let status = service.status();
    log::info!(
        "models loaded: crop={} fertilizer={} suitability={}",
        status.crop,
        status.fertilizer,
        status.suitability
    );
    let districts = DistrictIndex::load_or_empty(&args.rainfall_csv)
        .with_context(|| format!("failed to read {}", args.rainfall_csv.display()))?;

    let app = routes::create_router(AppState::new(service, districts), args.request_timeout());

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    log::info!("listening on http://{}", args.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("shutdown requested");
}
