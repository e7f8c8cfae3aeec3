//! Social API Mock Server - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use social_api_mock::{build_app, RequestRouter, RouteSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "social-api-mock",
    about = "Configuration-driven mock API server - declarative routes, validation, and templated responses",
    version
)]
struct Args {
    /// Directory with route definition YAML files
    #[arg(short, long, default_value = "config")]
    config: PathBuf,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_string())),
        )
        .with_target(false)
        .init();

    info!(path = %args.config.display(), "Loading route definitions");
    let routes = RouteSet::from_dir(&args.config)?;

    if args.validate {
        println!("Configuration is valid ({} routes defined)", routes.routes.len());
        return Ok(());
    }

    let engine = Arc::new(RequestRouter::new(routes));
    let app = build_app(engine);

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(address = %args.listen, "Mock API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to install shutdown signal handler");
        return;
    }
    info!("Shutdown signal received");
}
