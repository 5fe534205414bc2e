// src/main.rs
use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ponto_core::clock::SystemClock;
use ponto_core::config::AppConfig;
use ponto_core::server::{app, bootstrap};

/// Folha de ponto server. Flags override the PONTO_* environment.
#[derive(Debug, Parser)]
#[command(name = "ponto-core", version, about)]
struct Cli {
    /// Address to bind
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding the JSON document store
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Setup ---
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Load Configuration ---
    let mut config = AppConfig::from_env().context("Failed to load PONTO_* configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }
    info!(
        "Configuration loaded. App id: {}, data dir: {:?}",
        config.app_id, config.data_dir
    );

    // --- Wire Session ---
    let state = bootstrap(&config, Arc::new(SystemClock))
        .await
        .context("Failed to initialise the timesheet session")?;
    let router = app(state);

    // --- Run Web Server ---
    let addr = config.socket_addr();
    match config.tls() {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to load TLS cert/key from {:?} and {:?}",
                        tls.cert_path, tls.key_path
                    )
                })?;
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(router.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Listening on http://{}", addr);
            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}
