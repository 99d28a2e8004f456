use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tusgate::api;
use tusgate::config::{Config, TusConfig};
use tusgate::storage::driver::filesystem::FilesystemContentStore;
use tusgate::tus::TusServer;
use tusgate::utils::cli::Args;
use tusgate::utils::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = validate_config(&args).await?;

    let tus = Arc::new(TusServer::new(config.tus.clone()));
    tus.start().await.context("failed to start tus server")?;

    let store = Arc::new(FilesystemContentStore::new(&config.content_root));
    let state = Arc::new(AppState::new(tus.clone(), store));
    let app = api::create_router(state);

    let listener = match tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tus.stop().await;
            return Err(e).context(format!("failed to bind {}:{}", config.host, config.port));
        }
    };
    info!("listening on {}", listener.local_addr()?);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    tus.stop().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down...");
}

async fn validate_config(args: &Args) -> anyhow::Result<Config> {
    let mut validation_errors = Vec::new();

    if let Ok(meta) = tokio::fs::metadata(&args.content_root).await {
        if !meta.is_dir() {
            validation_errors.push(format!(
                "TUSGATE_CONTENT_ROOT `{}` exists but is not a directory",
                args.content_root.display(),
            ));
        }
    }

    let tus = TusConfig {
        listen: args.tus_host.clone(),
        behind_proxy: args.tus_behind_proxy,
        ext_origin: args.tus_ext_origin.clone(),
        binary: args.tus_binary.clone(),
        data_root: args
            .tus_data_root
            .clone()
            .unwrap_or_else(std::env::temp_dir),
        ready_timeout: Duration::from_secs(args.tus_ready_timeout_secs),
    };

    if let Err(e) = tus.listen_addr() {
        validation_errors.push(format!("TUS_HOST: {e}"));
    }
    if let Some(origin) = &tus.ext_origin {
        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            validation_errors.push(format!(
                "TUS_EXT_ORIGIN `{origin}` must start with http:// or https://"
            ));
        }
    }
    if args.tus_ready_timeout_secs == 0 {
        validation_errors.push("TUS_READY_TIMEOUT_SECS must be greater than zero".to_string());
    }

    if !validation_errors.is_empty() {
        bail!("invalid configuration:\n{}", validation_errors.join("\n"));
    }

    Ok(Config {
        host: args.host.clone(),
        port: args.port,
        content_root: args.content_root.clone(),
        tus,
    })
}
