// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wallet_server::{
    api::router,
    auth::AuthConfig,
    config::{Config, LogFormat},
    expiry_sweeper::ExpirySweeper,
    providers::razorpay::RazorpayClient,
    state::AppState,
    storage::{FileStore, StoragePaths, WalletDb},
};

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!(?config, "Starting wallet server");

    let paths = StoragePaths::new(&config.data_dir);
    let db = WalletDb::open(&paths.database_file())?;
    let mut files = FileStore::new(paths);
    files.initialize()?;

    let auth = AuthConfig::new(config.jwt_secret.as_bytes(), config.token_ttl);
    let mut state = AppState::new(db, files, auth);

    match config.razorpay.clone() {
        Some(razorpay) => {
            let client = RazorpayClient::new(razorpay)?;
            state = state.with_payment_gateway(Arc::new(client));
            info!("Razorpay recharge enabled");
        }
        None => warn!("Razorpay credentials not set; recharge endpoints will return 503"),
    }

    let shutdown = CancellationToken::new();
    let sweeper = ExpirySweeper::new(state.db.clone(), state.files.clone())
        .with_interval(config.document_sweep_interval);
    let sweeper_task = tokio::spawn(sweeper.run(shutdown.clone()));

    let app = router(state);
    let addr: SocketAddr = config.bind_address().parse()?;

    match &config.tls {
        Some(tls) => {
            // Another component may have installed a provider already.
            let _ = rustls::crypto::ring::default_provider().install_default();
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;

            let handle = axum_server::Handle::new();
            let server = axum_server::bind_rustls(addr, tls_config)
                .handle(handle.clone())
                .serve(app.into_make_service());

            info!(%addr, "Listening on https (docs at /docs)");
            tokio::select! {
                result = server => result?,
                _ = shutdown_signal() => {
                    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
                }
            }
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "Listening on http (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    shutdown.cancel();
    if let Err(e) = sweeper_task.await {
        warn!(error = %e, "Expiry sweeper task ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
