// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use certs_server::{
    api::router,
    auth::session::DEFAULT_SWEEP_INTERVAL,
    config::{AppConfig, LogFormat},
    state::{AppState, AuthConfig},
    storage::{CertDatabase, FileStorage, StoragePaths},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(LogFormat::from_env());
    let config = AppConfig::from_env()?;

    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        database = %config.database_path().display(),
        "Opening storage"
    );
    let files = FileStorage::open(StoragePaths::new(&config.upload_dir))?;
    let db = CertDatabase::open(&config.database_path())?;

    let auth_config = AuthConfig::from_app_config(&config)?;
    if !auth_config.verifier.is_production() {
        tracing::warn!(
            "GOOGLE_CLIENT_ID is not set: ID tokens are NOT signature-checked \
             (dev builds) or sign-in is disabled (release builds)"
        );
    }
    if auth_config.exchange.is_none() {
        tracing::info!("Authorization code sign-in disabled");
    }

    let bind_addr = config.bind_addr;
    let tls = config.tls.clone();
    let state = AppState::new(config, files, db).with_auth_config(auth_config);

    let shutdown = CancellationToken::new();
    tokio::spawn(
        state
            .sessions
            .clone()
            .run_sweeper(DEFAULT_SWEEP_INTERVAL, shutdown.clone()),
    );

    let app = router(state);

    let handle = Handle::new();
    {
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });
    }

    match tls {
        Some(paths) => {
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| "Failed to install rustls crypto provider")?;
            let tls_config = RustlsConfig::from_pem_file(&paths.cert, &paths.key).await?;

            tracing::info!(addr = %bind_addr, "Listening on https");
            axum_server::bind_rustls(bind_addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            tracing::info!(addr = %bind_addr, "Listening on http");
            axum_server::bind(bind_addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    shutdown.cancel();
    tracing::info!("Server stopped");
    Ok(())
}
