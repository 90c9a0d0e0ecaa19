// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use codeharbor_server::{
    api::router,
    config::{LogFormat, ServerConfig, DEFAULT_LOG_FILTER},
    state::{AppState, CryptoContext},
    store::InMemoryCodeStore,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = ServerConfig::from_env().expect("Invalid configuration");
    init_tracing(config.log_format);

    let crypto = CryptoContext::from_config(&config).expect("Invalid RSA key size");

    // Generate the keypair now so the first request does not pay for it.
    let provider = crypto.provider.clone();
    tokio::task::spawn_blocking(move || provider.keypair())
        .await
        .expect("Keypair warm-up task panicked")
        .expect("Failed to generate RSA keypair");

    if config.transport_key_unprotected() {
        tracing::warn!(
            "KEY_EXCHANGE_MODE=transport without TLS: session keys travel in clear. \
             Configure TLS_CERT_PATH/TLS_KEY_PATH or terminate TLS in front of this server"
        );
    }

    let state = AppState::new(InMemoryCodeStore::new(), crypto);
    let app = router(state);
    let addr = config.bind_addr().expect("Failed to parse bind address");

    let handle = Handle::<SocketAddr>::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    tracing::info!(
        %addr,
        key_exchange = config.key_exchange.as_str(),
        encryption_mode = ?config.encryption_mode,
        tls = config.tls.is_some(),
        "CodeHarbor server listening (docs at /docs)"
    );

    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate and key");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTP server failed");
        }
    }

    tracing::info!("Server stopped");
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
