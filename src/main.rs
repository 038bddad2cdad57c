//! docgate server binary.
//!
//! A storage gateway for uploaded documents: it accepts a PDF plus a logical
//! path, confines that path to the configured storage root, and persists it
//! through the selected storage backend. Deletes are confined the same way and
//! prune directories they leave empty.

mod atomic;
mod config;
mod delete;
mod error;
mod http;
mod info;
mod logging;
mod remote;
mod resolver;
mod server;
mod storage;
#[cfg(test)]
mod test_support;
mod tls;
mod upload;

use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use crate::config::{Args, MULTIPART_OVERHEAD};
use crate::remote::SimulatedRemoteStorage;
use crate::resolver::PathResolver;
use crate::server::{Gateway, build_router};
use crate::storage::{BackendKind, LocalDiskStorage, StorageBackend};
use crate::upload::UploadConfig;

shadow!(build);

/// Starts the gateway and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let args = Args::parse();
    logging::init_logging(args.log_format);

    let (resolver, backend) = build_storage(&args).await?;
    let upload_config = UploadConfig::new(args.max_upload_size, MULTIPART_OVERHEAD);
    info!(
        root = %resolver.root_path().display(),
        backend = backend.kind().as_str(),
        max_upload_size = upload_config.max_file_size,
        "storage gateway configured"
    );

    let app = build_router(
        Gateway::new(resolver, backend, upload_config),
        args.cors_origins.as_deref(),
    );

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let http_addr = SocketAddr::new(host, args.http_port);
    let handle = Handle::new();

    info!("🚀 Starting HTTP server at {}", http_addr);
    let http_server = axum_server::bind(http_addr)
        .handle(handle.clone())
        .serve(app.clone().into_make_service_with_connect_info::<SocketAddr>());

    match tls::load_rustls_config(&args).await? {
        Some(tls_config) => {
            let https_addr = SocketAddr::new(host, args.https_port);
            info!("🔒 Starting HTTPS server at {}", https_addr);
            let https_server = axum_server::bind_rustls(https_addr, tls_config)
                .handle(handle.clone())
                .serve(app.into_make_service_with_connect_info::<SocketAddr>());
            tokio::select! {
                result = http_server => result?,
                result = https_server => result?,
                _ = shutdown_signal(handle) => {}
            }
        }
        None => {
            tokio::select! {
                result = http_server => result?,
                _ = shutdown_signal(handle) => {}
            }
        }
    }

    Ok(())
}

/// Resolves the storage root and builds the selected backend once for the whole process.
async fn build_storage(
    args: &Args,
) -> Result<(PathResolver, Arc<dyn StorageBackend>), std::io::Error> {
    let configured = PathBuf::from(&args.storage_dir);
    let (root, backend): (PathBuf, Arc<dyn StorageBackend>) = match args.backend {
        BackendKind::Local => {
            tokio::fs::create_dir_all(&configured).await?;
            let root = tokio::fs::canonicalize(&configured).await?;
            (root.clone(), Arc::new(LocalDiskStorage::new(root)))
        }
        BackendKind::Simulated => {
            let remote = SimulatedRemoteStorage::new(args.remote_bucket.clone());
            warn!(
                bucket = remote.bucket(),
                "simulated remote storage selected: uploads are accepted but never persisted"
            );
            (std::path::absolute(&configured)?, Arc::new(remote))
        }
    };

    Ok((PathResolver::new(root), backend))
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
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

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
