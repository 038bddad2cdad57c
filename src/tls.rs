//! 可选 TLS 证书加载。

use axum_server::tls_rustls::RustlsConfig;
use std::io;
use tracing::{info, warn};

use crate::config::Args;

/// 同时配置证书与私钥时返回 Rustls 配置，否则不启用 HTTPS。
pub async fn load_rustls_config(args: &Args) -> io::Result<Option<RustlsConfig>> {
    match (&args.tls_cert, &args.tls_key) {
        (Some(cert), Some(key)) => {
            let config = RustlsConfig::from_pem_file(cert, key).await?;
            info!(cert = %cert, "loaded tls certificate");
            Ok(Some(config))
        }
        (None, None) => Ok(None),
        _ => {
            warn!("both --tls-cert and --tls-key are required for https, serving http only");
            Ok(None)
        }
    }
}
