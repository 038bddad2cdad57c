//! 命令行参数与网关默认配置。

use clap::{Parser, ValueEnum};
use shadow_rs::formatcp;

use crate::build;
use crate::storage::BackendKind;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;
/// Slack on top of the file ceiling for multipart boundaries and the path field.
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;
pub const FILE_FIELD: &str = "file";
pub const PATH_FIELD: &str = "filePath";
pub const STORAGE_BACKEND_HEADER: &str = "x-storage-backend";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// CLI arguments and environment configuration for the gateway.
#[derive(Parser, Debug)]
#[command(name = "docgate", version = VERSION_INFO, about = "Document storage gateway")]
pub struct Args {
    #[arg(
        short = 's',
        long,
        env = "DOCGATE_STORAGE_DIR",
        default_value = ".docgate/storage",
        help = "Storage root for uploaded documents"
    )]
    pub storage_dir: String,
    #[arg(
        long,
        value_enum,
        env = "DOCGATE_BACKEND",
        default_value_t = BackendKind::Local,
        help = "Storage backend (simulated never persists)"
    )]
    pub backend: BackendKind,
    #[arg(
        long,
        env = "DOCGATE_REMOTE_BUCKET",
        default_value = "documents",
        help = "Bucket namespace reported by the simulated backend"
    )]
    pub remote_bucket: String,
    #[arg(
        short = 'b',
        long,
        env = "DOCGATE_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP/HTTPS"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "DOCGATE_HTTP_PORT",
        default_value_t = 3001,
        help = "HTTP port"
    )]
    pub http_port: u16,
    #[arg(
        short = 'P',
        long,
        env = "DOCGATE_HTTPS_PORT",
        default_value_t = 3443,
        help = "HTTPS port (used only with --tls-cert and --tls-key)"
    )]
    pub https_port: u16,
    #[arg(short = 'c', long, env = "DOCGATE_TLS_CERT", help = "TLS cert path")]
    pub tls_cert: Option<String>,
    #[arg(short = 'k', long, env = "DOCGATE_TLS_KEY", help = "TLS key path")]
    pub tls_key: Option<String>,
    #[arg(
        long,
        env = "DOCGATE_CORS_ORIGINS",
        help = "Comma separated CORS origins (default: any origin)"
    )]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "DOCGATE_MAX_UPLOAD_SIZE",
        default_value_t = DEFAULT_MAX_UPLOAD_SIZE,
        help = "Max document size in bytes"
    )]
    pub max_upload_size: u64,
    #[arg(
        long,
        value_enum,
        env = "DOCGATE_LOG_FORMAT",
        default_value_t = LogFormat::Text,
        help = "Log output format"
    )]
    pub log_format: LogFormat,
}
