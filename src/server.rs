//! 网关路由：把上传与删除处理器挂到 HTTP 路由上，并注入共享的解析器与存储后端。

use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::routing::{self, get, post};
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::http::{self, build_cors_layer, resolve_client_ip};
use crate::resolver::PathResolver;
use crate::storage::StorageBackend;
use crate::upload::UploadConfig;
use crate::{delete, info, upload};

/// Process-wide collaborators, built once at startup and shared by every request.
#[derive(Clone)]
pub struct Gateway {
    pub resolver: Arc<PathResolver>,
    pub backend: Arc<dyn StorageBackend>,
    pub upload: Arc<UploadConfig>,
}

impl Gateway {
    pub fn new(
        resolver: PathResolver,
        backend: Arc<dyn StorageBackend>,
        upload: UploadConfig,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            backend,
            upload: Arc::new(upload),
        }
    }
}

/// OPTIONS requests never reach the routes: the outermost CORS layer answers them.
pub fn build_router(gateway: Gateway, cors_origins: Option<&str>) -> Router {
    let body_limit = usize::try_from(gateway.upload.max_request_size).unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/api/upload",
            post(upload::upload_file)
                .fallback(http::method_not_allowed)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/delete",
            routing::delete(delete::delete_file)
                .fallback(http::method_not_allowed),
        )
        .route(
            "/api/info",
            get(info::get_gateway_info).fallback(http::method_not_allowed),
        )
        .fallback(http::route_not_found)
        .layer(middleware::from_fn(http::add_gateway_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.ip());
                    let client_ip = resolve_client_ip(request.headers(), connect_ip)
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(Extension(gateway.resolver))
        .layer(Extension(gateway.backend))
        .layer(Extension(gateway.upload))
        .layer(build_cors_layer(cors_origins))
}
