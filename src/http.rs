//! HTTP 辅助工具：CORS、网关响应头、方法与路由回退、客户端 IP。

use axum::body::Body as AxumBody;
use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, header};
use axum::{middleware, response::Response};
use std::net::IpAddr;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::config::STORAGE_BACKEND_HEADER;
use crate::error::ApiError;
use crate::storage::StorageBackend;

const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

/// 构建 CORS Layer；未配置来源时允许任意来源与任意请求头。
pub fn build_cors_layer(cors_origins: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(ALLOWED_METHODS);

    let origins = cors_origins
        .unwrap_or_default()
        .split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "invalid cors origin");
                None
            }
        })
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return layer.allow_origin(Any).allow_headers(Any);
    }
    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_headers(AllowHeaders::mirror_request())
}

/// 从 `x-forwarded-for` 解析客户端 IP。
pub fn extract_forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<IpAddr>().ok())
}

/// 综合转发头与连接信息计算客户端 IP。
pub fn resolve_client_ip(headers: &HeaderMap, connect_ip: Option<IpAddr>) -> Option<IpAddr> {
    extract_forwarded_ip(headers).or(connect_ip)
}

/// 标注存储后端并添加基础安全响应头。
pub async fn add_gateway_headers(
    Extension(backend): Extension<Arc<dyn StorageBackend>>,
    request: Request<AxumBody>,
    next: middleware::Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(STORAGE_BACKEND_HEADER),
        HeaderValue::from_static(backend.kind().as_str()),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let connect: IpAddr = "127.0.0.1".parse().expect("ip");

        assert_eq!(
            resolve_client_ip(&headers, Some(connect)),
            Some("203.0.113.7".parse().expect("ip"))
        );
        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(connect)), Some(connect));
    }
}
