//! 网关信息处理器：版本与存储后端。

use axum::extract::Extension;
use axum::response::Json as JsonResponse;
use serde::Serialize;
use std::sync::Arc;

use crate::storage::StorageBackend;
use crate::upload::UploadConfig;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayInfo {
    name: &'static str,
    version: &'static str,
    build_time: &'static str,
    build_env: String,
    storage_backend: &'static str,
    persistent: bool,
    max_upload_size: u64,
}

/// GET /api/info
pub async fn get_gateway_info(
    Extension(backend): Extension<Arc<dyn StorageBackend>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
) -> JsonResponse<GatewayInfo> {
    JsonResponse(GatewayInfo {
        name: crate::build::PROJECT_NAME,
        version: crate::build::PKG_VERSION,
        build_time: crate::build::BUILD_TIME,
        build_env: format!(
            "{},{}",
            crate::build::RUST_VERSION,
            crate::build::RUST_CHANNEL
        ),
        storage_backend: backend.kind().as_str(),
        persistent: backend.persists(),
        max_upload_size: upload.max_file_size,
    })
}
