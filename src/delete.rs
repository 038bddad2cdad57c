//! 文档删除处理器与空目录清理。

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Json};
use axum::response::Json as JsonResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ApiError, DELETE_FAILED, DELETE_PATH_REQUIRED};
use crate::resolver::{PathRejection, PathResolver, ResolvedPath};
use crate::storage::StorageBackend;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    file_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    success: bool,
    message: &'static str,
}

/// DELETE /api/delete
pub async fn delete_file(
    Extension(resolver): Extension<Arc<PathResolver>>,
    Extension(backend): Extension<Arc<dyn StorageBackend>>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<JsonResponse<DeleteResponse>, ApiError> {
    let file_path = match payload {
        Ok(Json(body)) => body.file_path,
        Err(rejection) => {
            debug!(error = %rejection, "delete body rejected");
            None
        }
    };
    handle_delete(&resolver, backend.as_ref(), file_path.as_deref())
        .await
        .map(JsonResponse)
}

pub async fn handle_delete(
    resolver: &PathResolver,
    backend: &dyn StorageBackend,
    file_path: Option<&str>,
) -> Result<DeleteResponse, ApiError> {
    let Some(file_path) = file_path.filter(|path| !path.trim().is_empty()) else {
        return Err(ApiError::BadRequest(DELETE_PATH_REQUIRED.into()));
    };

    let object = resolver.resolve(file_path).map_err(|rejection| {
        warn!(reason = %rejection, "delete path rejected");
        match rejection {
            PathRejection::Empty => ApiError::BadRequest(DELETE_PATH_REQUIRED.into()),
            _ => ApiError::Forbidden,
        }
    })?;

    let exists = backend
        .exists(&object)
        .await
        .map_err(|err| ApiError::from_storage(err, DELETE_FAILED))?;
    if !exists {
        return Err(ApiError::NotFound);
    }

    backend
        .delete(&object)
        .await
        .map_err(|err| ApiError::from_storage(err, DELETE_FAILED))?;
    let pruned = prune_empty_parents(resolver, backend, &object).await;

    info!(
        path = object.logical(),
        pruned,
        backend = backend.kind().as_str(),
        "document deleted"
    );
    Ok(DeleteResponse {
        success: true,
        message: "File deleted successfully",
    })
}

/// 自下而上删除已空的父目录，遇到非空或失败即停止；错误一律吞掉。
async fn prune_empty_parents(
    resolver: &PathResolver,
    backend: &dyn StorageBackend,
    object: &ResolvedPath,
) -> usize {
    let mut pruned = 0;
    let mut current = object.absolute().parent();
    while let Some(dir) = current {
        if !resolver.is_strictly_within(dir) {
            break;
        }
        match backend.remove_if_empty_dir(dir).await {
            Ok(true) => pruned += 1,
            Ok(false) => break,
            Err(err) => {
                debug!(error = %err, "stopped pruning parent directories");
                break;
            }
        }
        current = dir.parent();
    }
    pruned
}
