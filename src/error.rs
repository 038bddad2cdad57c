//! 统一的 API 错误类型与 JSON 响应转换。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::storage::StorageError;

pub const UPLOAD_FIELDS_REQUIRED: &str = "File and filePath are required";
pub const DELETE_PATH_REQUIRED: &str = "filePath is required";
pub const UPLOAD_FAILED: &str = "Failed to upload file";
pub const DELETE_FAILED: &str = "Failed to delete file";
const ACCESS_DENIED: &str = "Access denied";
const FILE_NOT_FOUND: &str = "File not found";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    UnsupportedMediaType(String),
    PayloadTooLarge(String),
    Forbidden,
    NotFound,
    MethodNotAllowed,
    RouteNotFound,
    Storage {
        context: &'static str,
        details: String,
    },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    /// 按操作上下文转换后端错误；详情只包含底层消息，不含绝对路径。
    pub fn from_storage(error: StorageError, context: &'static str) -> Self {
        match error {
            StorageError::InvalidPath => ApiError::Forbidden,
            StorageError::NotFound => ApiError::NotFound,
            StorageError::Io(err) => ApiError::Storage {
                context,
                details: err.to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match &self {
            ApiError::BadRequest(msg)
            | ApiError::UnsupportedMediaType(msg)
            | ApiError::PayloadTooLarge(msg) => (msg.as_str(), None),
            ApiError::Forbidden => (ACCESS_DENIED, None),
            ApiError::NotFound => (FILE_NOT_FOUND, None),
            ApiError::MethodNotAllowed => ("Method not allowed", None),
            ApiError::RouteNotFound => ("Not found", None),
            ApiError::Storage { context, details } => {
                error!(error = %details, "{context}");
                (*context, Some(details.as_str()))
            }
        };
        (
            status,
            Json(ErrorBody {
                error: message,
                details,
            }),
        )
            .into_response()
    }
}
