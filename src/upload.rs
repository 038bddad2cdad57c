//! 文档上传处理器：校验请求、内容与路径后写入存储后端。

use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Extension, Multipart};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json as JsonResponse;
use mime_guess::Mime;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{FILE_FIELD, PATH_FIELD};
use crate::error::{ApiError, UPLOAD_FAILED, UPLOAD_FIELDS_REQUIRED};
use crate::resolver::{PathRejection, PathResolver};
use crate::storage::StorageBackend;

const MIB: u64 = 1024 * 1024;

#[derive(Debug)]
pub struct UploadConfig {
    pub max_file_size: u64,
    pub accepted_media_type: Mime,
    /// Ceiling for the whole multipart request body.
    pub max_request_size: u64,
}

impl UploadConfig {
    pub fn new(max_file_size: u64, multipart_overhead: u64) -> Self {
        Self {
            max_file_size,
            accepted_media_type: mime_guess::mime::APPLICATION_PDF,
            max_request_size: max_file_size.saturating_add(multipart_overhead),
        }
    }

    fn size_violation(&self) -> ApiError {
        let limit = if self.max_file_size >= MIB && self.max_file_size % MIB == 0 {
            format!("{} MB", self.max_file_size / MIB)
        } else {
            format!("{} byte", self.max_file_size)
        };
        ApiError::PayloadTooLarge(format!("File size exceeds the {limit} limit"))
    }

    fn media_type_violation(&self) -> ApiError {
        let label = self
            .accepted_media_type
            .subtype()
            .as_str()
            .to_ascii_uppercase();
        ApiError::UnsupportedMediaType(format!("Only {label} files are allowed"))
    }

    fn accepts(&self, declared: Option<&str>) -> bool {
        declared
            .and_then(|value| value.trim().parse::<Mime>().ok())
            .is_some_and(|mime| {
                mime.essence_str()
                    .eq_ignore_ascii_case(self.accepted_media_type.essence_str())
            })
    }
}

/// 上传的文件内容及其声明的媒体类型与大小。
#[derive(Debug)]
pub struct UploadPayload {
    pub content: Bytes,
    pub media_type: Option<String>,
    pub declared_size: Option<u64>,
}

#[derive(Debug, Default)]
pub struct UploadRequest {
    pub file: Option<UploadPayload>,
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    success: bool,
    path: String,
}

/// POST /api/upload
pub async fn upload_file(
    Extension(resolver): Extension<Arc<PathResolver>>,
    Extension(backend): Extension<Arc<dyn StorageBackend>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    let declared_body = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if declared_body.is_some_and(|size| size > upload.max_request_size) {
        warn!(declared = ?declared_body, "upload body exceeds limit");
        return Err(upload.size_violation());
    }

    let multipart = multipart.map_err(|rejection| {
        debug!(error = %rejection, "upload is not multipart");
        ApiError::BadRequest(UPLOAD_FIELDS_REQUIRED.into())
    })?;
    let request = read_upload_request(multipart, &upload).await?;
    handle_upload(&resolver, backend.as_ref(), &upload, request)
        .await
        .map(JsonResponse)
}

/// 校验并写入；任何校验失败都发生在后端调用之前。
pub async fn handle_upload(
    resolver: &PathResolver,
    backend: &dyn StorageBackend,
    upload: &UploadConfig,
    request: UploadRequest,
) -> Result<UploadResponse, ApiError> {
    let (Some(file), Some(file_path)) = (request.file, request.file_path) else {
        return Err(ApiError::BadRequest(UPLOAD_FIELDS_REQUIRED.into()));
    };
    if file_path.trim().is_empty() {
        return Err(ApiError::BadRequest(UPLOAD_FIELDS_REQUIRED.into()));
    }

    if !upload.accepts(file.media_type.as_deref()) {
        warn!(media_type = ?file.media_type, "upload media type rejected");
        return Err(upload.media_type_violation());
    }

    let measured = file.content.len() as u64;
    if measured > upload.max_file_size
        || file.declared_size.is_some_and(|size| size > upload.max_file_size)
    {
        warn!(measured, declared = ?file.declared_size, "upload size rejected");
        return Err(upload.size_violation());
    }

    let object = resolver.resolve(&file_path).map_err(|rejection| {
        warn!(reason = %rejection, "upload path rejected");
        match rejection {
            PathRejection::Empty => ApiError::BadRequest(UPLOAD_FIELDS_REQUIRED.into()),
            _ => ApiError::Forbidden,
        }
    })?;

    backend
        .write(&object, file.content)
        .await
        .map_err(|err| ApiError::from_storage(err, UPLOAD_FAILED))?;

    info!(
        path = object.logical(),
        size = measured,
        backend = backend.kind().as_str(),
        "document uploaded"
    );
    Ok(UploadResponse {
        success: true,
        path: object.logical().to_string(),
    })
}

async fn read_upload_request(
    mut multipart: Multipart,
    upload: &UploadConfig,
) -> Result<UploadRequest, ApiError> {
    let mut request = UploadRequest::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, upload))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            request.file = Some(read_file_field(field, upload).await?);
        } else if name == PATH_FIELD {
            request.file_path = Some(
                field
                    .text()
                    .await
                    .map_err(|err| multipart_error(err, upload))?,
            );
        } else {
            debug!(field = name, "ignoring multipart field");
        }
    }
    Ok(request)
}

/// 流式读取文件分段，超过上限立即停止缓冲。
async fn read_file_field(
    mut field: Field<'_>,
    upload: &UploadConfig,
) -> Result<UploadPayload, ApiError> {
    let media_type = field.content_type().map(str::to_owned);
    let declared_size = field
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    if declared_size.is_some_and(|size| size > upload.max_file_size) {
        warn!(declared = ?declared_size, "file part exceeds limit");
        return Err(upload.size_violation());
    }

    let mut content = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|err| multipart_error(err, upload))?
    {
        if (content.len() + chunk.len()) as u64 > upload.max_file_size {
            warn!(received = content.len() + chunk.len(), "file part exceeds limit");
            return Err(upload.size_violation());
        }
        content.extend_from_slice(&chunk);
    }

    Ok(UploadPayload {
        content: Bytes::from(content),
        media_type,
        declared_size,
    })
}

fn multipart_error(err: MultipartError, upload: &UploadConfig) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return upload.size_violation();
    }
    ApiError::BadRequest(err.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MULTIPART_OVERHEAD;
    use crate::storage::LocalDiskStorage;
    use crate::test_support::{RecordingBackend, list_tree, pdf_bytes};
    use tempfile::tempdir;

    fn make_upload_config(max_file_size: u64) -> UploadConfig {
        UploadConfig::new(max_file_size, MULTIPART_OVERHEAD)
    }

    fn pdf_request(path: Option<&str>, content: Vec<u8>) -> UploadRequest {
        UploadRequest {
            file: Some(UploadPayload {
                declared_size: Some(content.len() as u64),
                content: Bytes::from(content),
                media_type: Some("application/pdf".into()),
            }),
            file_path: path.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn upload_writes_nested_document() {
        let temp = tempdir().expect("tempdir");
        let resolver = PathResolver::new(temp.path());
        let backend = LocalDiskStorage::new(temp.path().to_path_buf());
        let content = pdf_bytes(5 * 1024);

        let response = handle_upload(
            &resolver,
            &backend,
            &make_upload_config(10 * MIB),
            pdf_request(Some("clients/7/contract.pdf"), content.clone()),
        )
        .await
        .expect("upload");

        assert!(response.success);
        assert_eq!(response.path, "clients/7/contract.pdf");
        let stored = std::fs::read(temp.path().join("clients/7/contract.pdf")).expect("read");
        assert_eq!(stored, content);
    }

    #[tokio::test]
    async fn missing_path_is_rejected_without_backend_call() {
        let backend = RecordingBackend::default();
        let resolver = PathResolver::new("/data/uploads");

        let result = handle_upload(
            &resolver,
            &backend,
            &make_upload_config(10 * MIB),
            pdf_request(None, pdf_bytes(64)),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn non_pdf_is_rejected_without_backend_call() {
        let backend = RecordingBackend::default();
        let resolver = PathResolver::new("/data/uploads");
        let mut request = pdf_request(Some("clients/7/notes.txt"), b"hello".to_vec());
        if let Some(file) = request.file.as_mut() {
            file.media_type = Some("text/plain".into());
        }

        let result = handle_upload(&resolver, &backend, &make_upload_config(10 * MIB), request).await;

        assert!(matches!(result, Err(ApiError::UnsupportedMediaType(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn media_type_parameters_and_case_are_tolerated() {
        let backend = RecordingBackend::default();
        let resolver = PathResolver::new("/data/uploads");
        let mut request = pdf_request(Some("a.pdf"), pdf_bytes(16));
        if let Some(file) = request.file.as_mut() {
            file.media_type = Some("Application/PDF; name=a.pdf".into());
        }

        handle_upload(&resolver, &backend, &make_upload_config(10 * MIB), request)
            .await
            .expect("upload");
        assert_eq!(backend.writes(), 1);
    }

    #[tokio::test]
    async fn oversized_payload_persists_nothing() {
        let temp = tempdir().expect("tempdir");
        let resolver = PathResolver::new(temp.path());
        let backend = LocalDiskStorage::new(temp.path().to_path_buf());

        let result = handle_upload(
            &resolver,
            &backend,
            &make_upload_config(1024),
            pdf_request(Some("big/contract.pdf"), pdf_bytes(1025)),
        )
        .await;

        assert!(matches!(result, Err(ApiError::PayloadTooLarge(_))));
        assert!(list_tree(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn understated_declared_size_is_checked_against_measured() {
        let backend = RecordingBackend::default();
        let resolver = PathResolver::new("/data/uploads");
        let mut request = pdf_request(Some("a.pdf"), pdf_bytes(2048));
        if let Some(file) = request.file.as_mut() {
            file.declared_size = Some(10);
        }

        let result = handle_upload(&resolver, &backend, &make_upload_config(1024), request).await;

        assert!(matches!(result, Err(ApiError::PayloadTooLarge(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn traversal_path_is_forbidden() {
        let backend = RecordingBackend::default();
        let resolver = PathResolver::new("/data/uploads");

        let result = handle_upload(
            &resolver,
            &backend,
            &make_upload_config(10 * MIB),
            pdf_request(Some("../../etc/passwd"), pdf_bytes(16)),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Forbidden)));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn size_message_uses_megabytes_when_whole() {
        let err = make_upload_config(10 * MIB).size_violation();
        match err {
            ApiError::PayloadTooLarge(msg) => assert_eq!(msg, "File size exceeds the 10 MB limit"),
            _ => panic!("expected payload too large"),
        }
        let err = make_upload_config(10 * MIB).media_type_violation();
        match err {
            ApiError::UnsupportedMediaType(msg) => assert_eq!(msg, "Only PDF files are allowed"),
            _ => panic!("expected unsupported media type"),
        }
    }
}
