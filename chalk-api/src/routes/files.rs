/// File upload and download
///
/// Uploads send the raw bytes as the request body. The `Content-Type`
/// header is recorded with the file and the name comes from the `name`
/// query parameter.
///
/// ```text
/// POST /v1/files?name=intro.mp4
/// Content-Type: video/mp4
///
/// <bytes>
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::Bytes;
use chalk_shared::models::file::{File, Upload};
use chalk_shared::models::session::Session;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub name: String,
}

/// Content type of the upload, defaulting to octet-stream
fn content_type_of(headers: &HeaderMap) -> ApiResult<String> {
    match headers.get(header::CONTENT_TYPE) {
        None => Ok(DEFAULT_CONTENT_TYPE.to_string()),
        Some(value) => value
            .to_str()
            .map(|v| v.to_string())
            .map_err(|_| ApiError::BadRequest("Content-Type is not valid ASCII".to_string())),
    }
}

/// Store an uploaded file
///
/// # Errors
///
/// - `400`: Missing or empty `name`, or an empty body
/// - `413`: Body larger than the upload limit
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<File>)> {
    let name = query.name.trim();
    if name.is_empty() || name.len() > 255 {
        return Err(ApiError::BadRequest(
            "name must be 1 to 255 characters".to_string(),
        ));
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("file is empty".to_string()));
    }

    let upload = Upload {
        uploader_user_id: session.user_id,
        name: name.to_string(),
        content_type: content_type_of(&headers)?,
        data: body,
    };
    let file = File::upload(&state.db, state.objects.as_ref(), upload).await?;

    Ok((StatusCode::CREATED, Json(file)))
}

/// Stream back a stored file with its recorded content type
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Response> {
    let (file, data) = File::download(&state.db, state.objects.as_ref(), file_id).await?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_defaults() {
        let headers = HeaderMap::new();
        assert_eq!(content_type_of(&headers).unwrap(), DEFAULT_CONTENT_TYPE);

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        assert_eq!(content_type_of(&headers).unwrap(), "video/mp4");
    }
}
