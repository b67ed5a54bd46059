use crate::uploads::{Rejection, UploadGate, UploadStorage, Verdict};
use axum::{
    extract::{Extension, Multipart, Path},
    http::{
        header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

/// Multipart field carrying the file.
pub const IMAGE_FIELD: &str = "image";

/// Request body of `POST /uploads`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Uploaded {
    pub filename: String,
}

#[utoipa::path(
    post,
    path= "/uploads",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses (
        (status = 201, description = "Image stored", body = Uploaded, content_type = "application/json"),
        (status = 400, description = "Missing or unreadable image field", body = String),
        (status = 413, description = "Image exceeds the upload limit", body = String),
        (status = 415, description = "File type or content not allowed", body = String),
    ),
    tag= "uploads"
)]
#[instrument(skip(gate, storage, multipart))]
pub async fn upload(
    gate: Extension<UploadGate>,
    storage: Extension<UploadStorage>,
    mut multipart: Multipart,
) -> Response {
    let (filename, bytes) = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(IMAGE_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => break (filename, bytes),
                    Err(e) => {
                        debug!("Error reading upload: {}", e);
                        return (e.status(), e.body_text()).into_response();
                    }
                }
            }

            Ok(Some(_)) => {}

            Ok(None) => {
                return (StatusCode::BAD_REQUEST, "Missing image field".to_string()).into_response()
            }

            Err(e) => {
                debug!("Error reading multipart body: {}", e);
                return (e.status(), e.body_text()).into_response();
            }
        }
    };

    let mut stream = Cursor::new(bytes.as_ref());
    let accepted = match gate.validate(&filename, &mut stream, bytes.len() as u64) {
        Verdict::Accepted(accepted) => accepted,
        Verdict::Rejected(rejection) => {
            return (rejection_status(&rejection), rejection.to_string()).into_response()
        }
    };

    match storage.persist(&accepted, &bytes).await {
        Ok(filename) => (StatusCode::CREATED, Json(Uploaded { filename })).into_response(),
        Err(e) => {
            error!("Error storing upload: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error storing upload".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path= "/uploads/{filename}",
    params(("filename" = String, Path, description = "Name returned by `POST /uploads`")),
    responses (
        (status = 200, description = "Stored image", content_type = "image/*"),
        (status = 404, description = "No such upload", body = String),
    ),
    tag= "uploads"
)]
#[instrument(skip(storage))]
pub async fn download(storage: Extension<UploadStorage>, filename: Path<String>) -> Response {
    match storage.read(&filename).await {
        Ok(Some(stored)) => (
            [
                (CONTENT_TYPE, stored.mime_type),
                (X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            stored.bytes,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Upload not found".to_string()).into_response(),
        Err(e) => {
            error!("Error reading upload: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading upload".to_string(),
            )
                .into_response()
        }
    }
}

const fn rejection_status(rejection: &Rejection) -> StatusCode {
    match rejection {
        Rejection::Extension | Rejection::Content => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Rejection::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Rejection::Unreadable => StatusCode::BAD_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_status_codes() {
        assert_eq!(
            rejection_status(&Rejection::Extension),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            rejection_status(&Rejection::Content),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            rejection_status(&Rejection::TooLarge { size: 2, limit: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            rejection_status(&Rejection::Unreadable),
            StatusCode::BAD_REQUEST
        );
    }
}
