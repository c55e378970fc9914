//! Axum request handlers for all service endpoints.

use std::io;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{ErrorResponse, HealthResponse, UploadResponse};
use common::ServiceError;
use futures::TryStreamExt;
use tokio::fs::File;
use tokio_util::io::StreamReader;
use tracing::{info, warn};

use super::state::AppState;
use crate::crypto::container;
use crate::error::VaultError;
use crate::names;
use crate::pipeline::{self, IvPolicy};

/// `POST /assets/:name` — encrypt the request body into a new container.
///
/// `name` is only used for its extension; the stored file gets an opaque
/// name, returned in the response together with the IV and both lengths.
pub async fn upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Body,
) -> Response {
    let storage_name = names::obfuscated_name(&name);
    let destination = state.storage_dir.join(&storage_name);
    let source = StreamReader::new(body.into_data_stream().map_err(io::Error::other));

    match pipeline::encrypt(&state.key, source, &destination).await {
        Ok(sealed) => {
            info!(
                storage_name = %storage_name,
                plaintext_bytes = sealed.plaintext_len,
                "asset stored"
            );
            let body = UploadResponse {
                storage_name,
                iv_hex: sealed.iv_hex,
                plaintext_bytes: sealed.plaintext_len,
                container_bytes: sealed.container_len,
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "asset upload failed");
            error_response(upload_error(e))
        }
    }
}

/// `GET /assets/:storage_name` — stream the decrypted asset.
///
/// The container length is checked before any byte is sent, so truncated
/// files get a proper error status. Padding is only verified at the end of
/// the stream; a failure there aborts the response body.
pub async fn download(
    State(state): State<AppState>,
    Path(storage_name): Path<String>,
) -> Response {
    if !names::is_storage_name(&storage_name) {
        return error_response(ServiceError::BadRequest("invalid asset name".into()));
    }

    let path = state.storage_dir.join(&storage_name);
    let file = match File::open(&path).await {
        Ok(f) => f,
        Err(e) => return error_response(VaultError::from(e).into()),
    };
    let len = match file.metadata().await {
        Ok(m) => m.len(),
        Err(e) => return error_response(VaultError::from(e).into()),
    };
    if let Err(e) = container::check_len(len) {
        warn!(storage_name = %storage_name, error = %e, "stored container is malformed");
        return error_response(VaultError::from(e).into());
    }

    let name = storage_name.clone();
    let plaintext = pipeline::decrypt_reader(&state.key, file, state.stream_chunk_size, IvPolicy::FirstChunk)
        .inspect_err(move |e| warn!(storage_name = %name, error = %e, "decrypt stream aborted"));

    (
        [(header::CONTENT_TYPE, names::content_type(&storage_name))],
        Body::from_stream(plaintext),
    )
        .into_response()
}

/// `GET /health` — liveness and readiness check.
///
/// Returns `200 OK` when the storage directory exists.
/// Returns `503 Service Unavailable` otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let storage_ready = tokio::fs::metadata(state.storage_dir.as_path())
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let (status_code, status_str) = if storage_ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        storage_ready,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

/// A body that fails mid-read is the client's fault, not storage's.
fn upload_error(err: VaultError) -> ServiceError {
    match &err {
        VaultError::Io(e) if e.get_ref().is_some_and(|inner| inner.is::<axum::Error>()) => {
            ServiceError::BadRequest("upload body could not be read".into())
        }
        _ => err.into(),
    }
}

fn error_response(err: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::new(err.code(), err.to_string()))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{EncryptionKey, IV_LEN};
    use crate::server::{middleware::Limits, router};
    use axum::{body::to_bytes, http::Request, Router};
    use tower::ServiceExt;

    fn test_router(dir: &std::path::Path) -> Router {
        let state = AppState::new(EncryptionKey::from_bytes([0x55; 32]), dir.to_path_buf(), 1024);
        router::build(state, Limits::default())
    }

    async fn upload_bytes(app: Router, name: &str, data: Vec<u8>) -> UploadResponse {
        let req = Request::builder()
            .method("POST")
            .uri(format!("/assets/{name}"))
            .body(Body::from(data))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn get(app: Router, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let artwork: Vec<u8> = (0..=255u8).cycle().take(5000).collect();

        let stored = upload_bytes(test_router(dir.path()), "black-lotus.png", artwork.clone()).await;
        assert!(names::is_storage_name(&stored.storage_name));
        assert_eq!(stored.plaintext_bytes, 5000);
        assert_eq!(stored.container_bytes, container::sealed_len(5000));

        let on_disk = std::fs::read(dir.path().join(&stored.storage_name)).unwrap();
        assert_eq!(on_disk.len() as u64, stored.container_bytes);
        assert_eq!(hex::encode(&on_disk[..IV_LEN]), stored.iv_hex);

        let resp = get(test_router(dir.path()), &format!("/assets/{}", stored.storage_name)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], &artwork[..]);
    }

    #[tokio::test]
    async fn mtg_upload_stores_32_byte_container() {
        let dir = tempfile::tempdir().unwrap();
        let stored = upload_bytes(test_router(dir.path()), "card.jpg", b"MTG".to_vec()).await;
        assert_eq!(stored.container_bytes, 32);
        assert!(stored.storage_name.ends_with(".jpg.enc"));
    }

    #[tokio::test]
    async fn download_rejects_invalid_names() {
        let dir = tempfile::tempdir().unwrap();
        let resp = get(test_router(dir.path()), "/assets/card.png").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn download_missing_asset_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("/assets/{}.png.enc", "a".repeat(32));
        let resp = get(test_router(dir.path()), &uri).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn truncated_container_is_rejected_before_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let name = format!("{}.png.enc", "b".repeat(32));
        std::fs::write(dir.path().join(&name), [0u8; 20]).unwrap();

        let resp = get(test_router(dir.path()), &format!("/assets/{name}")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, "corrupt_asset");
    }

    #[tokio::test]
    async fn bad_padding_aborts_the_body() {
        let dir = tempfile::tempdir().unwrap();
        let stored = upload_bytes(test_router(dir.path()), "card.png", b"MTG".to_vec()).await;
        let path = dir.path().join(&stored.storage_name);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[IV_LEN - 1] ^= 0x80;
        std::fs::write(&path, bytes).unwrap();

        let resp = get(test_router(dir.path()), &format!("/assets/{}", stored.storage_name)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(to_bytes(resp.into_body(), usize::MAX).await.is_err());
    }

    #[tokio::test]
    async fn health_is_degraded_without_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let resp = get(test_router(&dir.path().join("missing")), "/health").await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "degraded");
        assert!(!health.storage_ready);
    }

    #[test]
    fn body_read_failures_are_bad_requests() {
        let err = VaultError::Io(io::Error::other(axum::Error::new("client went away")));
        assert_eq!(upload_error(err).http_status(), 400);
        let err = VaultError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(upload_error(err).http_status(), 500);
    }
}
