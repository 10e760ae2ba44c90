//! POST /api/try-on
//!
//! Validates the caller's request, makes exactly one upstream call and relays
//! the JPEG it returns. Upstream failures come back as
//! `{"message", "isRateLimit", ...}` with the mapped status.

use crate::app_state::AppState;
use crate::domain::{GarmentCategory, Principal, TryOnError, TryOnOutcome, TryOnRequest};
use crate::storage::{PhotoCategory, StorageKey};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use std::time::Instant;

/// Inbound body. Images are URLs or base64 content.
#[derive(Debug, Deserialize)]
pub struct TryOnBody {
    // ---
    pub model_image: String,
    pub cloth_image: String,
    #[serde(default)]
    pub category: GarmentCategory,
    #[serde(default)]
    pub garment_description: Option<String>,
    /// Storage path the model image was read from, if it came from the library.
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub cloth_path: Option<String>,
}

fn check_path(
    path: Option<&str>,
    field: &str,
    user_id: &str,
    category: PhotoCategory,
) -> Result<(), TryOnError> {
    // ---
    let Some(path) = path else {
        return Ok(());
    };

    let owned = StorageKey::parse(path).is_ok_and(|key| key.is_owned_by(user_id, category));
    if !owned {
        return Err(TryOnError::InvalidRequest(format!(
            "{field} must be one of your own {} photos",
            category.as_str()
        )));
    }
    Ok(())
}

/// Turn the body into an upstream request, or say why it is unacceptable.
fn validate(body: TryOnBody, user_id: &str) -> Result<TryOnRequest, TryOnError> {
    // ---
    if body.model_image.trim().is_empty() {
        return Err(TryOnError::InvalidRequest(
            "model_image is required".to_string(),
        ));
    }
    if body.cloth_image.trim().is_empty() {
        return Err(TryOnError::InvalidRequest(
            "cloth_image is required".to_string(),
        ));
    }

    check_path(
        body.model_path.as_deref(),
        "model_path",
        user_id,
        PhotoCategory::Model,
    )?;
    check_path(
        body.cloth_path.as_deref(),
        "cloth_path",
        user_id,
        PhotoCategory::Cloth,
    )?;

    Ok(TryOnRequest {
        model_image: body.model_image,
        garment_image: body.cloth_image,
        category: body.category,
        description: body.garment_description.unwrap_or_default(),
    })
}

fn image_response(bytes: Vec<u8>, usage: &crate::domain::UsageInfo) -> Response {
    // ---
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
    for (name, value) in usage.header_pairs() {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    }
    (headers, bytes).into_response()
}

#[tracing::instrument(skip(state, principal, body), fields(user_id = %principal.id))]
pub async fn try_on(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<TryOnBody>, JsonRejection>,
) -> Response {
    // ---
    let start = Instant::now();

    let request = body
        .map_err(|rejection| TryOnError::InvalidRequest(rejection.body_text()))
        .and_then(|Json(body)| validate(body, &principal.id));

    let request = match request {
        Ok(request) => request,
        Err(err) => {
            tracing::info!(kind = err.kind(), "Try-on request rejected: {}", err);
            state.metrics().record_try_on(TryOnOutcome::Rejected, start);
            return err.into_response();
        }
    };

    tracing::debug!(
        category = request.category.as_str(),
        model_image_len = request.model_image.len(),
        garment_image_len = request.garment_image.len(),
        "Try-on request accepted"
    );

    match state.try_on().generate(request).await {
        Ok(image) => {
            tracing::info!(
                bytes = image.bytes.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Try-on succeeded"
            );
            state.metrics().record_try_on(TryOnOutcome::Success, start);
            image_response(image.bytes, &image.usage)
        }
        Err(err) => {
            tracing::warn!(
                kind = err.kind(),
                status = err.status_code().as_u16(),
                "Try-on failed: {}",
                err
            );
            state
                .metrics()
                .record_try_on(TryOnOutcome::UpstreamError, start);
            err.into_response()
        }
    }
}
