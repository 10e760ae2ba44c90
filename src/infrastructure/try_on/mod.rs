//! Client for the remote IDM-VTON image-generation endpoint.
//!
//! One inbound try-on call maps to exactly one upstream POST; nothing is
//! retried. Upstream statuses are folded into [`TryOnError`] here so handlers
//! only ever see the local taxonomy.

use crate::config::UpstreamConfig;
use crate::domain::{
    GarmentCategory, GeneratedImage, TryOnError, TryOnGateway, TryOnGatewayPtr, TryOnRequest,
    UsageInfo,
};
use anyhow::{Context, Result};
use axum::http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

const API_KEY_HEADER: &str = "x-api-key";

const NO_RESPONSE: &str = "no response received from upstream API";

const UNKNOWN_ERROR: &str = "unknown error occurred";

/// Longest upstream error text passed back to callers.
const MAX_DETAIL_LEN: usize = 500;

/// Fixed generation parameters.
const STEPS: u32 = 30;
const SEED_RANGE: std::ops::Range<u32> = 0..1000;

/// Request body expected by the upstream.
#[derive(Debug, Serialize)]
struct IdmVtonPayload<'a> {
    crop: bool,
    seed: u32,
    steps: u32,
    category: GarmentCategory,
    force_dc: bool,
    human_img: &'a str,
    garm_img: &'a str,
    mask_only: bool,
    garment_des: &'a str,
}

fn build_payload(request: &TryOnRequest, seed: u32) -> IdmVtonPayload<'_> {
    // ---
    IdmVtonPayload {
        crop: false,
        seed,
        steps: STEPS,
        category: request.category,
        force_dc: false,
        human_img: &request.model_image,
        garm_img: &request.garment_image,
        mask_only: false,
        garment_des: &request.description,
    }
}

/// Creates the upstream gateway from configuration.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built.
pub fn create_segmind_gateway(config: &UpstreamConfig) -> Result<TryOnGatewayPtr> {
    // ---
    Ok(Arc::new(SegmindClient::new(config)?))
}

pub struct SegmindClient {
    // ---
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl SegmindClient {
    // ---
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        // ---
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            http,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl TryOnGateway for SegmindClient {
    // ---
    async fn generate(&self, request: TryOnRequest) -> Result<GeneratedImage, TryOnError> {
        // ---
        let seed = rand::thread_rng().gen_range(SEED_RANGE);
        let payload = build_payload(&request, seed);

        tracing::debug!(
            seed,
            category = request.category.as_str(),
            model_image_len = request.model_image.len(),
            garment_image_len = request.garment_image.len(),
            "Sending try-on request upstream"
        );

        let response = self
            .http
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                // ---
                tracing::warn!("Upstream request failed: {}", e);
                no_response()
            })?;

        let status = response.status();
        let headers = response.headers().clone();

        let body = response.bytes().await.map_err(|e| {
            // ---
            tracing::warn!(%status, "Failed to read upstream body: {}", e);
            no_response()
        })?;

        interpret_response(status, &headers, body.to_vec())
    }
}

fn no_response() -> TryOnError {
    // ---
    TryOnError::UpstreamUnreachable {
        status: None,
        detail: NO_RESPONSE.to_string(),
        usage: UsageInfo::default(),
    }
}

fn is_jpeg(headers: &HeaderMap) -> bool {
    // ---
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("image/jpeg"))
}

/// Best human-readable text from an upstream error body.
fn error_detail(body: &[u8]) -> String {
    // ---
    let text = String::from_utf8_lossy(body);
    let text = text.trim();

    let from_json = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    let detail = from_json.unwrap_or_else(|| text.to_string());
    if detail.is_empty() {
        return UNKNOWN_ERROR.to_string();
    }

    detail.chars().take(MAX_DETAIL_LEN).collect()
}

/// Map one upstream response onto the local result.
///
/// Only `200` with `image/jpeg` succeeds; its bytes are returned untouched.
fn interpret_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: Vec<u8>,
) -> Result<GeneratedImage, TryOnError> {
    // ---
    let usage = UsageInfo::from_headers(headers);

    tracing::info!(
        %status,
        remaining_credits = usage.remaining_credits.as_deref(),
        rate_limit_remaining = usage.rate_limit_remaining.as_deref(),
        rate_limit_reset = usage.rate_limit_reset.as_deref(),
        generation_time = headers.get("x-generation-time").and_then(|v| v.to_str().ok()),
        "Upstream responded"
    );

    if status == StatusCode::OK && is_jpeg(headers) {
        return Ok(GeneratedImage { bytes: body, usage });
    }

    if status.is_success() {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        tracing::error!(%status, ?content_type, body_len = body.len(), "Unexpected upstream success shape");
        return Err(TryOnError::UpstreamProtocolError {
            status,
            content_type,
            usage,
        });
    }

    let err = match status.as_u16() {
        401 => TryOnError::UpstreamAuthError { usage },
        404 => TryOnError::UpstreamNotFound { usage },
        405 => TryOnError::UpstreamBadMethod { usage },
        406 => TryOnError::UpstreamQuotaExceeded { usage },
        429 => TryOnError::UpstreamRateLimited { usage },
        500 => TryOnError::UpstreamInternalError { usage },
        _ => TryOnError::UpstreamUnreachable {
            status: Some(status),
            detail: error_detail(&body),
            usage,
        },
    };

    Err(err)
}
