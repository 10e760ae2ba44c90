use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Upstream header carrying the account's remaining credits.
pub const REMAINING_CREDITS_HEADER: &str = "x-remaining-credits";

/// Upstream header carrying the UTC time the rate limit window resets.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset-at-utc";

/// Upstream header carrying the requests left in the current window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-rate-limit-remaining";

/// Garment placement passed through to the upstream model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GarmentCategory {
    // ---
    #[default]
    UpperBody,
    LowerBody,
    Dresses,
}

impl GarmentCategory {
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            GarmentCategory::UpperBody => "upper_body",
            GarmentCategory::LowerBody => "lower_body",
            GarmentCategory::Dresses => "dresses",
        }
    }
}

/// One try-on call. Images are URLs or base64 content and are never transcoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryOnRequest {
    // ---
    pub model_image: String,
    pub garment_image: String,
    pub category: GarmentCategory,
    pub description: String,
}

/// Quota state reported by the upstream, copied verbatim from its headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageInfo {
    // ---
    pub remaining_credits: Option<String>,
    pub rate_limit_reset: Option<String>,
    pub rate_limit_remaining: Option<String>,
}

impl UsageInfo {
    /// Collect the quota headers present in an upstream response.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        // ---
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        Self {
            remaining_credits: read(REMAINING_CREDITS_HEADER),
            rate_limit_reset: read(RATE_LIMIT_RESET_HEADER),
            rate_limit_remaining: read(RATE_LIMIT_REMAINING_HEADER),
        }
    }

    /// Header name/value pairs for the fields that are present.
    pub fn header_pairs(&self) -> Vec<(&'static str, &str)> {
        // ---
        [
            (REMAINING_CREDITS_HEADER, self.remaining_credits.as_deref()),
            (RATE_LIMIT_RESET_HEADER, self.rate_limit_reset.as_deref()),
            (RATE_LIMIT_REMAINING_HEADER, self.rate_limit_remaining.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

/// A composited image returned by the upstream.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    // ---
    /// JPEG bytes exactly as received.
    pub bytes: Vec<u8>,
    pub usage: UsageInfo,
}

fn reset_label(usage: &UsageInfo) -> &str {
    // ---
    usage.rate_limit_reset.as_deref().unwrap_or("the reset time")
}

/// Stable client-facing taxonomy for a failed try-on call.
#[derive(Debug, Error)]
pub enum TryOnError {
    // ---
    /// The inbound request failed validation; the upstream was not called.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("invalid API key")]
    UpstreamAuthError { usage: UsageInfo },

    #[error("endpoint not found")]
    UpstreamNotFound { usage: UsageInfo },

    #[error("invalid request method")]
    UpstreamBadMethod { usage: UsageInfo },

    #[error("insufficient credits")]
    UpstreamQuotaExceeded { usage: UsageInfo },

    #[error("rate limit exceeded, try again after {}", reset_label(.usage))]
    UpstreamRateLimited { usage: UsageInfo },

    #[error("upstream server error, try again later")]
    UpstreamInternalError { usage: UsageInfo },

    /// No response at all (`status == None`), or a status outside the table.
    #[error("{detail}")]
    UpstreamUnreachable {
        status: Option<StatusCode>,
        detail: String,
        usage: UsageInfo,
    },

    /// A 2xx response that is not a JPEG image.
    #[error("invalid response from upstream API")]
    UpstreamProtocolError {
        status: StatusCode,
        content_type: Option<String>,
        usage: UsageInfo,
    },
}

impl TryOnError {
    /// Status sent back to the caller.
    pub fn status_code(&self) -> StatusCode {
        // ---
        match self {
            TryOnError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            TryOnError::UpstreamAuthError { .. } => StatusCode::UNAUTHORIZED,
            TryOnError::UpstreamNotFound { .. } => StatusCode::NOT_FOUND,
            TryOnError::UpstreamBadMethod { .. } => StatusCode::METHOD_NOT_ALLOWED,
            TryOnError::UpstreamQuotaExceeded { .. } => StatusCode::NOT_ACCEPTABLE,
            TryOnError::UpstreamRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            TryOnError::UpstreamInternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            TryOnError::UpstreamUnreachable { status, .. } => status
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            TryOnError::UpstreamProtocolError { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        // ---
        matches!(self, TryOnError::UpstreamRateLimited { .. })
    }

    /// Quota state to thread through to the caller, when the upstream sent any.
    pub fn usage(&self) -> Option<&UsageInfo> {
        // ---
        match self {
            TryOnError::InvalidRequest(_) => None,
            TryOnError::UpstreamAuthError { usage }
            | TryOnError::UpstreamNotFound { usage }
            | TryOnError::UpstreamBadMethod { usage }
            | TryOnError::UpstreamQuotaExceeded { usage }
            | TryOnError::UpstreamRateLimited { usage }
            | TryOnError::UpstreamInternalError { usage }
            | TryOnError::UpstreamUnreachable { usage, .. }
            | TryOnError::UpstreamProtocolError { usage, .. } => Some(usage),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        // ---
        match self {
            TryOnError::InvalidRequest(_) => "invalid_request",
            TryOnError::UpstreamAuthError { .. } => "upstream_auth_error",
            TryOnError::UpstreamNotFound { .. } => "upstream_not_found",
            TryOnError::UpstreamBadMethod { .. } => "upstream_bad_method",
            TryOnError::UpstreamQuotaExceeded { .. } => "upstream_quota_exceeded",
            TryOnError::UpstreamRateLimited { .. } => "upstream_rate_limited",
            TryOnError::UpstreamInternalError { .. } => "upstream_internal_error",
            TryOnError::UpstreamUnreachable { .. } => "upstream_unreachable",
            TryOnError::UpstreamProtocolError { .. } => "upstream_protocol_error",
        }
    }
}

/// JSON error body returned by the try-on endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TryOnErrorBody<'a> {
    // ---
    message: String,
    is_rate_limit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_credits: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit_reset: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit_remaining: Option<&'a str>,
}

impl IntoResponse for TryOnError {
    fn into_response(self) -> Response {
        // ---
        let usage = self.usage();
        let body = TryOnErrorBody {
            message: self.to_string(),
            is_rate_limit: self.is_rate_limit(),
            remaining_credits: usage.and_then(|u| u.remaining_credits.as_deref()),
            rate_limit_reset: usage.and_then(|u| u.rate_limit_reset.as_deref()),
            rate_limit_remaining: usage.and_then(|u| u.rate_limit_remaining.as_deref()),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Remote image-generation service performing the actual compositing.
#[async_trait::async_trait]
pub trait TryOnGateway: Send + Sync {
    // ---
    /// Issue exactly one upstream call. Failures are never retried.
    async fn generate(&self, request: TryOnRequest) -> Result<GeneratedImage, TryOnError>;
}

/// Type alias for any backend that implements TryOnGateway.
pub type TryOnGatewayPtr = Arc<dyn TryOnGateway>;
