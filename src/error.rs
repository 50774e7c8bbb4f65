//! Error types for image intake and composition requests.

use std::time::Duration;

/// Message stored in the error state when a failure carries no text of its own.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "An unexpected error occurred while processing the composition.";

/// Upper bound on API error text kept in an error value.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while preparing or running a composition.
#[derive(Debug, thiserror::Error)]
pub enum LuminaError {
    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message reported by the API.
        message: String,
    },

    /// Quota or rate limit exceeded.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Suggested delay from the `Retry-After` header.
        retry_after: Option<Duration>,
        /// Message reported by the API.
        message: String,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters (unknown model, malformed payload).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response carried no inline image.
    #[error("no image was generated in the response")]
    NoImageGenerated,

    /// A supplied file is not an image.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Generate was triggered while an image slot is empty.
    #[error("missing {0} image")]
    MissingImage(String),

    /// Generate was triggered while another composition is in flight.
    #[error("a composition is already in progress")]
    Busy,

    /// The in-flight request was cancelled.
    #[error("composition cancelled")]
    Cancelled,

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to read or decode image data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (reading an input, saving a download).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered with something we could not interpret.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl LuminaError {
    /// Returns the text shown to the user when a composition fails.
    ///
    /// API-originated variants yield the API's own message verbatim. An
    /// empty message falls back to [`GENERIC_FAILURE_MESSAGE`].
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Auth(m)
            | Self::ContentBlocked(m)
            | Self::InvalidRequest(m)
            | Self::UnexpectedResponse(m) => m.clone(),
            Self::Api { message, .. } | Self::RateLimited { message, .. } => message.clone(),
            other => other.to_string(),
        };
        if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message
        }
    }
}

/// Result type alias for composition operations.
pub type Result<T> = std::result::Result<T, LuminaError>;

/// Reads a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Trims API error text, redacts anything shaped like a Google API key and
/// caps the length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut rest = text.trim();

    // Google keys: "AIza" followed by 35 URL-safe characters
    while let Some(pos) = rest.find("AIza") {
        cleaned.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let key_len = tail
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(tail.len());
        if key_len >= 39 {
            cleaned.push_str("[REDACTED]");
        } else {
            cleaned.push_str(&tail[..key_len]);
        }
        rest = &tail[key_len..];
    }
    cleaned.push_str(rest);

    if cleaned.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = cleaned.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        return format!("{truncated}...");
    }
    cleaned
}
