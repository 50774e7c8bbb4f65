//! Gemini (Google) composition backend.

use crate::error::{parse_retry_after, sanitize_error_message, LuminaError, Result};
use crate::image::prompt::composition_prompt;
use crate::image::provider::Compositor;
use crate::image::types::{CompositionConfig, DataUri, UploadedImage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variables checked for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_API_KEY", "API_KEY"];

/// MIME type assumed when a returned part does not declare one.
const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
        }
    }
}

/// Builder for GeminiCompositor.
#[derive(Debug, Clone, Default)]
pub struct GeminiCompositorBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
}

impl GeminiCompositorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API endpoint (proxies, tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the compositor, resolving the API key.
    ///
    /// A missing key is logged but not fatal; requests are still attempted
    /// and fail with the API's authentication error.
    pub fn build(self) -> Result<GeminiCompositor> {
        let api_key = self
            .api_key
            .or_else(|| {
                API_KEY_ENV_VARS
                    .iter()
                    .find_map(|var| std::env::var(var).ok())
            })
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            tracing::warn!(
                "no Gemini API key configured (set {} or {})",
                API_KEY_ENV_VARS[0],
                API_KEY_ENV_VARS[1]
            );
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GeminiCompositor {
            client: reqwest::Client::builder().build()?,
            api_key,
            model: self.model,
            base_url,
        })
    }
}

/// Gemini composition backend.
pub struct GeminiCompositor {
    client: reqwest::Client,
    api_key: Option<String>,
    model: GeminiModel,
    base_url: String,
}

impl GeminiCompositor {
    /// Creates a new `GeminiCompositorBuilder`.
    pub fn builder() -> GeminiCompositorBuilder {
        GeminiCompositorBuilder::new()
    }

    /// Returns true if an API key was resolved.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model.as_str())
    }

    async fn compose_impl(
        &self,
        backdrop: &UploadedImage,
        asset: &UploadedImage,
        config: &CompositionConfig,
    ) -> Result<DataUri> {
        let start = Instant::now();
        let url = format!("{}:generateContent", self.model_url());
        let body = GeminiRequest::for_composition(backdrop, asset, &composition_prompt(config));

        tracing::debug!(
            model = self.model.as_str(),
            backdrop = %backdrop.file_name,
            asset = %asset.file_name,
            has_instruction = config.instruction.is_some(),
            "submitting composition request"
        );

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-goog-api-key", key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let image = extract_image(gemini_response)?;

        tracing::debug!(
            mime_type = %image.mime_type,
            duration_ms = start.elapsed().as_millis() as u64,
            "composition complete"
        );

        Ok(image)
    }
}

#[async_trait]
impl Compositor for GeminiCompositor {
    async fn compose(
        &self,
        backdrop: &UploadedImage,
        asset: &UploadedImage,
        config: &CompositionConfig,
    ) -> Result<DataUri> {
        self.compose_impl(backdrop, asset, config).await
    }

    fn model(&self) -> &str {
        self.model.as_str()
    }

    async fn health_check(&self) -> Result<()> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LuminaError::Auth("no API key configured".into()))?;

        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let headers = response.headers().clone();
        let text = response.text().await.unwrap_or_default();
        Err(parse_error(status.as_u16(), &text, &headers))
    }
}

/// Picks the first inline image out of the first candidate.
///
/// Block reasons and finish reasons never discard an image that came back;
/// they are only logged when the response holds none.
fn extract_image(response: GeminiResponse) -> Result<DataUri> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason_message.or(feedback.block_reason));

    let Some(candidate) = response.candidates.into_iter().next() else {
        tracing::warn!(block_reason = ?block_reason, "response has no candidates");
        return Err(LuminaError::NoImageGenerated);
    };

    let image = candidate
        .content
        .into_iter()
        .flat_map(|c| c.parts)
        .filter_map(|p| p.inline_data)
        .find(|d| !d.data.is_empty());

    match image {
        Some(d) => {
            let mime_type = d
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
            Ok(DataUri::new(mime_type, d.data))
        }
        None => {
            tracing::warn!(
                block_reason = ?block_reason,
                finish_reason = ?candidate.finish_reason,
                "first candidate holds no inline image"
            );
            Err(LuminaError::NoImageGenerated)
        }
    }
}

/// Maps a non-success HTTP response onto an error carrying the API's message.
fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> LuminaError {
    let message = serde_json::from_str::<GeminiErrorBody>(text)
        .ok()
        .and_then(|body| body.error.message)
        .map(|m| sanitize_error_message(&m))
        .unwrap_or_else(|| sanitize_error_message(text));

    match status {
        401 | 403 => LuminaError::Auth(message),
        404 => LuminaError::InvalidRequest(message),
        429 => LuminaError::RateLimited {
            retry_after: parse_retry_after(headers).map(std::time::Duration::from_secs),
            message,
        },
        _ => {
            let lower = message.to_lowercase();
            if lower.contains("safety")
                || lower.contains("blocked")
                || lower.contains("prohibited")
            {
                LuminaError::ContentBlocked(message)
            } else {
                LuminaError::Api { status, message }
            }
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    /// Backdrop first, asset second, instruction text last.
    fn for_composition(backdrop: &UploadedImage, asset: &UploadedImage, prompt: &str) -> Self {
        let inline = |image: &UploadedImage| GeminiRequestPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: image.mime_type.clone(),
                data: image.base64.clone(),
            },
        };

        Self {
            contents: vec![GeminiContent {
                parts: vec![
                    inline(backdrop),
                    inline(asset),
                    GeminiRequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::intake::{acquire, PreviewStore};
    use crate::image::types::RawFile;
    use reqwest::header::HeaderMap;

    fn response(json: &str) -> GeminiResponse {
        serde_json::from_str(json).unwrap()
    }

    fn images() -> (UploadedImage, UploadedImage) {
        let mut previews = PreviewStore::new();
        let backdrop = acquire(
            &RawFile::new("beach.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]),
            &mut previews,
        )
        .unwrap();
        let asset = acquire(
            &RawFile::new("dog.png", "image/png", vec![0x89, 0x50, 0x4E]),
            &mut previews,
        )
        .unwrap();
        (backdrop, asset)
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::NanoBananaPro.as_str(),
            "nano-banana-pro-preview"
        );
        assert_eq!(GeminiModel::default(), GeminiModel::NanoBanana);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let compositor = GeminiCompositorBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::NanoBananaPro)
            .base_url("http://localhost:9999/")
            .build()
            .unwrap();
        assert!(compositor.has_api_key());
        assert_eq!(compositor.model(), "nano-banana-pro-preview");
        assert_eq!(
            compositor.model_url(),
            "http://localhost:9999/v1beta/models/nano-banana-pro-preview"
        );
    }

    #[test]
    fn test_request_part_order() {
        let (backdrop, asset) = images();
        let req = GeminiRequest::for_composition(&backdrop, &asset, "compose");
        let json = serde_json::to_value(&req).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], backdrop.base64);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], asset.base64);
        assert_eq!(parts[2]["text"], "compose");
    }

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let (backdrop, asset) = images();
        let req = GeminiRequest::for_composition(&backdrop, &asset, "compose");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE"])
        );
        assert!(json.get("generation_config").is_none());
    }

    #[test]
    fn test_extract_image_returns_data_uri() {
        let resp = response(
            r#"{
                "candidates": [{
                    "content": {
                        "parts": [
                            {"text": "Here is your composition"},
                            {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                        ]
                    },
                    "finishReason": "STOP"
                }]
            }"#,
        );
        let image = extract_image(resp).unwrap();
        assert_eq!(image.to_string(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn test_extract_image_defaults_mime_type() {
        let resp = response(
            r#"{"candidates": [{"content": {"parts": [{"inlineData": {"data": "AAAA"}}]}}]}"#,
        );
        assert_eq!(
            extract_image(resp).unwrap().to_string(),
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_extract_image_skips_empty_inline_data() {
        let resp = response(
            r#"{"candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": ""}},
                {"inlineData": {"mimeType": "image/jpeg", "data": "/9j/"}}
            ]}}]}"#,
        );
        assert_eq!(
            extract_image(resp).unwrap().to_string(),
            "data:image/jpeg;base64,/9j/"
        );
    }

    #[test]
    fn test_extract_image_no_candidates() {
        let resp = response(r#"{"candidates": []}"#);
        assert!(matches!(
            extract_image(resp),
            Err(LuminaError::NoImageGenerated)
        ));

        let resp = response("{}");
        assert!(matches!(
            extract_image(resp),
            Err(LuminaError::NoImageGenerated)
        ));
    }

    #[test]
    fn test_extract_image_text_only() {
        let resp = response(
            r#"{"candidates": [{"content": {"parts": [{"text": "I cannot do that"}]}}]}"#,
        );
        assert!(matches!(
            extract_image(resp),
            Err(LuminaError::NoImageGenerated)
        ));
    }

    #[test]
    fn test_extract_image_only_reads_first_candidate() {
        let resp = response(
            r#"{"candidates": [
                {"content": {"parts": [{"text": "no image"}]}},
                {"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "AAAA"}}]}}
            ]}"#,
        );
        assert!(matches!(
            extract_image(resp),
            Err(LuminaError::NoImageGenerated)
        ));
    }

    #[test]
    fn test_extract_image_block_reason_is_no_image() {
        let resp = response(r#"{"promptFeedback": {"blockReason": "OTHER"}}"#);
        assert!(matches!(
            extract_image(resp),
            Err(LuminaError::NoImageGenerated)
        ));

        let resp = response(
            r#"{
                "candidates": [],
                "promptFeedback": {
                    "blockReason": "SAFETY",
                    "blockReasonMessage": "Prompt was blocked due to safety"
                }
            }"#,
        );
        assert!(matches!(
            extract_image(resp),
            Err(LuminaError::NoImageGenerated)
        ));
    }

    #[test]
    fn test_extract_image_safety_finish_reason_without_image() {
        let resp = response(r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#);
        assert!(matches!(
            extract_image(resp),
            Err(LuminaError::NoImageGenerated)
        ));
    }

    #[test]
    fn test_extract_image_keeps_image_despite_safety_finish_reason() {
        let resp = response(
            r#"{"candidates": [{
                "content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "AAAA"}}]},
                "finishReason": "SAFETY"
            }]}"#,
        );
        assert_eq!(
            extract_image(resp).unwrap().to_string(),
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_parse_error_uses_api_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}"#;
        let err = parse_error(400, body, &HeaderMap::new());
        match err {
            LuminaError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid. Please pass a valid API key.");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_status_mapping() {
        let headers = HeaderMap::new();
        assert!(matches!(
            parse_error(403, r#"{"error": {"message": "denied"}}"#, &headers),
            LuminaError::Auth(m) if m == "denied"
        ));
        assert!(matches!(
            parse_error(404, "not found", &headers),
            LuminaError::InvalidRequest(_)
        ));
        assert!(matches!(
            parse_error(429, r#"{"error": {"message": "Resource has been exhausted"}}"#, &headers),
            LuminaError::RateLimited { retry_after: None, .. }
        ));
        assert!(matches!(
            parse_error(500, "request blocked by policy", &headers),
            LuminaError::ContentBlocked(_)
        ));
    }

    #[test]
    fn test_parse_error_empty_body_falls_back_to_generic() {
        let err = parse_error(503, "", &HeaderMap::new());
        assert_eq!(err.user_message(), crate::error::GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_health_check_without_key() {
        let compositor = GeminiCompositor {
            client: reqwest::Client::new(),
            api_key: None,
            model: GeminiModel::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
        };
        let result = compositor.health_check().await;
        assert!(matches!(result, Err(LuminaError::Auth(_))));
    }

    #[tokio::test]
    async fn test_compose_without_key_still_sends_request() {
        use crate::session::{ProcessingStatus, Slot};
        use crate::studio::Studio;
        use crate::CancelToken;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {
                    "code": 403,
                    "message": "Method doesn't allow unregistered callers.",
                    "status": "PERMISSION_DENIED"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Built directly so GOOGLE_API_KEY/API_KEY in the environment can't leak in
        let compositor = GeminiCompositor {
            client: reqwest::Client::new(),
            api_key: None,
            model: GeminiModel::default(),
            base_url: server.uri(),
        };
        let mut studio = Studio::new(compositor);
        studio
            .select_image(
                Slot::Backdrop,
                &RawFile::new("beach.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]),
            )
            .unwrap();
        studio
            .select_image(
                Slot::Asset,
                &RawFile::new("dog.png", "image/png", vec![0x89, 0x50, 0x4E]),
            )
            .unwrap();

        let status = studio.generate(&CancelToken::new()).await.unwrap();

        assert_eq!(status, ProcessingStatus::Error);
        assert_eq!(
            studio.state().error(),
            Some("Method doesn't allow unregistered callers.")
        );
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("x-goog-api-key").is_none());
    }
}
