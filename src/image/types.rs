//! Core types for image intake and composition.

use crate::error::{LuminaError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image formats recognized when sniffing local files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
    /// GIF format.
    Gif,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        None
    }
}

/// A user-supplied file as handed over by a file picker or drop target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    /// File name as reported by the picker.
    pub name: String,
    /// Declared content type (e.g. `image/png`).
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl RawFile {
    /// Creates a file from its parts.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Session-scoped handle to a local preview of an uploaded image.
///
/// Only meaningful to the [`PreviewStore`](crate::image::PreviewStore) that
/// issued it. Must be revoked once the image it points at is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviewRef(pub(crate) u64);

impl fmt::Display for PreviewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preview://{}", self.0)
    }
}

/// An image accepted into one of the two slots.
///
/// Replaced wholesale when a new file is chosen, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    /// Name of the original file.
    pub file_name: String,
    /// Size of the original file in bytes.
    pub size_bytes: usize,
    /// Local preview reference.
    pub preview: PreviewRef,
    /// Base64 (standard alphabet, padded) encoding of the file contents.
    pub base64: String,
    /// Declared MIME type of the file.
    pub mime_type: String,
}

impl UploadedImage {
    /// Returns the image as a data URI.
    pub fn to_data_uri(&self) -> DataUri {
        DataUri::new(&self.mime_type, &self.base64)
    }
}

/// Options for one composition request.
///
/// The three adjustment flags are always set and are not read by the
/// request builder; the prompt alone controls the edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionConfig {
    /// Match backdrop lighting.
    pub match_lighting: bool,
    /// Match backdrop color temperature.
    pub match_color_temp: bool,
    /// Synthesize soft shadows.
    pub soft_shadows: bool,
    /// Optional free-text directive appended to the prompt.
    pub instruction: Option<String>,
}

impl CompositionConfig {
    /// Builds a config from the raw instruction field; blank text becomes `None`.
    pub fn new(instruction: &str) -> Self {
        let trimmed = instruction.trim();
        Self {
            instruction: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            ..Self::default()
        }
    }
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            match_lighting: true,
            match_color_temp: true,
            soft_shadows: true,
            instruction: None,
        }
    }
}

/// A `data:<mime>;base64,<payload>` string split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use = "data URI should be stored or saved"]
pub struct DataUri {
    /// MIME type of the payload.
    pub mime_type: String,
    /// Base64 payload, kept exactly as received.
    pub data: String,
}

impl DataUri {
    /// Creates a data URI from a MIME type and a base64 payload.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parses a base64 data URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| LuminaError::Decode("not a data URI".into()))?;
        let (mime_type, data) = rest
            .split_once(";base64,")
            .ok_or_else(|| LuminaError::Decode("data URI is not base64 encoded".into()))?;
        Ok(Self::new(mime_type, data))
    }

    /// Decodes the payload into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|e| LuminaError::Decode(e.to_string()))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}
