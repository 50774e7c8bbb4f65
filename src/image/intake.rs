//! Image intake: validation, preview bookkeeping and base64 encoding.

use crate::error::{LuminaError, Result};
use crate::image::types::{ImageFormat, PreviewRef, RawFile, UploadedImage};
use base64::Engine;
use std::collections::HashSet;
use std::path::Path;

/// Content type declared for files whose type cannot be determined.
const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// Issues and tracks session-scoped preview references.
///
/// Every reference handed out stays live until revoked. Replacing or
/// clearing a slot must revoke the old reference so nothing leaks for the
/// rest of the session.
#[derive(Debug, Default)]
pub struct PreviewStore {
    next_id: u64,
    live: HashSet<PreviewRef>,
}

impl PreviewStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new live preview reference.
    pub fn create(&mut self) -> PreviewRef {
        self.next_id += 1;
        let preview = PreviewRef(self.next_id);
        self.live.insert(preview);
        preview
    }

    /// Releases a preview reference. Returns false if it was not live.
    pub fn revoke(&mut self, preview: PreviewRef) -> bool {
        self.live.remove(&preview)
    }

    /// Returns true if the reference has been issued and not yet revoked.
    pub fn is_live(&self, preview: PreviewRef) -> bool {
        self.live.contains(&preview)
    }

    /// Number of live references.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

/// Returns true if a declared content type names an image.
pub fn is_image_type(content_type: &str) -> bool {
    content_type
        .trim()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Accepts a file into an [`UploadedImage`], registering a preview for it.
///
/// Non-image content types are rejected with
/// [`LuminaError::UnsupportedMediaType`] and empty files with
/// [`LuminaError::Decode`]; in both cases no preview is issued.
pub fn acquire(file: &RawFile, previews: &mut PreviewStore) -> Result<UploadedImage> {
    if !is_image_type(&file.content_type) {
        return Err(LuminaError::UnsupportedMediaType(format!(
            "{} ({})",
            file.name, file.content_type
        )));
    }
    if file.bytes.is_empty() {
        return Err(LuminaError::Decode(format!("{} is empty", file.name)));
    }

    let base64 = base64::engine::general_purpose::STANDARD.encode(&file.bytes);
    let preview = previews.create();

    tracing::debug!(
        file = %file.name,
        mime_type = %file.content_type,
        size_bytes = file.bytes.len(),
        %preview,
        "accepted image"
    );

    Ok(UploadedImage {
        file_name: file.name.clone(),
        size_bytes: file.bytes.len(),
        preview,
        base64,
        mime_type: file.content_type.trim().to_string(),
    })
}

/// Reads a file from disk, declaring its content type from the extension
/// and falling back to magic-byte sniffing.
pub fn read_file(path: impl AsRef<Path>) -> Result<RawFile> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    let content_type = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .or_else(|| ImageFormat::from_magic_bytes(&bytes))
        .map(|f| f.mime_type())
        .unwrap_or(UNKNOWN_CONTENT_TYPE);

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(RawFile::new(name, content_type, bytes))
}
