//! Saving a generated composition to disk.

use crate::error::Result;
use crate::image::DataUri;
use std::path::{Path, PathBuf};

/// File name prefix for saved compositions.
pub const FILE_PREFIX: &str = "lumina-composition-";

/// Returns the download file name for a Unix timestamp in milliseconds.
pub fn composition_filename(timestamp_ms: i64) -> String {
    format!("{FILE_PREFIX}{timestamp_ms}.png")
}

/// Decodes a data URI and writes it into `dir` under a timestamped name.
///
/// The name always ends in `.png`, whatever the payload's MIME type.
pub fn save_composition(data_uri: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
    save_composition_at(data_uri, dir, chrono::Utc::now().timestamp_millis())
}

/// Like [`save_composition`], with an explicit timestamp.
pub fn save_composition_at(
    data_uri: &str,
    dir: impl AsRef<Path>,
    timestamp_ms: i64,
) -> Result<PathBuf> {
    let bytes = DataUri::parse(data_uri)?.decode()?;
    let path = dir.as_ref().join(composition_filename(timestamp_ms));
    std::fs::write(&path, &bytes)?;
    tracing::debug!(path = %path.display(), size_bytes = bytes.len(), "saved composition");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LuminaError;

    #[test]
    fn test_composition_filename() {
        assert_eq!(
            composition_filename(1_700_000_000_123),
            "lumina-composition-1700000000123.png"
        );
    }

    #[test]
    fn test_save_composition_writes_decoded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_composition("data:image/png;base64,iVBORw0KGgo=", dir.path()).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        let digits = name
            .strip_prefix(FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(".png"))
            .unwrap();
        assert!(!digits.is_empty());
        assert!(digits.chars().all(|c| c.is_ascii_digit()));

        assert_eq!(
            std::fs::read(&path).unwrap(),
            vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
        );
    }

    #[test]
    fn test_save_composition_keeps_png_name_for_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_composition_at("data:image/jpeg;base64,/9j/4A==", dir.path(), 42).unwrap();
        assert_eq!(path, dir.path().join("lumina-composition-42.png"));
    }

    #[test]
    fn test_save_composition_rejects_invalid_uri() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            save_composition("not a data uri", dir.path()),
            Err(LuminaError::Decode(_))
        ));
        assert!(matches!(
            save_composition("data:image/png;base64,@@@", dir.path()),
            Err(LuminaError::Decode(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
