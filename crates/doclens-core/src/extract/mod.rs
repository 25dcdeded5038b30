//! Text extraction adapter: staged input in, request content out.

pub mod docx;
pub mod media;
pub mod pdf;

pub use media::{guess_mime, MediaKind, SelectedFile};

use crate::error::ExtractionError;
use crate::input::StagedInput;
use crate::request::InlineImage;

/// What a staged input turns into before it reaches the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Text(String),
    /// Images are forwarded untouched; the model does the recognition.
    Image(InlineImage),
}

/// Turn staged input into text or an inline image.
#[tracing::instrument(skip(staged), fields(source = staged.source_name()))]
pub async fn extract(staged: &StagedInput) -> Result<Extracted, ExtractionError> {
    match staged {
        StagedInput::Paste(text) => Ok(Extracted::Text(text.clone())),
        StagedInput::Camera(captured) => InlineImage::from_data_uri(captured.data_uri())
            .map(Extracted::Image)
            .ok_or_else(|| ExtractionError::Read("captured photo is not a valid image".to_string())),
        StagedInput::Upload(file) => {
            let bytes = tokio::fs::read(&file.path)
                .await
                .map_err(|e| ExtractionError::Read(e.to_string()))?;
            tracing::debug!(byte_len = bytes.len(), kind = ?file.kind, "file read into memory");

            match file.kind {
                MediaKind::Pdf => pdf::extract_text(bytes).await.map(Extracted::Text),
                MediaKind::Docx => tokio::task::spawn_blocking(move || docx::extract_raw_text(&bytes))
                    .await
                    .map_err(|e| ExtractionError::Read(format!("task join error: {e}")))?
                    .map(Extracted::Text),
                MediaKind::Image => Ok(Extracted::Image(InlineImage::from_bytes(
                    file.mime_type.clone(),
                    &bytes,
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CapturedImage;

    #[tokio::test]
    async fn test_paste_passes_through() {
        let out = extract(&StagedInput::Paste("  some text ".to_string())).await.unwrap();
        assert_eq!(out, Extracted::Text("  some text ".to_string()));
    }

    #[tokio::test]
    async fn test_uploaded_image_is_base64_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"abc").unwrap();
        let file = SelectedFile::from_path(&path).unwrap();

        let out = extract(&StagedInput::Upload(file)).await.unwrap();
        assert_eq!(out, Extracted::Image(InlineImage::from_bytes("image/png", b"abc")));
    }

    #[tokio::test]
    async fn test_camera_capture_becomes_image() {
        let captured = CapturedImage::from_jpeg(b"\xFF\xD8\xFF\xD9");
        let out = extract(&StagedInput::Camera(captured)).await.unwrap();
        match out {
            Extracted::Image(image) => assert_eq!(image.mime_type, "image/jpeg"),
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_file_removed_after_staging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let file = SelectedFile::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = extract(&StagedInput::Upload(file)).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Read(_)));
    }
}
