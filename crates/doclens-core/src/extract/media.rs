use std::path::{Path, PathBuf};

use crate::error::ValidationError;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// What the extractor will do with a staged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Docx,
    Image,
}

impl MediaKind {
    /// Accepts `application/pdf`, a `.docx` file name, or any `image/*` type.
    pub fn classify(file_name: &str, mime_type: &str) -> Result<Self, ValidationError> {
        if mime_type == PDF_MIME {
            Ok(MediaKind::Pdf)
        } else if file_name.to_ascii_lowercase().ends_with(".docx") {
            Ok(MediaKind::Docx)
        } else if mime_type.starts_with("image/") {
            Ok(MediaKind::Image)
        } else {
            let shown = if mime_type.is_empty() { file_name } else { mime_type };
            Err(ValidationError::UnsupportedFileType(shown.to_string()))
        }
    }
}

/// Media type from a file extension. Unknown extensions map to
/// `application/octet-stream`.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => PDF_MIME,
        "docx" => DOCX_MIME,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "zip" => "application/zip",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// A file chosen in upload mode. Bytes are read only at extraction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub kind: MediaKind,
}

impl SelectedFile {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let mime_type = mime_type.into();
        let kind = MediaKind::classify(&name, &mime_type)?;
        Ok(Self {
            path: path.into(),
            name,
            mime_type,
            size,
            kind,
        })
    }

    /// Stat a path and classify it by extension.
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let metadata = std::fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .ok_or_else(|| ValidationError::FileNotFound(path.display().to_string()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self::new(path, name, guess_mime(path), metadata.len())
    }

    pub fn size_kb(&self) -> u64 {
        (self.size + 512) / 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_accepted_types() {
        assert_eq!(MediaKind::classify("a.pdf", PDF_MIME).unwrap(), MediaKind::Pdf);
        assert_eq!(MediaKind::classify("a.docx", "").unwrap(), MediaKind::Docx);
        assert_eq!(MediaKind::classify("A.DOCX", DOCX_MIME).unwrap(), MediaKind::Docx);
        assert_eq!(MediaKind::classify("scan.heic", "image/heic").unwrap(), MediaKind::Image);
    }

    #[test]
    fn test_classify_rejects_zip() {
        let err = MediaKind::classify("archive.zip", "application/zip").unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedFileType("application/zip".to_string()));
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("x/Report.PDF")), PDF_MIME);
        assert_eq!(guess_mime(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = SelectedFile::from_path(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ValidationError::FileNotFound(_)));
    }

    #[test]
    fn test_from_path_stats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let file = SelectedFile::from_path(&path).unwrap();
        assert_eq!(file.name, "notes.png");
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.kind, MediaKind::Image);
        assert_eq!(file.size_kb(), 2);
    }
}
