use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Raw image bytes (base64) with their declared media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload, no `data:` prefix.
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        if mime_type.is_empty() || payload.is_empty() {
            return None;
        }
        Some(Self {
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Approximate decoded size in bytes.
    pub fn decoded_len(&self) -> usize {
        self.data.len() / 4 * 3
    }
}

/// One component of a turn's request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    InlineImage(InlineImage),
}

/// The content of one user turn.
///
/// Only two shapes exist: a single text part, or an inline image followed by
/// its instruction text. The fields are private so no other shape can be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    parts: Vec<Part>,
}

impl TurnRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn image(image: InlineImage, instruction: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::InlineImage(image), Part::Text(instruction.into())],
        }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    pub fn has_image(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::InlineImage(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_parsing() {
        let image = InlineImage::from_data_uri("data:image/jpeg;base64,/9j/4AAQ").unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, "/9j/4AAQ");
        assert_eq!(image.to_data_uri(), "data:image/jpeg;base64,/9j/4AAQ");
    }

    #[test]
    fn test_data_uri_rejects_non_base64() {
        assert!(InlineImage::from_data_uri("data:text/plain,hello").is_none());
        assert!(InlineImage::from_data_uri("image/png;base64,AAAA").is_none());
        assert!(InlineImage::from_data_uri("data:image/png;base64,").is_none());
    }

    #[test]
    fn test_from_bytes_encodes_base64() {
        let image = InlineImage::from_bytes("image/png", b"abc");
        assert_eq!(image.data, "YWJj");
    }

    #[test]
    fn test_image_turn_puts_image_first() {
        let request = TurnRequest::image(InlineImage::from_bytes("image/png", b"x"), "read it");
        assert!(request.has_image());
        assert!(matches!(request.parts()[0], Part::InlineImage(_)));
        assert_eq!(request.parts()[1], Part::Text("read it".to_string()));
    }

    #[test]
    fn test_text_turn_is_single_part() {
        let request = TurnRequest::text("hello");
        assert!(!request.has_image());
        assert_eq!(request.parts().len(), 1);
    }
}
