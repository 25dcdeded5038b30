pub mod gemini;

pub use gemini::GeminiClient;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::CommunicationError;
use crate::request::Part;
use crate::state::ChatRole;

/// Text fragments of one streamed reply, in receipt order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CommunicationError>> + Send>>;

/// One turn of conversation history as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub role: ChatRole,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: ChatRole::User,
            parts,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            parts: vec![Part::Text(text.into())],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: String,
    /// Full history, ending with the new user turn.
    pub contents: Vec<Content>,
}

/// A hosted model that streams its replies.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open one streaming round trip. Errors before the first byte are
    /// returned here; later failures arrive as stream items.
    async fn stream_generate(
        &self,
        request: GenerateRequest,
    ) -> Result<FragmentStream, CommunicationError>;
}
