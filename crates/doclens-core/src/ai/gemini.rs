use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatBackend, Content, FragmentStream, GenerateRequest};
use crate::config::Config;
use crate::error::{CommunicationError, ConfigError};
use crate::request::Part;
use crate::state::ChatRole;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiBlob>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    error: Option<GeminiApiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiApiError {
    #[serde(default)]
    message: String,
}

impl From<&Part> for GeminiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => GeminiPart {
                text: Some(text.clone()),
                inline_data: None,
            },
            Part::InlineImage(image) => GeminiPart {
                text: None,
                inline_data: Some(GeminiBlob {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                }),
            },
        }
    }
}

impl From<&Content> for GeminiContent {
    fn from(content: &Content) -> Self {
        let role = match content.role {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        };
        GeminiContent {
            role: Some(role.to_string()),
            parts: content.parts.iter().map(GeminiPart::from).collect(),
        }
    }
}

fn build_request(request: &GenerateRequest) -> GeminiRequest {
    GeminiRequest {
        system_instruction: GeminiContent {
            role: None,
            parts: vec![GeminiPart::from(&Part::Text(request.system_instruction.clone()))],
        },
        contents: request.contents.iter().map(GeminiContent::from).collect(),
    }
}

/// Client for the Gemini `streamGenerateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fails when no credential can be resolved.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.resolve_api_key()?;
        Ok(Self::new(&api_key, config.base_url()))
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn stream_generate(
        &self,
        request: GenerateRequest,
    ) -> Result<FragmentStream, CommunicationError> {
        let body = build_request(&request);
        tracing::debug!(
            model = %request.model,
            turns = request.contents.len(),
            "opening Gemini stream"
        );

        let response = self
            .client
            .post(self.stream_url(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CommunicationError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, "Gemini request rejected");
            return Err(CommunicationError::Status { status, body });
        }

        let bytes = Box::pin(response.bytes_stream());
        let state = (bytes, SseDecoder::default(), VecDeque::new(), false);
        let fragments = stream::unfold(
            state,
            |(mut bytes, mut decoder, mut pending, mut done)| async move {
                loop {
                    if let Some(item) = pending.pop_front() {
                        return Some((item, (bytes, decoder, pending, done)));
                    }
                    if done {
                        return None;
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                        Some(Err(e)) => {
                            pending.push_back(Err(CommunicationError::Stream(e.to_string())));
                            done = true;
                        }
                        None => {
                            pending.extend(decoder.finish());
                            done = true;
                        }
                    }
                }
            },
        );

        Ok(Box::pin(fragments))
    }
}

/// Incremental decoder for the `alt=sse` response body.
///
/// Network chunks may split a line (or a UTF-8 sequence) anywhere, so bytes
/// are buffered until a full line is available.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, CommunicationError>> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            out.extend(decode_line(&line));
        }
        out
    }

    /// Flush a final line that was not newline-terminated.
    fn finish(&mut self) -> Vec<Result<String, CommunicationError>> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line).into_iter().collect()
    }
}

fn decode_line(raw: &[u8]) -> Option<Result<String, CommunicationError>> {
    let line = String::from_utf8_lossy(raw);
    let data = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    let chunk: GeminiChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(CommunicationError::Stream(format!(
                "malformed event: {e}"
            ))))
        }
    };

    if let Some(error) = chunk.error {
        return Some(Err(CommunicationError::Backend(error.message)));
    }
    if chunk.candidates.is_empty() {
        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Some(Err(CommunicationError::Backend(format!(
                "request blocked: {reason}"
            ))));
        }
    }

    let text: String = chunk
        .candidates
        .first()
        .map(|c| {
            c.content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        None
    } else {
        Some(Ok(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::InlineImage;

    fn event(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":{}}}]}}}}]}}\r\n\r\n",
            serde_json::to_string(text).unwrap()
        )
    }

    fn texts(items: Vec<Result<String, CommunicationError>>) -> Vec<String> {
        items.into_iter().map(|i| i.unwrap()).collect()
    }

    #[test]
    fn test_decodes_events_in_order() {
        let mut decoder = SseDecoder::default();
        let body = format!("{}{}", event("Hello"), event(", world"));
        assert_eq!(texts(decoder.push(body.as_bytes())), vec!["Hello", ", world"]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let body = event("Xin chào");
        let bytes = body.as_bytes();
        // split inside the multi-byte "à"
        let cut = body.find("à").unwrap() + 1;

        assert!(decoder.push(&bytes[..cut]).is_empty());
        assert_eq!(texts(decoder.push(&bytes[cut..])), vec!["Xin chào"]);
    }

    #[test]
    fn test_unterminated_last_line_flushed() {
        let mut decoder = SseDecoder::default();
        let body = event("tail");
        let trimmed = body.trim_end();
        assert!(decoder.push(trimmed.as_bytes()).is_empty());
        assert_eq!(texts(decoder.finish()), vec!["tail"]);
    }

    #[test]
    fn test_mid_stream_error_event() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push(b"data: {\"error\":{\"code\":500,\"message\":\"internal\"}}\n");
        assert_eq!(
            items,
            vec![Err(CommunicationError::Backend("internal".to_string()))]
        );
    }

    #[test]
    fn test_blocked_prompt_is_error() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push(b"data: {\"promptFeedback\":{\"blockReason\":\"SAFETY\"}}\n");
        assert!(matches!(&items[0], Err(CommunicationError::Backend(m)) if m.contains("SAFETY")));
    }

    #[test]
    fn test_ignores_non_data_lines_and_empty_text() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push(b": keep-alive\n\nevent: message\ndata: {\"candidates\":[]}\n");
        assert!(items.is_empty());
    }

    #[test]
    fn test_malformed_json_is_stream_error() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push(b"data: {not json\n");
        assert!(matches!(&items[0], Err(CommunicationError::Stream(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateRequest {
            model: "gemini-2.5-flash".to_string(),
            system_instruction: "be brief".to_string(),
            contents: vec![Content::user(vec![
                Part::InlineImage(InlineImage::from_bytes("image/png", b"abc")),
                Part::Text("read it".to_string()),
            ])],
        };
        let json = serde_json::to_value(build_request(&request)).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["data"], "YWJj");
        assert_eq!(json["contents"][0]["parts"][1]["text"], "read it");
    }

    #[test]
    fn test_history_roles_serialized() {
        let request = GenerateRequest {
            model: "m".to_string(),
            system_instruction: String::new(),
            contents: vec![
                Content::user(vec![Part::Text("q".to_string())]),
                Content::model("a"),
                Content::user(vec![Part::Text("q2".to_string())]),
            ],
        };
        let json = serde_json::to_value(build_request(&request)).unwrap();
        let roles: Vec<_> = json["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[test]
    fn test_stream_url() {
        let client = GeminiClient::new("key", "http://localhost:8080/");
        assert_eq!(
            client.stream_url("gemini-2.5-flash"),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_from_config_uses_file_key() {
        let config = Config {
            api_key: Some("from-file".to_string()),
            ..Config::default()
        };
        assert!(GeminiClient::from_config(&config).is_ok());
    }
}
