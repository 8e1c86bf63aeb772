//! OpenAI-compatible streaming provider.
//!
//! Works with OpenRouter, OpenAI, and any endpoint that speaks the
//! `/chat/completions` SSE protocol with function tools.
//!
//! Tool call fragments are forwarded exactly as they arrive, keyed by index.
//! Reassembly happens downstream.

use std::time::Duration;

use async_trait::async_trait;
use codeclaw_core::error::ProviderError;
use codeclaw_core::message::{Message, Role};
use codeclaw_core::provider::*;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible streaming provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        // No overall timeout: a long answer may stream for minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls: Vec<ApiToolCall> = m
                    .tool_calls
                    .iter()
                    .map(|tc| ApiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect();

                // Assistant turns that only call tools carry a null content.
                let content = if m.content.is_empty() && !tool_calls.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                };

                ApiMessage {
                    role: match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                        Role::System => "system",
                        Role::Tool => "tool",
                    },
                    content,
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function",
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Build the JSON body of a streaming request.
    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        if request.web_search {
            body["plugins"] = serde_json::json!([{ "id": "web" }]);
        }

        body
    }
}

/// Map a non-success HTTP status to a provider error.
fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited,
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

#[async_trait]
impl codeclaw_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "no API key; set CODECLAW_API_KEY or api_key in ~/.codeclaw/config.toml".into(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(status_error(status, error_body));
        }

        let (tx, rx) = mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and forward decoded chunks.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for event in decoder.push(&bytes) {
                    let chunk = match event {
                        SseEvent::Chunk(chunk) => chunk,
                        SseEvent::Done => StreamChunk {
                            done: true,
                            ..StreamChunk::default()
                        },
                        SseEvent::Failed(reason) => {
                            warn!(provider = %provider_name, reason = %reason, "Provider failed mid-stream");
                            let _ = tx.send(Err(ProviderError::StreamInterrupted(reason))).await;
                            return;
                        }
                        SseEvent::Unparsed { data, error } => {
                            trace!(provider = %provider_name, data = %data, error = %error, "Ignoring unparseable SSE chunk");
                            continue;
                        }
                    };
                    let done = chunk.done;
                    if tx.send(Ok(chunk)).await.is_err() {
                        return; // receiver dropped
                    }
                    if done {
                        return;
                    }
                }
            }

            // A body that ends without [DONE] was cut off.
            let _ = tx
                .send(Err(ProviderError::StreamInterrupted(
                    "response ended before [DONE]".into(),
                )))
                .await;
        });

        Ok(rx)
    }
}

/// One decoded server-sent event.
#[derive(Debug)]
enum SseEvent {
    Chunk(StreamChunk),
    Done,
    /// The server reported an error inside the stream.
    Failed(String),
    Unparsed { data: String, error: String },
}

/// Incremental SSE line decoder.
///
/// Bytes may split lines (and UTF-8 sequences) anywhere; only complete
/// lines are decoded.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                events.push(SseEvent::Done);
                continue;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(resp) => {
                    if let Some(reason) = resp.failure() {
                        events.push(SseEvent::Failed(reason));
                    } else if let Some(chunk) = resp.into_chunk() {
                        events.push(SseEvent::Chunk(chunk));
                    }
                }
                Err(e) => events.push(SseEvent::Unparsed {
                    data: data.to_string(),
                    error: e.to_string(),
                }),
            }
        }

        events
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: &'static str,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<StreamError>,
}

/// Error object some gateways (OpenRouter among them) embed mid-stream.
#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl StreamResponse {
    /// Why the stream failed, if this chunk reports a failure.
    fn failure(&self) -> Option<String> {
        if let Some(err) = &self.error {
            let message = err.message.as_deref().unwrap_or("unknown error");
            return Some(match &err.code {
                Some(code) => format!("{message} (code {code})"),
                None => message.to_string(),
            });
        }
        self.choices
            .iter()
            .any(|c| c.finish_reason.as_deref() == Some("error"))
            .then(|| "finish_reason: error".to_string())
    }

    /// Convert to a chunk; `None` if it carries nothing.
    fn into_chunk(self) -> Option<StreamChunk> {
        let mut chunk = StreamChunk::default();

        if let Some(choice) = self.choices.into_iter().next() {
            chunk.content = choice.delta.content.filter(|c| !c.is_empty());
            chunk.tool_calls = choice
                .delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| {
                    let (name, arguments) = match tc.function {
                        Some(f) => (f.name, f.arguments),
                        None => (None, None),
                    };
                    ToolCallDelta {
                        index: tc.index,
                        id: tc.id,
                        name,
                        arguments,
                    }
                })
                .collect();
        }

        chunk.usage = self.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let empty = chunk.content.is_none() && chunk.tool_calls.is_empty() && chunk.usage.is_none();
        (!empty).then_some(chunk)
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta; arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeclaw_core::MessageToolCall;
    use codeclaw_core::Provider;

    fn request(messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: "test/model".into(),
            messages,
            temperature: 0.2,
            max_tokens: Some(512),
            tools: vec![],
            web_search: false,
        }
    }

    #[test]
    fn openrouter_constructor() {
        let provider = OpenAiCompatProvider::openrouter("sk-test").unwrap();
        assert_eq!(provider.name(), "openrouter");
        assert!(provider.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider = OpenAiCompatProvider::new("custom", "http://localhost:8080/v1/", "k").unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[tokio::test]
    async fn missing_api_key_is_not_configured() {
        let provider = OpenAiCompatProvider::openrouter("").unwrap();
        let err = provider.stream(request(vec![Message::user("hi")])).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn tool_only_assistant_turn_has_null_content() {
        let msg = Message::assistant_tool_calls(
            None,
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "execute_command".into(),
                arguments: r#"{"command":"ls"}"#.into(),
            }],
        );
        let api = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert!(api[0].content.is_none());
        let json = serde_json::to_value(&api[0]).unwrap();
        assert!(json["content"].is_null());
        assert_eq!(json["tool_calls"][0]["function"]["name"], "execute_command");
    }

    #[test]
    fn tool_response_references_call() {
        let api = OpenAiCompatProvider::to_api_messages(&[Message::tool_result("call_1", "data")]);
        assert_eq!(api[0].role, "tool");
        assert_eq!(api[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn body_includes_tools_usage_and_web_plugin() {
        let mut req = request(vec![Message::user("hi")]);
        req.tools = vec![ToolDefinition {
            name: "read_file".into(),
            description: "Read a file".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        req.web_search = true;

        let body = OpenAiCompatProvider::request_body(&req);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
        assert_eq!(body["plugins"][0]["id"], "web");
    }

    #[test]
    fn body_omits_plugins_without_web_search() {
        let body = OpenAiCompatProvider::request_body(&request(vec![Message::user("hi")]));
        assert!(body.get("plugins").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(status_error(429, String::new()), ProviderError::RateLimited));
        assert!(matches!(status_error(401, String::new()), ProviderError::AuthenticationFailed(_)));
        let err = status_error(502, "bad gateway".into());
        assert!(err.is_retryable());
        assert!(!status_error(400, "bad request".into()).is_retryable());
    }

    // --- SSE decoding ---

    fn chunks(events: Vec<SseEvent>) -> Vec<StreamChunk> {
        events
            .into_iter()
            .filter_map(|e| match e {
                SseEvent::Chunk(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn decodes_content_delta() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"},\"finish_reason\":null}]}\n\n");
        let chunks = chunks(events);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn line_split_across_pushes() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"choices\":[{\"delta\":{\"con").is_empty());
        let chunks = chunks(decoder.push(b"tent\":\"Hi\"}}]}\r\n"));
        assert_eq!(chunks[0].content.as_deref(), Some("Hi"));
    }

    #[test]
    fn multibyte_character_split_across_pushes() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n";
        let bytes = line.as_bytes();
        let split = line.find('\u{e9}').unwrap() + 1;
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let chunks = chunks(decoder.push(&bytes[split..]));
        assert_eq!(chunks[0].content.as_deref(), Some("caf\u{e9}"));
    }

    #[test]
    fn tool_call_fragments_are_forwarded_raw() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(
            concat!(
                "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_abc\",\"function\":{\"name\":\"wri\",\"arguments\":\"\"}}]}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"te_file\",\"arguments\":\"{\\\"path\\\"\"}}]}}]}\n",
            )
            .as_bytes(),
        );
        let chunks = chunks(events);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].tool_calls[0].id.as_deref(), Some("call_abc"));
        assert_eq!(chunks[0].tool_calls[0].name.as_deref(), Some("wri"));
        assert_eq!(chunks[1].tool_calls[0].id, None);
        assert_eq!(chunks[1].tool_calls[0].name.as_deref(), Some("te_file"));
        assert_eq!(chunks[1].tool_calls[0].arguments.as_deref(), Some("{\"path\""));
    }

    #[test]
    fn usage_chunk_and_done_marker() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(
            b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n\ndata: [DONE]\n",
        );
        assert_eq!(events.len(), 2);
        match &events[0] {
            SseEvent::Chunk(c) => {
                let usage = c.usage.unwrap();
                assert_eq!(usage.prompt_tokens, 10);
                assert_eq!(usage.completion_tokens, 5);
            }
            other => panic!("expected usage chunk, got {other:?}"),
        }
        assert!(matches!(events[1], SseEvent::Done));
    }

    #[test]
    fn empty_deltas_and_comments_are_skipped() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\n\ndata: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\nevent: ping\n");
        assert!(events.is_empty());
    }

    #[test]
    fn error_event_mid_stream_fails_the_turn() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(
            concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Partial\"}}]}\n",
                "data: {\"error\":{\"message\":\"upstream overloaded\",\"code\":502},\"choices\":[{\"finish_reason\":\"error\"}]}\n",
                "data: [DONE]\n",
            )
            .as_bytes(),
        );
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], SseEvent::Chunk(_)));
        match &events[1] {
            SseEvent::Failed(reason) => {
                assert!(reason.contains("upstream overloaded"));
                assert!(reason.contains("502"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn error_finish_reason_without_error_object_fails() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"error\"}]}\n");
        assert!(matches!(events[0], SseEvent::Failed(_)));
    }

    #[test]
    fn garbage_data_is_reported_unparsed() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {not json\n");
        assert!(matches!(events[0], SseEvent::Unparsed { .. }));
    }
}
