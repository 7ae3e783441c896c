use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::pin::Pin;
use tokio_stream::Stream;

use crate::llm::chat::transcript::{TokenUsage, Turn};
use crate::llm::models::provider_base::{
    wire_messages, ChatResponse, ChunkStream, GenerationParams, ProviderClient, ResponseChunk,
};

pub(crate) fn extract_sse_frame_from_buffer(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let mut delimiter_len = 0usize;
    let delimiter_pos = if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
        delimiter_len = 4;
        Some(pos)
    } else {
        buffer.windows(2).position(|w| w == b"\n\n").map(|pos| {
            delimiter_len = 2;
            pos
        })
    }?;

    let frame = buffer.drain(..delimiter_pos).collect::<Vec<u8>>();
    buffer.drain(..delimiter_len);
    Some(frame)
}

pub(crate) fn sse_data_from_frame(frame: &str) -> Option<String> {
    let mut data_parts: Vec<&str> = Vec::new();

    for raw_line in frame.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            data_parts.push(rest);
        }
    }

    if data_parts.is_empty() {
        return None;
    }
    Some(data_parts.join("\n"))
}

pub(crate) fn sse_data_stream<T>(
    stream: Pin<Box<dyn Stream<Item = Result<T>> + Send>>,
) -> Pin<Box<dyn Stream<Item = Result<String>> + Send>>
where
    T: AsRef<[u8]> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut stream = stream;
        while let Some(chunk_result) = tokio_stream::StreamExt::next(&mut stream).await {
            let bytes = chunk_result?;
            buffer.extend_from_slice(bytes.as_ref());

            while let Some(frame_bytes) = extract_sse_frame_from_buffer(&mut buffer) {
                let frame = String::from_utf8_lossy(&frame_bytes);
                if let Some(data) = sse_data_from_frame(&frame) {
                    yield Ok(data);
                }
            }
        }

        if !buffer.is_empty() {
            let frame = String::from_utf8_lossy(&buffer);
            if let Some(data) = sse_data_from_frame(&frame) {
                yield Ok(data);
            }
        }
    })
}

/// Token usage in chat-completions shape, also used by the Azure clients.
pub(crate) fn usage_from_response(v: &Value) -> Option<TokenUsage> {
    let usage = v.get("usage")?;
    if usage.is_null() {
        return None;
    }
    let parsed = TokenUsage {
        input_tokens: usage.get("prompt_tokens").and_then(|t| t.as_u64()),
        output_tokens: usage.get("completion_tokens").and_then(|t| t.as_u64()),
        total_tokens: usage.get("total_tokens").and_then(|t| t.as_u64()),
    };
    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

/// One SSE payload of a chat-completions stream, reduced to a chunk. The
/// usage-only frame emitted under `stream_options.include_usage` has an
/// empty `choices` array and carries the final counts.
pub(crate) fn chunk_from_stream_json(v: &Value) -> ResponseChunk {
    let text = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();

    ResponseChunk { text, usage: usage_from_response(v), is_complete: false }
}

pub(crate) fn response_from_json(v: &Value) -> Result<ChatResponse> {
    let text = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .context("response carried no message content")?
        .to_string();

    Ok(ChatResponse { text, usage: usage_from_response(v) })
}

/// Client for OpenAI-compatible chat-completion endpoints. Also backs the
/// LM Studio and HuggingFace providers, which speak the same protocol.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub organization: Option<String>,
    params: GenerationParams,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_base: String, api_key: String, model: String, params: GenerationParams) -> Self {
        Self {
            api_base,
            api_key,
            model,
            organization: None,
            params,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization;
        self
    }

    pub(crate) fn request_body(&self, turns: &[Turn], stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": wire_messages(turns),
            "stream": stream,
            "temperature": self.params.temperature,
            "max_tokens": self.params.max_tokens,
        });
        if stream {
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    async fn post_chat_completions(&self, body: &Value) -> Result<reqwest::Response> {
        let candidates = chat_completions_url_candidates(&self.api_base);
        let mut last_err: Option<anyhow::Error> = None;

        for url in &candidates {
            let mut request = self
                .http_client
                .post(url)
                .header("Content-Type", "application/json");
            if !self.api_key.is_empty() {
                request = request.header("Authorization", format!("Bearer {}", self.api_key));
            }
            if let Some(org) = &self.organization {
                request = request.header("OpenAI-Organization", org);
            }

            match request.json(body).send().await {
                Ok(resp) => {
                    // Bases differ in whether they already carry /v1.
                    if resp.status() == reqwest::StatusCode::NOT_FOUND {
                        last_err = Some(anyhow::anyhow!("chat endpoint not found: {}", url));
                        continue;
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    last_err = Some(
                        anyhow::anyhow!(e).context(format!("failed to reach chat endpoint {}", url)),
                    );
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no chat endpoint candidates to try")))
    }
}

impl ProviderClient for OpenAiClient {
    async fn stream_chat(&self, turns: Vec<Turn>) -> Result<ChunkStream> {
        let body = self.request_body(&turns, true);
        let response = self.post_chat_completions(&body).await?;
        sse_chunk_stream(response).await
    }

    async fn chat(&self, turns: Vec<Turn>) -> Result<ChatResponse> {
        let body = self.request_body(&turns, false);
        let response = self.post_chat_completions(&body).await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("chat API error ({}): {}", status, error_text);
        }

        let v: Value = response.json().await.context("failed to parse response JSON")?;
        response_from_json(&v)
    }
}

/// Turns an SSE chat-completions response into a `ResponseChunk` stream.
/// Shared with the Azure clients, whose streams have the same shape.
pub(crate) async fn sse_chunk_stream(response: reqwest::Response) -> Result<ChunkStream> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("chat API error ({}): {}", status, error_text);
    }

    let stream = response.bytes_stream();
    let stream =
        tokio_stream::StreamExt::map(stream, |chunk| chunk.context("failed to read stream chunk"));
    let stream = sse_data_stream(Box::pin(stream));

    Ok(Box::pin(async_stream::stream! {
        let mut stream = stream;
        while let Some(data_result) = tokio_stream::StreamExt::next(&mut stream).await {
            let data = data_result?;
            if data.trim() == "[DONE]" {
                break;
            }
            let v: Value = serde_json::from_str(&data)
                .context("failed to parse JSON from SSE data")?;
            let chunk = chunk_from_stream_json(&v);
            if !chunk.text.is_empty() || chunk.usage.is_some() {
                yield Ok(chunk);
            }
        }
    }))
}

pub(crate) fn chat_completions_url_candidates(api_base: &str) -> Vec<String> {
    let base = api_base.trim_end_matches('/');
    vec![
        format!("{}/chat/completions", base),
        format!("{}/v1/chat/completions", base),
    ]
}

pub fn create_openai(
    api_key: String,
    model: String,
    organization: Option<String>,
    params: GenerationParams,
) -> OpenAiClient {
    OpenAiClient::new("https://api.openai.com/v1".to_string(), api_key, model, params)
        .with_organization(organization)
}

/// LM Studio serves the OpenAI protocol locally and ignores credentials.
pub fn create_lmstudio(endpoint: String, model: String, params: GenerationParams) -> OpenAiClient {
    OpenAiClient::new(endpoint, String::new(), model, params)
}

pub const HUGGINGFACE_ROUTER_BASE: &str = "https://router.huggingface.co/v1";

/// The HuggingFace inference router is OpenAI-compatible.
pub fn create_huggingface(
    endpoint: Option<String>,
    api_key: String,
    model: String,
    params: GenerationParams,
) -> OpenAiClient {
    let base = endpoint.unwrap_or_else(|| HUGGINGFACE_ROUTER_BASE.to_string());
    OpenAiClient::new(base, api_key, model, params)
}
