use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::llm::chat::transcript::{TokenUsage, Turn};
use crate::llm::models::provider_base::{
    wire_messages, ChatResponse, ChunkStream, GenerationParams, ProviderClient, ResponseChunk,
};

/// Client for Ollama's native `/api/chat`, which streams newline-delimited
/// JSON objects rather than SSE frames. The terminal object (`done: true`)
/// carries the evaluation counts that map to token usage.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    pub endpoint: String,
    pub model: String,
    params: GenerationParams,
    http_client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(endpoint: String, model: String, params: GenerationParams) -> Self {
        Self { endpoint, model, params, http_client: reqwest::Client::new() }
    }

    pub(crate) fn request_body(&self, turns: &[Turn], stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": wire_messages(turns),
            "stream": stream,
            "options": {
                "temperature": self.params.temperature,
                "num_predict": self.params.max_tokens,
            },
        })
    }

    async fn post_chat(&self, body: &Value) -> Result<reqwest::Response> {
        let url = chat_url(&self.endpoint);
        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to reach Ollama endpoint {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error ({}): {}", status, error_text);
        }
        Ok(response)
    }
}

impl ProviderClient for OllamaClient {
    async fn stream_chat(&self, turns: Vec<Turn>) -> Result<ChunkStream> {
        let body = self.request_body(&turns, true);
        let response = self.post_chat(&body).await?;

        let stream = response.bytes_stream();
        let stream = tokio_stream::StreamExt::map(stream, |chunk| {
            chunk.context("failed to read stream chunk")
        });

        Ok(Box::pin(async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut stream = Box::pin(stream);
            'read: while let Some(bytes_result) = tokio_stream::StreamExt::next(&mut stream).await {
                let bytes = bytes_result?;
                buffer.extend_from_slice(bytes.as_ref());

                while let Some(line) = extract_ndjson_line(&mut buffer) {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let v: Value = serde_json::from_str(&line)
                        .context("failed to parse NDJSON line")?;
                    let done = v.get("done").and_then(|d| d.as_bool()).unwrap_or(false);
                    let chunk = chunk_from_chat_json(&v);
                    if !chunk.text.is_empty() || chunk.usage.is_some() {
                        yield Ok(chunk);
                    }
                    if done {
                        break 'read;
                    }
                }
            }
        }))
    }

    async fn chat(&self, turns: Vec<Turn>) -> Result<ChatResponse> {
        let body = self.request_body(&turns, false);
        let response = self.post_chat(&body).await?;

        let v: Value = response.json().await.context("failed to parse response JSON")?;
        let text = v
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .context("response carried no message content")?
            .to_string();

        Ok(ChatResponse { text, usage: usage_from_chat_json(&v) })
    }
}

pub(crate) fn chat_url(endpoint: &str) -> String {
    format!("{}/api/chat", endpoint.trim_end_matches('/'))
}

pub(crate) fn extract_ndjson_line(buffer: &mut Vec<u8>) -> Option<String> {
    let pos = buffer.iter().position(|b| *b == b'\n')?;
    let line: Vec<u8> = buffer.drain(..pos).collect();
    buffer.drain(..1);
    Some(String::from_utf8_lossy(&line).into_owned())
}

pub(crate) fn usage_from_chat_json(v: &Value) -> Option<TokenUsage> {
    let input = v.get("prompt_eval_count").and_then(|c| c.as_u64());
    let output = v.get("eval_count").and_then(|c| c.as_u64());
    if input.is_none() && output.is_none() {
        return None;
    }
    let total = match (input, output) {
        (Some(i), Some(o)) => Some(i + o),
        _ => None,
    };
    Some(TokenUsage { input_tokens: input, output_tokens: output, total_tokens: total })
}

pub(crate) fn chunk_from_chat_json(v: &Value) -> ResponseChunk {
    let text = v
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    ResponseChunk { text, usage: usage_from_chat_json(v), is_complete: false }
}
