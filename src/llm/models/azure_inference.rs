use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::llm::chat::transcript::Turn;
use crate::llm::models::openai::{response_from_json, sse_chunk_stream};
use crate::llm::models::provider_base::{
    wire_messages, ChatResponse, ChunkStream, GenerationParams, ProviderClient,
};

pub(crate) const AZURE_INFERENCE_API_VERSION: &str = "2024-05-01-preview";

/// Azure AI Inference (model catalog / serverless endpoints). Same message
/// shape as chat completions, `api-key` header, model named in the body.
#[derive(Debug, Clone)]
pub struct AzureAiInferenceClient {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    params: GenerationParams,
    http_client: reqwest::Client,
}

impl AzureAiInferenceClient {
    pub fn new(endpoint: String, api_key: String, model: String, params: GenerationParams) -> Self {
        Self { endpoint, api_key, model, params, http_client: reqwest::Client::new() }
    }

    fn request_body(&self, turns: &[Turn], stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": wire_messages(turns),
            "stream": stream,
            "temperature": self.params.temperature,
            "max_tokens": self.params.max_tokens,
        })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let url = inference_chat_url(&self.endpoint);
        self.http_client
            .post(&url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to reach Azure AI Inference endpoint {}", url))
    }
}

impl ProviderClient for AzureAiInferenceClient {
    async fn stream_chat(&self, turns: Vec<Turn>) -> Result<ChunkStream> {
        let body = self.request_body(&turns, true);
        let response = self.post(&body).await?;
        sse_chunk_stream(response).await
    }

    async fn chat(&self, turns: Vec<Turn>) -> Result<ChatResponse> {
        let body = self.request_body(&turns, false);
        let response = self.post(&body).await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Azure AI Inference API error ({}): {}", status, error_text);
        }

        let v: Value = response.json().await.context("failed to parse response JSON")?;
        response_from_json(&v)
    }
}

pub(crate) fn inference_chat_url(endpoint: &str) -> String {
    format!(
        "{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        AZURE_INFERENCE_API_VERSION
    )
}
