use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::llm::chat::transcript::Turn;
use crate::llm::models::openai::{response_from_json, sse_chunk_stream};
use crate::llm::models::provider_base::{
    wire_messages, ChatResponse, ChunkStream, GenerationParams, ProviderClient,
};

pub(crate) const AZURE_OPENAI_API_VERSION: &str = "2024-06-01";

/// Azure OpenAI scopes requests to a deployment instead of naming a model
/// in the body, and authenticates with an `api-key` header. The response
/// shape matches the plain chat-completions protocol.
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    params: GenerationParams,
    http_client: reqwest::Client,
}

impl AzureOpenAiClient {
    pub fn new(
        endpoint: String,
        api_key: String,
        deployment: String,
        params: GenerationParams,
    ) -> Self {
        Self { endpoint, api_key, deployment, params, http_client: reqwest::Client::new() }
    }

    fn request_body(&self, turns: &[Turn], stream: bool) -> Value {
        let mut body = json!({
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

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let url = deployment_chat_url(&self.endpoint, &self.deployment);
        self.http_client
            .post(&url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to reach Azure OpenAI endpoint {}", url))
    }
}

impl ProviderClient for AzureOpenAiClient {
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
            anyhow::bail!("Azure OpenAI API error ({}): {}", status, error_text);
        }

        let v: Value = response.json().await.context("failed to parse response JSON")?;
        response_from_json(&v)
    }
}

pub(crate) fn deployment_chat_url(endpoint: &str, deployment: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        AZURE_OPENAI_API_VERSION
    )
}
