use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::{AppConfig, ExecutionSettings, ProviderDescriptor};
use crate::cons::provider_cons::ProviderKind;
use crate::error::{ChatError, ChatResult};
use crate::llm::chat::transcript::Turn;

use super::azure_inference::AzureAiInferenceClient;
use super::azure_openai::AzureOpenAiClient;
use super::ollama::OllamaClient;
use super::openai::{create_huggingface, create_lmstudio, create_openai, OpenAiClient};
pub use super::provider_base::{
    ChatResponse, ChunkStream, GenerationParams, ProviderClient, ResponseChunk,
};

pub enum AnyProviderClient {
    AzureOpenAi(AzureOpenAiClient),
    OpenAi(OpenAiClient),
    Ollama(OllamaClient),
    AzureAiInference(AzureAiInferenceClient),
    #[cfg(test)]
    Mock(super::mock::MockClient),
}

impl AnyProviderClient {
    /// Descriptive attributes of the bound client (model id, deployment
    /// name, endpoint), for display surfaces.
    pub fn attributes(&self) -> HashMap<&'static str, String> {
        let mut attrs = HashMap::new();
        match self {
            AnyProviderClient::AzureOpenAi(c) => {
                attrs.insert("deployment", c.deployment.clone());
                attrs.insert("endpoint", c.endpoint.clone());
            }
            AnyProviderClient::OpenAi(c) => {
                attrs.insert("model", c.model.clone());
                attrs.insert("endpoint", c.api_base.clone());
            }
            AnyProviderClient::Ollama(c) => {
                attrs.insert("model", c.model.clone());
                attrs.insert("endpoint", c.endpoint.clone());
            }
            AnyProviderClient::AzureAiInference(c) => {
                attrs.insert("model", c.model.clone());
                attrs.insert("endpoint", c.endpoint.clone());
            }
            #[cfg(test)]
            AnyProviderClient::Mock(_) => {}
        }
        attrs
    }
}

impl ProviderClient for AnyProviderClient {
    async fn stream_chat(&self, turns: Vec<Turn>) -> Result<ChunkStream> {
        match self {
            AnyProviderClient::AzureOpenAi(c) => c.stream_chat(turns).await,
            AnyProviderClient::OpenAi(c) => c.stream_chat(turns).await,
            AnyProviderClient::Ollama(c) => c.stream_chat(turns).await,
            AnyProviderClient::AzureAiInference(c) => c.stream_chat(turns).await,
            #[cfg(test)]
            AnyProviderClient::Mock(c) => c.stream_chat(turns).await,
        }
    }

    async fn chat(&self, turns: Vec<Turn>) -> Result<ChatResponse> {
        match self {
            AnyProviderClient::AzureOpenAi(c) => c.chat(turns).await,
            AnyProviderClient::OpenAi(c) => c.chat(turns).await,
            AnyProviderClient::Ollama(c) => c.chat(turns).await,
            AnyProviderClient::AzureAiInference(c) => c.chat(turns).await,
            #[cfg(test)]
            AnyProviderClient::Mock(c) => c.chat(turns).await,
        }
    }
}

/// Binds a validated configuration section into a vendor client. Callers
/// must have run the section's validity check first.
fn create_client(kind: ProviderKind, config: &AppConfig, settings: &ExecutionSettings) -> AnyProviderClient {
    let params = GenerationParams {
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    };

    match kind {
        ProviderKind::AzureOpenAi => {
            let s = config.azure_openai.as_ref().expect("validated section");
            AnyProviderClient::AzureOpenAi(AzureOpenAiClient::new(
                s.endpoint.clone(),
                s.api_key.clone(),
                s.deployment_name.clone(),
                params,
            ))
        }
        ProviderKind::OpenAi => {
            let s = config.openai.as_ref().expect("validated section");
            AnyProviderClient::OpenAi(create_openai(
                s.api_key.clone(),
                s.model_id.clone(),
                s.organization_id.clone(),
                params,
            ))
        }
        ProviderKind::HuggingFace => {
            let s = config.huggingface.as_ref().expect("validated section");
            AnyProviderClient::OpenAi(create_huggingface(
                s.endpoint.clone(),
                s.api_key.clone(),
                s.model_id.clone(),
                params,
            ))
        }
        ProviderKind::Ollama => {
            let s = config.ollama.as_ref().expect("validated section");
            AnyProviderClient::Ollama(OllamaClient::new(
                s.endpoint.clone(),
                s.model_id.clone(),
                params,
            ))
        }
        ProviderKind::LmStudio => {
            let s = config.lmstudio.as_ref().expect("validated section");
            AnyProviderClient::OpenAi(create_lmstudio(
                s.endpoint.clone(),
                s.model_id.clone(),
                params,
            ))
        }
        ProviderKind::AzureAiInference => {
            let s = config.azure_ai_inference.as_ref().expect("validated section");
            AnyProviderClient::AzureAiInference(AzureAiInferenceClient::new(
                s.endpoint.clone(),
                s.api_key.clone(),
                s.model_id.clone(),
                params,
            ))
        }
    }
}

/// A configured provider as reported by `list_providers`.
#[derive(Debug, Clone)]
pub struct ProviderListing {
    pub descriptor: ProviderDescriptor,
    /// Enabled and valid. Reachability of the remote endpoint is not
    /// probed; a listed provider can still fail at call time.
    pub available: bool,
}

/// Owns one cached client per provider. The cache is the only shared state
/// in this layer; get-or-create runs as a single critical section per call
/// so concurrent coordinators never construct duplicate handles.
pub struct ProviderClientFactory {
    config: AppConfig,
    cache: Mutex<HashMap<ProviderKind, Arc<AnyProviderClient>>>,
}

impl ProviderClientFactory {
    pub fn new(config: AppConfig) -> Self {
        Self { config, cache: Mutex::new(HashMap::new()) }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the cached handle for `provider_id`, constructing and caching
    /// one on first use. Construction allocates a long-lived HTTP client.
    pub fn get_or_create(&self, provider_id: &str) -> ChatResult<Arc<AnyProviderClient>> {
        let kind = ProviderKind::from_name(provider_id)
            .ok_or_else(|| ChatError::UnsupportedProvider(provider_id.to_string()))?;
        if self.config.descriptor(kind).is_none() {
            return Err(ChatError::UnsupportedProvider(provider_id.to_string()));
        }
        self.config
            .validate(kind)
            .map_err(|reason| ChatError::invalid_configuration(kind.provider_name(), reason))?;

        let mut cache = self.cache.lock().expect("provider cache poisoned");
        if let Some(existing) = cache.get(&kind) {
            return Ok(Arc::clone(existing));
        }

        let settings = self.config.execution_settings(kind.provider_name())?;
        log::info!("creating client for provider {}", kind);
        let client = Arc::new(create_client(kind, &self.config, &settings));
        cache.insert(kind, Arc::clone(&client));
        Ok(client)
    }

    /// Every configured provider, augmented with availability.
    pub fn list_providers(&self) -> Vec<ProviderListing> {
        self.config
            .descriptors()
            .into_iter()
            .map(|descriptor| {
                let available = descriptor.enabled && self.config.validate(descriptor.kind).is_ok();
                ProviderListing { descriptor, available }
            })
            .collect()
    }

    /// Pure validity/enabled check; never touches the network.
    pub fn is_available(&self, provider_id: &str) -> bool {
        self.config.is_configured(provider_id)
    }

    pub fn default_provider_id(&self) -> ChatResult<String> {
        self.config.default_provider_id()
    }

    /// Drops the cached handle for `provider_id`, if any. The client is
    /// released once the last coordinator lets go of its `Arc`.
    pub fn evict(&self, provider_id: &str) -> bool {
        let Some(kind) = ProviderKind::from_name(provider_id) else {
            return false;
        };
        let mut cache = self.cache.lock().expect("provider cache poisoned");
        cache.remove(&kind).is_some()
    }

    #[cfg(test)]
    pub(crate) fn inject_for_tests(&self, kind: ProviderKind, client: Arc<AnyProviderClient>) {
        self.cache
            .lock()
            .expect("provider cache poisoned")
            .insert(kind, client);
    }
}
