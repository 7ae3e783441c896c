use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

use crate::cons::provider_cons::{ProviderKind, ALL_PROVIDER_KINDS};
use crate::error::{ChatError, ChatResult};

fn default_true() -> bool {
    true
}

/// Optional per-provider generation overrides, flattened into each section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOverrides {
    #[serde(rename = "Temperature", alias = "temperature", default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(rename = "MaxTokens", alias = "max_tokens", default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(rename = "SystemPrompt", alias = "system_prompt", default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureOpenAiSection {
    #[serde(rename = "Endpoint", alias = "endpoint", default)]
    pub endpoint: String,
    #[serde(rename = "ApiKey", alias = "api_key", default)]
    pub api_key: String,
    #[serde(rename = "DeploymentName", alias = "deployment_name", default)]
    pub deployment_name: String,
    #[serde(rename = "Enabled", alias = "enabled", default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub generation: GenerationOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSection {
    #[serde(rename = "ApiKey", alias = "api_key", default)]
    pub api_key: String,
    #[serde(rename = "ModelId", alias = "model_id", default)]
    pub model_id: String,
    #[serde(rename = "OrganizationId", alias = "organization_id", default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(rename = "Enabled", alias = "enabled", default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub generation: GenerationOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuggingFaceSection {
    #[serde(rename = "ApiKey", alias = "api_key", default)]
    pub api_key: String,
    #[serde(rename = "ModelId", alias = "model_id", default)]
    pub model_id: String,
    /// Defaults to the HuggingFace inference router when absent.
    #[serde(rename = "Endpoint", alias = "endpoint", default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(rename = "Enabled", alias = "enabled", default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub generation: GenerationOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSection {
    #[serde(rename = "Endpoint", alias = "endpoint", default)]
    pub endpoint: String,
    #[serde(rename = "ModelId", alias = "model_id", default)]
    pub model_id: String,
    #[serde(rename = "Enabled", alias = "enabled", default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub generation: GenerationOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmStudioSection {
    #[serde(rename = "Endpoint", alias = "endpoint", default)]
    pub endpoint: String,
    #[serde(rename = "ModelId", alias = "model_id", default)]
    pub model_id: String,
    #[serde(rename = "Enabled", alias = "enabled", default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub generation: GenerationOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureAiInferenceSection {
    #[serde(rename = "Endpoint", alias = "endpoint", default)]
    pub endpoint: String,
    #[serde(rename = "ApiKey", alias = "api_key", default)]
    pub api_key: String,
    #[serde(rename = "ModelId", alias = "model_id", default)]
    pub model_id: String,
    #[serde(rename = "Enabled", alias = "enabled", default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub generation: GenerationOverrides,
}

fn default_max_history() -> usize {
    20
}

fn default_system_message() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(rename = "DefaultProvider", alias = "default_provider", default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    #[serde(rename = "MaxChatHistoryMessages", alias = "max_chat_history_messages", default = "default_max_history")]
    pub max_chat_history_messages: usize,
    #[serde(rename = "DefaultSystemMessage", alias = "default_system_message", default = "default_system_message")]
    pub default_system_message: String,
    #[serde(rename = "DefaultTemperature", alias = "default_temperature", default = "default_temperature")]
    pub default_temperature: f64,
    #[serde(rename = "DefaultMaxTokens", alias = "default_max_tokens", default = "default_max_tokens")]
    pub default_max_tokens: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        ChatSettings {
            default_provider: None,
            max_chat_history_messages: default_max_history(),
            default_system_message: default_system_message(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
        }
    }
}

/// Immutable view of one configured provider, augmented by the factory with
/// availability when listed.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    pub display_name: &'static str,
    pub is_online: bool,
    pub default_model: String,
    pub enabled: bool,
}

impl ProviderDescriptor {
    pub fn id(&self) -> &'static str {
        self.kind.provider_name()
    }
}

/// Generation parameters for one provider after merging its overrides onto
/// the `ChatAI` defaults.
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
}

/// User override configuration (restricted fields)
#[derive(Deserialize)]
pub struct UserOverrideConfig {
    #[serde(rename = "ChatAI", alias = "chat_ai")]
    pub chat: Option<ChatSettings>,
    #[serde(rename = "AzureOpenAI", alias = "azure_openai")]
    pub azure_openai: Option<AzureOpenAiSection>,
    #[serde(rename = "OpenAI", alias = "openai")]
    pub openai: Option<OpenAiSection>,
    #[serde(rename = "HuggingFace", alias = "huggingface", alias = "hugging_face")]
    pub huggingface: Option<HuggingFaceSection>,
    #[serde(rename = "Ollama", alias = "ollama")]
    pub ollama: Option<OllamaSection>,
    #[serde(rename = "LMStudio", alias = "lmstudio", alias = "lm_studio")]
    pub lmstudio: Option<LmStudioSection>,
    #[serde(rename = "AzureAIInference", alias = "azure_ai_inference")]
    pub azure_ai_inference: Option<AzureAiInferenceSection>,
}

/// Global application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "ChatAI", alias = "chat_ai", default)]
    pub chat: ChatSettings,

    #[serde(rename = "AzureOpenAI", alias = "azure_openai", default, skip_serializing_if = "Option::is_none")]
    pub azure_openai: Option<AzureOpenAiSection>,

    #[serde(rename = "OpenAI", alias = "openai", default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAiSection>,

    #[serde(rename = "HuggingFace", alias = "huggingface", alias = "hugging_face", default, skip_serializing_if = "Option::is_none")]
    pub huggingface: Option<HuggingFaceSection>,

    #[serde(rename = "Ollama", alias = "ollama", default, skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaSection>,

    #[serde(rename = "LMStudio", alias = "lmstudio", alias = "lm_studio", default, skip_serializing_if = "Option::is_none")]
    pub lmstudio: Option<LmStudioSection>,

    #[serde(rename = "AzureAIInference", alias = "azure_ai_inference", default, skip_serializing_if = "Option::is_none")]
    pub azure_ai_inference: Option<AzureAiInferenceSection>,
}

impl AppConfig {
    /// Load configuration with layered strategy:
    /// 1. Defaults (embedded Config.toml)
    /// 2. User config (~/.polychat/polychat.json) - providers and chat settings
    /// 3. Project config (./.polychat/polychat.json) - providers and chat settings
    pub fn load() -> Result<Self> {
        let default_str = include_str!("../Config.toml");
        let mut config: AppConfig =
            toml::from_str(default_str).context("failed to parse embedded Config.toml")?;

        if let Some(home) = dirs::home_dir() {
            Self::apply_patch(&mut config, home.join(".polychat").join("polychat.json"));
        }
        Self::apply_patch(&mut config, Path::new(".polychat").join("polychat.json"));

        Ok(config)
    }

    pub(crate) fn apply_patch<P: AsRef<Path>>(config: &mut AppConfig, path: P) {
        let path = path.as_ref();
        if !path.exists() {
            return;
        }
        let Ok(content) = fs::read_to_string(path) else {
            return;
        };
        match serde_json::from_str::<UserOverrideConfig>(&content) {
            Ok(patch) => {
                if let Some(chat) = patch.chat {
                    config.chat = chat;
                }
                if patch.azure_openai.is_some() {
                    config.azure_openai = patch.azure_openai;
                }
                if patch.openai.is_some() {
                    config.openai = patch.openai;
                }
                if patch.huggingface.is_some() {
                    config.huggingface = patch.huggingface;
                }
                if patch.ollama.is_some() {
                    config.ollama = patch.ollama;
                }
                if patch.lmstudio.is_some() {
                    config.lmstudio = patch.lmstudio;
                }
                if patch.azure_ai_inference.is_some() {
                    config.azure_ai_inference = patch.azure_ai_inference;
                }
            }
            Err(e) => {
                log::warn!("failed to parse config patch at {}: {}", path.display(), e);
            }
        }
    }

    /// Descriptors for every provider that has a configuration section, in
    /// a fixed order. Absent sections are simply not listed.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        ALL_PROVIDER_KINDS
            .iter()
            .filter_map(|kind| self.descriptor(*kind))
            .collect()
    }

    pub fn descriptor(&self, kind: ProviderKind) -> Option<ProviderDescriptor> {
        let (enabled, default_model) = match kind {
            ProviderKind::AzureOpenAi => {
                let s = self.azure_openai.as_ref()?;
                (s.enabled, s.deployment_name.clone())
            }
            ProviderKind::OpenAi => {
                let s = self.openai.as_ref()?;
                (s.enabled, s.model_id.clone())
            }
            ProviderKind::HuggingFace => {
                let s = self.huggingface.as_ref()?;
                (s.enabled, s.model_id.clone())
            }
            ProviderKind::Ollama => {
                let s = self.ollama.as_ref()?;
                (s.enabled, s.model_id.clone())
            }
            ProviderKind::LmStudio => {
                let s = self.lmstudio.as_ref()?;
                (s.enabled, s.model_id.clone())
            }
            ProviderKind::AzureAiInference => {
                let s = self.azure_ai_inference.as_ref()?;
                (s.enabled, s.model_id.clone())
            }
        };

        Some(ProviderDescriptor {
            kind,
            display_name: kind.display_name(),
            is_online: kind.is_online(),
            default_model,
            enabled,
        })
    }

    /// Validity check for one provider's section: required fields present
    /// and endpoints well-formed. Does not consider the enabled flag.
    pub(crate) fn validate(&self, kind: ProviderKind) -> std::result::Result<(), String> {
        fn require(field: &str, value: &str) -> std::result::Result<(), String> {
            if value.trim().is_empty() {
                return Err(format!("{} is missing", field));
            }
            Ok(())
        }

        fn require_url(field: &str, value: &str) -> std::result::Result<(), String> {
            require(field, value)?;
            Url::parse(value).map_err(|e| format!("{} is malformed: {}", field, e))?;
            Ok(())
        }

        match kind {
            ProviderKind::AzureOpenAi => {
                let s = self.azure_openai.as_ref().ok_or("section is absent")?;
                require_url("Endpoint", &s.endpoint)?;
                require("ApiKey", &s.api_key)?;
                require("DeploymentName", &s.deployment_name)
            }
            ProviderKind::OpenAi => {
                let s = self.openai.as_ref().ok_or("section is absent")?;
                require("ApiKey", &s.api_key)?;
                require("ModelId", &s.model_id)
            }
            ProviderKind::HuggingFace => {
                let s = self.huggingface.as_ref().ok_or("section is absent")?;
                require("ApiKey", &s.api_key)?;
                require("ModelId", &s.model_id)?;
                match &s.endpoint {
                    Some(endpoint) => require_url("Endpoint", endpoint),
                    None => Ok(()),
                }
            }
            ProviderKind::Ollama => {
                let s = self.ollama.as_ref().ok_or("section is absent")?;
                require_url("Endpoint", &s.endpoint)?;
                require("ModelId", &s.model_id)
            }
            ProviderKind::LmStudio => {
                let s = self.lmstudio.as_ref().ok_or("section is absent")?;
                require_url("Endpoint", &s.endpoint)?;
                require("ModelId", &s.model_id)
            }
            ProviderKind::AzureAiInference => {
                let s = self.azure_ai_inference.as_ref().ok_or("section is absent")?;
                require_url("Endpoint", &s.endpoint)?;
                require("ApiKey", &s.api_key)?;
                require("ModelId", &s.model_id)
            }
        }
    }

    /// Enabled and valid. Unknown or absent providers are simply `false`.
    pub fn is_configured(&self, provider_id: &str) -> bool {
        let Some(kind) = ProviderKind::from_name(provider_id) else {
            return false;
        };
        let Some(descriptor) = self.descriptor(kind) else {
            return false;
        };
        descriptor.enabled && self.validate(kind).is_ok()
    }

    /// Generation parameters for one provider: the `ChatAI` defaults with
    /// the section's overrides applied.
    pub fn execution_settings(&self, provider_id: &str) -> ChatResult<ExecutionSettings> {
        let kind = ProviderKind::from_name(provider_id)
            .ok_or_else(|| ChatError::UnsupportedProvider(provider_id.to_string()))?;

        let overrides = match kind {
            ProviderKind::AzureOpenAi => self.azure_openai.as_ref().map(|s| &s.generation),
            ProviderKind::OpenAi => self.openai.as_ref().map(|s| &s.generation),
            ProviderKind::HuggingFace => self.huggingface.as_ref().map(|s| &s.generation),
            ProviderKind::Ollama => self.ollama.as_ref().map(|s| &s.generation),
            ProviderKind::LmStudio => self.lmstudio.as_ref().map(|s| &s.generation),
            ProviderKind::AzureAiInference => {
                self.azure_ai_inference.as_ref().map(|s| &s.generation)
            }
        }
        .ok_or_else(|| ChatError::UnsupportedProvider(provider_id.to_string()))?;

        Ok(ExecutionSettings {
            temperature: overrides.temperature.unwrap_or(self.chat.default_temperature),
            max_tokens: overrides.max_tokens.unwrap_or(self.chat.default_max_tokens),
            system_prompt: overrides
                .system_prompt
                .clone()
                .unwrap_or_else(|| self.chat.default_system_message.clone()),
        })
    }

    /// The configured fallback provider identifier, canonicalized.
    pub fn default_provider_id(&self) -> ChatResult<String> {
        let raw = self
            .chat
            .default_provider
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ChatError::NoDefaultConfigured)?;

        let kind = ProviderKind::from_name(raw)
            .ok_or_else(|| ChatError::UnsupportedProvider(raw.to_string()))?;
        Ok(kind.provider_name().to_string())
    }
}
