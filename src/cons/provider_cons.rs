use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    AzureOpenAi,
    OpenAi,
    HuggingFace,
    Ollama,
    LmStudio,
    AzureAiInference,
}

pub const ALL_PROVIDER_KINDS: [ProviderKind; 6] = [
    ProviderKind::AzureOpenAi,
    ProviderKind::OpenAi,
    ProviderKind::HuggingFace,
    ProviderKind::Ollama,
    ProviderKind::LmStudio,
    ProviderKind::AzureAiInference,
];

impl ProviderKind {
    /// Returns the canonical identifier used in configuration sections
    /// (e.g., "AzureOpenAI", "Ollama")
    pub fn provider_name(&self) -> &'static str {
        match self {
            ProviderKind::AzureOpenAi => "AzureOpenAI",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::HuggingFace => "HuggingFace",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::LmStudio => "LMStudio",
            ProviderKind::AzureAiInference => "AzureAIInference",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::AzureOpenAi => "Azure OpenAI",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::HuggingFace => "HuggingFace",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::LmStudio => "LM Studio",
            ProviderKind::AzureAiInference => "Azure AI Inference",
        }
    }

    /// Whether the provider talks to a hosted service rather than a local
    /// inference server.
    pub fn is_online(&self) -> bool {
        match self {
            ProviderKind::AzureOpenAi
            | ProviderKind::OpenAi
            | ProviderKind::HuggingFace
            | ProviderKind::AzureAiInference => true,
            ProviderKind::Ollama | ProviderKind::LmStudio => false,
        }
    }

    /// Helper to parse from a string (handles aliases)
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "azureopenai" | "azure" => Some(ProviderKind::AzureOpenAi),
            "openai" => Some(ProviderKind::OpenAi),
            "huggingface" => Some(ProviderKind::HuggingFace),
            "ollama" => Some(ProviderKind::Ollama),
            "lmstudio" => Some(ProviderKind::LmStudio),
            "azureaiinference" | "azureinference" => Some(ProviderKind::AzureAiInference),
            _ => None,
        }
    }
}

// Ensure Display matches provider_name for convenience
impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.provider_name())
    }
}
