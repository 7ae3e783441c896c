use thiserror::Error;

/// Errors surfaced by the configuration store, the provider factory and the
/// chat coordinator. Vendor-side failures stay opaque behind `Remote`.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("invalid configuration for {provider}: {reason}")]
    InvalidConfiguration { provider: String, reason: String },

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("no default provider configured")]
    NoDefaultConfigured,

    #[error("request cancelled")]
    Cancelled,

    /// Opaque passthrough of whatever the vendor call reported.
    #[error("provider call failed: {0:#}")]
    Remote(anyhow::Error),
}

impl ChatError {
    pub fn invalid_configuration(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        ChatError::InvalidConfiguration {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by configuration or provider selection, as
    /// opposed to failures of an in-flight vendor call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ChatError::UnsupportedProvider(_)
                | ChatError::InvalidConfiguration { .. }
                | ChatError::ProviderUnavailable(_)
                | ChatError::NoDefaultConfigured
        )
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
