use crate::config::AppConfig;
use crate::error::ChatError;
use crate::llm::models::provider_handle::ProviderClientFactory;
use std::sync::Arc;

#[cfg(test)]
mod tests {
    use super::*;

    fn ollama_only_factory() -> ProviderClientFactory {
        let config: AppConfig = toml::from_str(
            r#"
[ChatAI]
DefaultProvider = "Ollama"

[Ollama]
Endpoint = "http://localhost:11434"
ModelId = "llama2"
"#,
        )
        .expect("should parse");
        ProviderClientFactory::new(config)
    }

    #[test]
    fn get_or_create_fails_for_unknown_identifier() {
        let factory = ollama_only_factory();
        assert!(matches!(
            factory.get_or_create("NotAProvider"),
            Err(ChatError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn get_or_create_fails_for_absent_section() {
        let factory = ollama_only_factory();
        assert!(matches!(
            factory.get_or_create("AzureOpenAI"),
            Err(ChatError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn get_or_create_fails_for_invalid_section() {
        let config: AppConfig = toml::from_str(
            r#"
[OpenAI]
ModelId = "gpt-4o-mini"
"#,
        )
        .expect("should parse");
        let factory = ProviderClientFactory::new(config);

        assert!(matches!(
            factory.get_or_create("OpenAI"),
            Err(ChatError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn get_or_create_returns_identity_stable_handles() {
        let factory = ollama_only_factory();
        let a = factory.get_or_create("Ollama").expect("first");
        let b = factory.get_or_create("Ollama").expect("second");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn get_or_create_accepts_identifier_aliases() {
        let factory = ollama_only_factory();
        let a = factory.get_or_create("Ollama").expect("canonical");
        let b = factory.get_or_create("ollama").expect("lowercase");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn evict_drops_cached_handle() {
        let factory = ollama_only_factory();
        let a = factory.get_or_create("Ollama").expect("first");
        assert!(factory.evict("Ollama"));
        let b = factory.get_or_create("Ollama").expect("second");
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!factory.evict("NotAProvider"));
    }

    #[test]
    fn list_providers_reports_availability_without_network() {
        let factory = ollama_only_factory();
        let listings = factory.list_providers();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].descriptor.id(), "Ollama");
        assert!(!listings[0].descriptor.is_online);
        assert!(listings[0].available);
    }

    #[test]
    fn handle_attributes_name_model_and_endpoint() {
        let factory = ollama_only_factory();
        let handle = factory.get_or_create("Ollama").expect("handle");
        let attrs = handle.attributes();

        assert_eq!(attrs.get("model").map(String::as_str), Some("llama2"));
        assert_eq!(
            attrs.get("endpoint").map(String::as_str),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn is_available_is_false_for_unconfigured_provider() {
        let factory = ollama_only_factory();
        assert!(factory.is_available("Ollama"));
        assert!(!factory.is_available("AzureOpenAI"));
        assert!(!factory.is_available("NotAProvider"));
    }

    #[test]
    fn default_provider_id_fails_when_omitted() {
        let config: AppConfig = toml::from_str(
            r#"
[Ollama]
Endpoint = "http://localhost:11434"
ModelId = "llama2"
"#,
        )
        .expect("should parse");
        let factory = ProviderClientFactory::new(config);

        assert!(matches!(
            factory.default_provider_id(),
            Err(ChatError::NoDefaultConfigured)
        ));
    }

    #[test]
    fn disabled_provider_is_listed_but_unavailable() {
        let config: AppConfig = toml::from_str(
            r#"
[Ollama]
Endpoint = "http://localhost:11434"
ModelId = "llama2"
Enabled = false
"#,
        )
        .expect("should parse");
        let factory = ProviderClientFactory::new(config);

        let listings = factory.list_providers();
        assert_eq!(listings.len(), 1);
        assert!(!listings[0].available);
        assert!(!factory.is_available("Ollama"));
    }
}
