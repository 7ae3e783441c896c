use crate::llm::models::azure_inference::inference_chat_url;
use crate::llm::models::azure_openai::deployment_chat_url;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_url_scopes_to_deployment_and_api_version() {
        let url = deployment_chat_url("https://example.openai.azure.com/", "gpt-4o");
        assert_eq!(
            url,
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn inference_url_appends_api_version() {
        let url = inference_chat_url("https://models.example.com");
        assert_eq!(
            url,
            "https://models.example.com/chat/completions?api-version=2024-05-01-preview"
        );
    }
}
