use crate::config::AppConfig;
use crate::cons::provider_cons::ProviderKind;
use crate::error::ChatError;
use crate::llm::chat::coordinator::ChatCoordinator;
use crate::llm::chat::transcript::{Role, TokenUsage};
use crate::llm::models::mock::{MockClient, MockEvent};
use crate::llm::models::provider_handle::{AnyProviderClient, ProviderClientFactory};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;

    fn factory_with(config_toml: &str) -> Arc<ProviderClientFactory> {
        let config: AppConfig = toml::from_str(config_toml).expect("should parse");
        Arc::new(ProviderClientFactory::new(config))
    }

    fn ollama_factory() -> Arc<ProviderClientFactory> {
        factory_with(
            r#"
[ChatAI]
DefaultProvider = "Ollama"
MaxChatHistoryMessages = 20
DefaultSystemMessage = "You are a helpful assistant."

[Ollama]
Endpoint = "http://localhost:11434"
ModelId = "llama2"
"#,
        )
    }

    fn mock_coordinator(
        factory: Arc<ProviderClientFactory>,
        scripts: Vec<Vec<MockEvent>>,
    ) -> ChatCoordinator {
        let mut coordinator = ChatCoordinator::new(factory);
        let client = Arc::new(AnyProviderClient::Mock(MockClient::new(scripts)));
        coordinator.bind_for_tests(ProviderKind::Ollama, client);
        coordinator
    }

    fn usage(input: u64, output: u64) -> TokenUsage {
        TokenUsage {
            input_tokens: Some(input),
            output_tokens: Some(output),
            total_tokens: Some(input + output),
        }
    }

    #[tokio::test]
    async fn send_streams_chunks_and_records_both_turns() {
        let mut coordinator = mock_coordinator(
            ollama_factory(),
            vec![vec![
                MockEvent::Text("Hel".to_string()),
                MockEvent::Text("lo".to_string()),
                MockEvent::Usage(usage(3, 2)),
            ]],
        );

        let chunks = {
            let stream = coordinator
                .send("hi", CancellationToken::new())
                .await
                .expect("stream");
            tokio::pin!(stream);
            let mut chunks = Vec::new();
            while let Some(chunk) = stream.next().await {
                chunks.push(chunk.expect("chunk"));
            }
            chunks
        };

        // provider chunks plus the terminal marker
        assert_eq!(chunks.len(), 4);
        assert!(chunks.last().unwrap().is_complete);
        assert_eq!(chunks.last().unwrap().usage, Some(usage(3, 2)));
        assert!(chunks[..3].iter().all(|c| !c.is_complete));

        let history = coordinator.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "Hello");
        assert_eq!(history[1].usage, Some(usage(3, 2)));
    }

    #[tokio::test]
    async fn send_includes_system_turn_in_provider_request() {
        let factory = ollama_factory();
        let client = Arc::new(AnyProviderClient::Mock(MockClient::new(vec![vec![
            MockEvent::Text("ok".to_string()),
        ]])));
        let mut coordinator = ChatCoordinator::new(Arc::clone(&factory));
        coordinator.bind_for_tests(ProviderKind::Ollama, Arc::clone(&client));

        {
            let stream = coordinator
                .send("hi", CancellationToken::new())
                .await
                .expect("stream");
            tokio::pin!(stream);
            while stream.next().await.is_some() {}
        }

        let AnyProviderClient::Mock(mock) = client.as_ref() else {
            unreachable!()
        };
        let calls = mock.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].role, Role::System);
        assert_eq!(calls[0][0].content, "You are a helpful assistant.");
        assert_eq!(calls[0].last().unwrap().content, "hi");
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_user_turn_and_partial_reply() {
        let mut coordinator = mock_coordinator(
            ollama_factory(),
            vec![vec![
                MockEvent::Text("he".to_string()),
                MockEvent::Fail("connection reset".to_string()),
            ]],
        );

        let results = {
            let stream = coordinator
                .send("hi", CancellationToken::new())
                .await
                .expect("stream");
            tokio::pin!(stream);
            let mut results = Vec::new();
            while let Some(item) = stream.next().await {
                results.push(item);
            }
            results
        };

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ChatError::Remote(_))));

        // user turn stays; partial text is recorded as the assistant turn
        let history = coordinator.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "he");
    }

    #[tokio::test]
    async fn failure_before_any_text_leaves_only_user_turn() {
        let mut coordinator = mock_coordinator(
            ollama_factory(),
            vec![vec![MockEvent::Fail("auth failure".to_string())]],
        );

        {
            let stream = coordinator
                .send("hi", CancellationToken::new())
                .await
                .expect("stream");
            tokio::pin!(stream);
            let first = stream.next().await.expect("item");
            assert!(matches!(first, Err(ChatError::Remote(_))));
            assert!(stream.next().await.is_none());
        }

        let history = coordinator.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn cancellation_records_partial_reply() {
        let cancel = CancellationToken::new();
        let mut coordinator = mock_coordinator(
            ollama_factory(),
            vec![vec![MockEvent::Text("par".to_string()), MockEvent::Hang]],
        );

        {
            let stream = coordinator.send("hi", cancel.clone()).await.expect("stream");
            tokio::pin!(stream);
            let first = stream.next().await.expect("chunk").expect("ok");
            assert_eq!(first.text, "par");
            cancel.cancel();
            // production stops without a terminal marker
            assert!(stream.next().await.is_none());
        }

        let history = coordinator.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "par");
    }

    #[tokio::test]
    async fn send_blocking_round_trip_appends_turns() {
        let mut coordinator = mock_coordinator(
            ollama_factory(),
            vec![vec![
                MockEvent::Text("Hello".to_string()),
                MockEvent::Usage(usage(3, 1)),
            ]],
        );

        let response = coordinator
            .send_blocking("hi", CancellationToken::new())
            .await
            .expect("response");

        assert_eq!(response.text, "Hello");
        assert_eq!(response.usage, Some(usage(3, 1)));
        assert_eq!(coordinator.get_history().len(), 2);
    }

    #[tokio::test]
    async fn send_blocking_failure_appends_no_assistant_turn() {
        let mut coordinator = mock_coordinator(
            ollama_factory(),
            vec![vec![MockEvent::Fail("timeout".to_string())]],
        );

        let result = coordinator
            .send_blocking("hi", CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ChatError::Remote(_))));
        let history = coordinator.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn send_blocking_cancellation_returns_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut coordinator =
            mock_coordinator(ollama_factory(), vec![vec![MockEvent::Hang]]);

        let result = coordinator.send_blocking("hi", cancel).await;

        assert!(matches!(result, Err(ChatError::Cancelled)));
        assert_eq!(coordinator.get_history().len(), 1);
    }

    #[tokio::test]
    async fn transcript_is_truncated_after_overflow() {
        let factory = factory_with(
            r#"
[ChatAI]
DefaultProvider = "Ollama"
MaxChatHistoryMessages = 4

[Ollama]
Endpoint = "http://localhost:11434"
ModelId = "llama2"
"#,
        );
        let scripts = (0..4)
            .map(|i| vec![MockEvent::Text(format!("reply{}", i))])
            .collect();
        let mut coordinator = mock_coordinator(factory, scripts);

        for i in 0..4 {
            coordinator
                .send_blocking(format!("question{}", i), CancellationToken::new())
                .await
                .expect("response");
        }

        let turns = coordinator.export_turns();
        assert_eq!(turns[0].role, Role::System);
        // system + at most 4 retained conversation turns
        assert!(turns.len() <= 5);

        let history = coordinator.get_history();
        assert_eq!(history.last().unwrap().content, "reply3");
        // oldest exchange fell off
        assert!(!history.iter().any(|t| t.content == "question0"));
        // window opens on a user turn
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn clear_history_resets_to_single_system_turn() {
        let mut coordinator = mock_coordinator(
            ollama_factory(),
            vec![vec![MockEvent::Text("Hello".to_string())]],
        );
        coordinator
            .send_blocking("hi", CancellationToken::new())
            .await
            .expect("response");

        coordinator.clear_history();

        assert!(coordinator.get_history().is_empty());
        let turns = coordinator.export_turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::System);
    }

    #[tokio::test]
    async fn switch_provider_fails_for_unavailable_provider() {
        let mut coordinator = ChatCoordinator::new(ollama_factory());

        assert!(matches!(
            coordinator.switch_provider("AzureOpenAI"),
            Err(ChatError::ProviderUnavailable(_))
        ));
        assert!(matches!(
            coordinator.switch_provider("NotAProvider"),
            Err(ChatError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn switch_provider_binds_and_keeps_transcript() {
        let mut coordinator = mock_coordinator(
            ollama_factory(),
            vec![vec![MockEvent::Text("Hello".to_string())]],
        );
        coordinator
            .send_blocking("hi", CancellationToken::new())
            .await
            .expect("response");

        // rebinding to the same provider is a no-op
        coordinator.switch_provider("Ollama").expect("same provider");
        assert_eq!(coordinator.provider_id(), Some("Ollama"));
        assert_eq!(coordinator.get_history().len(), 2);
    }

    #[tokio::test]
    async fn first_send_binds_default_provider() {
        let factory = ollama_factory();
        let client = Arc::new(AnyProviderClient::Mock(MockClient::new(vec![vec![
            MockEvent::Text("Hello".to_string()),
        ]])));
        factory.inject_for_tests(ProviderKind::Ollama, client);

        let mut coordinator = ChatCoordinator::new(factory);
        assert!(coordinator.provider_id().is_none());

        let response = coordinator
            .send_blocking("hi", CancellationToken::new())
            .await
            .expect("response");

        assert_eq!(response.text, "Hello");
        assert_eq!(coordinator.provider_id(), Some("Ollama"));
    }

    #[tokio::test]
    async fn send_without_default_provider_fails() {
        let factory = factory_with(
            r#"
[Ollama]
Endpoint = "http://localhost:11434"
ModelId = "llama2"
"#,
        );
        let mut coordinator = ChatCoordinator::new(factory);

        let result = coordinator
            .send_blocking("hi", CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ChatError::NoDefaultConfigured)));
        assert!(coordinator.provider_id().is_none());
    }

    #[tokio::test]
    async fn import_turns_reinstates_system_turn() {
        let mut coordinator = ChatCoordinator::new(ollama_factory());
        coordinator.import_turns(vec![
            crate::llm::chat::transcript::Turn::user("hi"),
            crate::llm::chat::transcript::Turn::assistant("hello", None),
        ]);

        let turns = coordinator.export_turns();
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(coordinator.get_history().len(), 2);
    }
}
