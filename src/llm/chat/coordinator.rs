use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::cons::provider_cons::ProviderKind;
use crate::error::{ChatError, ChatResult};
use crate::llm::chat::transcript::{reduce, TokenUsage, Transcript, Turn};
use crate::llm::models::provider_handle::{
    AnyProviderClient, ChatResponse, ProviderClient, ProviderClientFactory, ResponseChunk,
};

/// Owns a single conversation transcript and delegates completion requests
/// to the currently selected provider handle.
///
/// Starts unbound; the first `send` binds the configured default provider.
/// Switching providers keeps the transcript — the new provider replays the
/// turns the previous one produced.
pub struct ChatCoordinator {
    factory: Arc<ProviderClientFactory>,
    provider: Option<ProviderKind>,
    client: Option<Arc<AnyProviderClient>>,
    transcript: Transcript,
    max_history: usize,
    default_system_message: String,
}

impl ChatCoordinator {
    pub fn new(factory: Arc<ProviderClientFactory>) -> Self {
        let chat = &factory.config().chat;
        let default_system_message = chat.default_system_message.clone();
        let max_history = chat.max_chat_history_messages;
        let transcript = Transcript::new(default_system_message.clone());
        Self {
            factory,
            provider: None,
            client: None,
            transcript,
            max_history,
            default_system_message,
        }
    }

    /// The currently bound provider identifier, if any.
    pub fn provider_id(&self) -> Option<&'static str> {
        self.provider.map(|kind| kind.provider_name())
    }

    /// Binds `provider_id`, releasing the previous handle. A no-op when the
    /// coordinator is already bound to this provider.
    pub fn switch_provider(&mut self, provider_id: &str) -> ChatResult<()> {
        if let Some(kind) = ProviderKind::from_name(provider_id) {
            if self.provider == Some(kind) {
                return Ok(());
            }
        }
        if !self.factory.is_available(provider_id) {
            return Err(ChatError::ProviderUnavailable(provider_id.to_string()));
        }
        self.bind(provider_id)?;
        log::info!("switched to provider {}", provider_id);
        Ok(())
    }

    fn bind(&mut self, provider_id: &str) -> ChatResult<Arc<AnyProviderClient>> {
        let client = self.factory.get_or_create(provider_id)?;
        // from_name succeeded inside get_or_create
        self.provider = ProviderKind::from_name(provider_id);
        self.client = Some(Arc::clone(&client));
        Ok(client)
    }

    fn ensure_bound(&mut self) -> ChatResult<Arc<AnyProviderClient>> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }
        let default_id = self.factory.default_provider_id()?;
        if !self.factory.is_available(&default_id) {
            return Err(ChatError::ProviderUnavailable(default_id));
        }
        self.bind(&default_id)
    }

    /// Streams the reply to `message` as a lazy, single-consumption
    /// sequence of chunks. The user turn is appended immediately; the
    /// assistant turn is appended once the stream ends, before the terminal
    /// `is_complete` chunk (which carries the cumulative token usage) is
    /// yielded.
    ///
    /// Cancellation is cooperative through `cancel`: production stops at the
    /// next chunk boundary, partial text received so far is recorded as an
    /// assistant turn, and the stream ends without a terminal marker. The
    /// same partial-text policy applies when the provider fails mid-stream;
    /// a failure before any text leaves only the user turn recorded.
    /// Dropping the stream without cancelling skips the bookkeeping — always
    /// cancel or drain.
    pub async fn send(
        &mut self,
        message: impl Into<String>,
        cancel: CancellationToken,
    ) -> ChatResult<impl Stream<Item = ChatResult<ResponseChunk>> + Send + '_> {
        let client = self.ensure_bound()?;
        self.transcript.push_user(message);
        log::info!(
            "sending {} turns to {}",
            self.transcript.len(),
            self.provider_id().unwrap_or("<unbound>")
        );

        let provider_stream = client
            .stream_chat(self.transcript.turns().to_vec())
            .await
            .map_err(ChatError::Remote)?;

        Ok(async_stream::stream! {
            let mut stream = provider_stream;
            let mut text = String::new();
            let mut usage = TokenUsage::default();
            let mut cancelled = false;
            let mut failed = false;

            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        log::info!("send cancelled after {} chars", text.len());
                        cancelled = true;
                        break;
                    }
                    next = stream.next() => next,
                };

                match next {
                    Some(Ok(chunk)) => {
                        text.push_str(&chunk.text);
                        if let Some(u) = &chunk.usage {
                            usage.merge(u);
                        }
                        yield Ok(chunk);
                    }
                    Some(Err(e)) => {
                        log::error!("provider stream failed: {:#}", e);
                        failed = true;
                        if !text.is_empty() {
                            self.record_assistant(std::mem::take(&mut text), usage);
                        }
                        yield Err(ChatError::Remote(e));
                        break;
                    }
                    None => break,
                }
            }

            if cancelled {
                if !text.is_empty() {
                    self.record_assistant(text, usage);
                }
            } else if !failed {
                let final_usage = self.record_assistant(text, usage);
                yield Ok(ResponseChunk {
                    text: String::new(),
                    usage: final_usage,
                    is_complete: true,
                });
            }
        })
    }

    /// Same contract as `send` without incremental chunks: one round trip.
    /// On failure the user turn stays recorded and no assistant turn is
    /// appended; the returned error is the failure marker.
    pub async fn send_blocking(
        &mut self,
        message: impl Into<String>,
        cancel: CancellationToken,
    ) -> ChatResult<ChatResponse> {
        let client = self.ensure_bound()?;
        self.transcript.push_user(message);
        let turns = self.transcript.turns().to_vec();

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("blocking send cancelled");
                return Err(ChatError::Cancelled);
            }
            result = client.chat(turns) => result.map_err(ChatError::Remote)?,
        };

        self.transcript.push_assistant(response.text.clone(), response.usage);
        self.apply_truncation();
        Ok(response)
    }

    fn record_assistant(&mut self, text: String, usage: TokenUsage) -> Option<TokenUsage> {
        let usage = if usage.is_empty() { None } else { Some(usage) };
        self.transcript.push_assistant(text, usage);
        self.apply_truncation();
        usage
    }

    fn apply_truncation(&mut self) {
        if let Some(reduced) = reduce(self.transcript.turns(), self.max_history) {
            let system = self.default_system_message.clone();
            self.transcript.replace(reduced, &system);
        }
    }

    /// Resets the transcript to the single system turn. A bound provider's
    /// configured instruction override takes effect here.
    pub fn clear_history(&mut self) {
        let system = self
            .provider
            .and_then(|kind| {
                self.factory
                    .config()
                    .execution_settings(kind.provider_name())
                    .map(|s| s.system_prompt)
                    .ok()
            })
            .unwrap_or_else(|| self.default_system_message.clone());
        self.transcript.reset(system);
        log::info!("chat history cleared");
    }

    /// Read-only snapshot of the conversation, system turn excluded.
    pub fn get_history(&self) -> Vec<Turn> {
        self.transcript.history().to_vec()
    }

    /// Full transcript including the system turn, for persistence.
    pub fn export_turns(&self) -> Vec<Turn> {
        self.transcript.turns().to_vec()
    }

    /// Replaces the transcript, reinstating the leading system turn if the
    /// imported sequence lacks one.
    pub fn import_turns(&mut self, turns: Vec<Turn>) {
        let system = self.default_system_message.clone();
        self.transcript.replace(turns, &system);
    }

    #[cfg(test)]
    pub(crate) fn bind_for_tests(&mut self, kind: ProviderKind, client: Arc<AnyProviderClient>) {
        self.provider = Some(kind);
        self.client = Some(client);
    }
}
