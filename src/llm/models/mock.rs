//! Scripted client used by coordinator tests. Never compiled into release
//! builds.

use anyhow::{anyhow, Result};
use std::sync::Mutex;

use crate::llm::chat::transcript::{TokenUsage, Turn};
use crate::llm::models::provider_base::{
    ChatResponse, ChunkStream, ProviderClient, ResponseChunk,
};

/// One scripted stream element.
#[derive(Debug, Clone)]
pub enum MockEvent {
    Text(String),
    Usage(TokenUsage),
    Fail(String),
    /// Never resolves; lets tests cancel at a known point.
    Hang,
}

#[derive(Default)]
pub struct MockClient {
    /// Scripts consumed front to back, one per call.
    scripts: Mutex<Vec<Vec<MockEvent>>>,
    /// Turns received by each call, for assertions.
    pub calls: Mutex<Vec<Vec<Turn>>>,
}

impl MockClient {
    pub fn new(scripts: Vec<Vec<MockEvent>>) -> Self {
        MockClient { scripts: Mutex::new(scripts), calls: Mutex::new(Vec::new()) }
    }

    fn next_script(&self, turns: Vec<Turn>) -> Vec<MockEvent> {
        self.calls.lock().unwrap().push(turns);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            vec![MockEvent::Fail("mock script exhausted".to_string())]
        } else {
            scripts.remove(0)
        }
    }
}

impl ProviderClient for MockClient {
    async fn stream_chat(&self, turns: Vec<Turn>) -> Result<ChunkStream> {
        let script = self.next_script(turns);
        Ok(Box::pin(async_stream::stream! {
            for event in script {
                match event {
                    MockEvent::Text(text) => {
                        yield Ok(ResponseChunk { text, usage: None, is_complete: false });
                    }
                    MockEvent::Usage(usage) => {
                        yield Ok(ResponseChunk {
                            text: String::new(),
                            usage: Some(usage),
                            is_complete: false,
                        });
                    }
                    MockEvent::Fail(message) => {
                        yield Err(anyhow!(message));
                        break;
                    }
                    MockEvent::Hang => {
                        std::future::pending::<()>().await;
                    }
                }
            }
        }))
    }

    async fn chat(&self, turns: Vec<Turn>) -> Result<ChatResponse> {
        let script = self.next_script(turns);
        let mut text = String::new();
        let mut usage = TokenUsage::default();
        for event in script {
            match event {
                MockEvent::Text(t) => text.push_str(&t),
                MockEvent::Usage(u) => usage.merge(&u),
                MockEvent::Fail(message) => return Err(anyhow!(message)),
                MockEvent::Hang => std::future::pending::<()>().await,
            }
        }
        let usage = if usage.is_empty() { None } else { Some(usage) };
        Ok(ChatResponse { text, usage })
    }
}
