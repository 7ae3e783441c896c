use anyhow::Result;
use serde_json::{json, Value};
use std::pin::Pin;
use tokio_stream::Stream;

use crate::llm::chat::transcript::{TokenUsage, Turn};

/// One increment of a streamed reply. Vendor clients leave `is_complete`
/// false on every chunk they yield; the coordinator appends the terminal
/// marker carrying the cumulative usage.
#[derive(Debug, Clone, Default)]
pub struct ResponseChunk {
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub is_complete: bool,
}

/// Result of a non-streaming round trip.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Generation parameters bound into a client at construction.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ResponseChunk>> + Send>>;

#[allow(async_fn_in_trait)]
pub trait ProviderClient: Send + Sync {
    async fn stream_chat(&self, turns: Vec<Turn>) -> Result<ChunkStream>;

    async fn chat(&self, turns: Vec<Turn>) -> Result<ChatResponse>;
}

/// Serializes turns into the `{role, content}` message objects every wire
/// format here understands.
pub(crate) fn wire_messages(turns: &[Turn]) -> Vec<Value> {
    turns
        .iter()
        .map(|t| {
            json!({
                "role": t.role.as_str(),
                "content": t.content,
            })
        })
        .collect()
}
