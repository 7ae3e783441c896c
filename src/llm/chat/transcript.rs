use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Token counts as reported by a provider. Every field is optional because
/// not every provider reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
    }

    /// Overlays `other` onto `self`, field by field. Later reports win,
    /// so accumulating over a stream keeps the last-known counts.
    pub fn merge(&mut self, other: &TokenUsage) {
        if other.input_tokens.is_some() {
            self.input_tokens = other.input_tokens;
        }
        if other.output_tokens.is_some() {
            self.output_tokens = other.output_tokens;
        }
        if other.total_tokens.is_some() {
            self.total_tokens = other.total_tokens;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Turn { role: Role::System, content: content.into(), usage: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Turn { role: Role::User, content: content.into(), usage: None }
    }

    pub fn assistant(content: impl Into<String>, usage: Option<TokenUsage>) -> Self {
        Turn { role: Role::Assistant, content: content.into(), usage }
    }
}

/// Ordered conversation history. Invariant: exactly one system turn, always
/// at index 0. Truncation never removes it and `reset` reinstates it.
#[derive(Debug, Clone)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new(system_message: impl Into<String>) -> Self {
        Transcript { turns: vec![Turn::system(system_message)] }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, usage: Option<TokenUsage>) {
        self.turns.push(Turn::assistant(content, usage));
    }

    /// Drops everything but a fresh system turn.
    pub fn reset(&mut self, system_message: impl Into<String>) {
        self.turns.clear();
        self.turns.push(Turn::system(system_message));
    }

    /// Conversation turns in chronological order, system turn excluded.
    pub fn history(&self) -> &[Turn] {
        &self.turns[1..]
    }

    /// Replaces the turn sequence wholesale. A missing leading system turn
    /// gets reinstated from `system_message`.
    pub fn replace(&mut self, turns: Vec<Turn>, system_message: &str) {
        self.turns = turns;
        match self.turns.first() {
            Some(first) if first.role == Role::System => {}
            _ => self.turns.insert(0, Turn::system(system_message)),
        }
        // A single system turn at index 0: strip any stragglers.
        let mut i = 1;
        while i < self.turns.len() {
            if self.turns[i].role == Role::System {
                self.turns.remove(i);
            } else {
                i += 1;
            }
        }
    }
}

/// Returns `None` when the transcript already fits within `target_count`
/// non-system turns. Otherwise returns a new sequence retaining the system
/// turn plus the most recent `target_count` non-system turns, dropping one
/// more if the window would open on an assistant turn so a reply is never
/// kept without the user turn that prompted it.
///
/// Pure: the input is never mutated.
pub fn reduce(turns: &[Turn], target_count: usize) -> Option<Vec<Turn>> {
    let non_system = turns.iter().filter(|t| t.role != Role::System).count();
    if non_system <= target_count {
        return None;
    }

    let mut reduced: Vec<Turn> = Vec::with_capacity(target_count + 1);
    reduced.extend(turns.iter().filter(|t| t.role == Role::System).take(1).cloned());

    let keep_from = non_system - target_count;
    reduced.extend(
        turns
            .iter()
            .filter(|t| t.role != Role::System)
            .skip(keep_from)
            .cloned(),
    );

    // Never open the retained window mid-pair.
    if reduced.len() > 1 && reduced[1].role == Role::Assistant {
        reduced.remove(1);
    }

    log::debug!(
        "transcript reduced from {} to {} turns (target {})",
        turns.len(),
        reduced.len(),
        target_count
    );
    Some(reduced)
}
