//! # LLM client abstraction
//!
//! Defines the conversation model ([`ConversationTurn`], [`ContentPart`]), the
//! [`LlmClient`] trait and an OpenAI implementation. Transport-agnostic; used by the
//! Discord bot's conversation sessions.
//!
//! Streaming completions are exposed as a boxed [`futures::Stream`] of [`StreamEvent`]s
//! so that [`LlmClient`] stays object-safe (`Arc<dyn LlmClient>`).

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

mod config;
mod openai_llm;
mod turn;

pub use config::{EnvLlmConfig, LlmConfig};
pub use openai_llm::OpenAILlmClient;
pub use turn::{ContentPart, ConversationTurn, FunctionCall, Role, TokenUsage, ToolDefinition};

/// One completion request: model, instructions and ordered history.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub instructions: String,
    pub input: Vec<ConversationTurn>,
    /// Empty means no tools are offered.
    pub tools: Vec<ToolDefinition>,
}

/// Result of a non-streaming completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Turns produced by the model (assistant text and/or function calls).
    pub output: Vec<ConversationTurn>,
    /// Concatenated assistant text of `output`.
    pub output_text: String,
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Function calls requested across all output turns.
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.output
            .iter()
            .flat_map(|t| t.function_calls().cloned())
            .collect()
    }
}

/// Incremental event of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A piece of reasoning summary text.
    ReasoningDelta(String),
    /// A new reasoning summary part started.
    ReasoningPartAdded,
    /// A piece of visible output text.
    OutputTextDelta(String),
    /// Output text finished; carries the full text.
    OutputTextDone(String),
    FunctionCall(FunctionCall),
    Usage(TokenUsage),
}

/// Boxed stream of completion events; errors end the stream.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// LLM client interface.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Runs one non-streaming completion (used by the multi-pass tool loop).
    async fn create_completion(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Opens a streaming completion.
    async fn create_streaming_completion(&self, request: CompletionRequest) -> Result<EventStream>;
}
