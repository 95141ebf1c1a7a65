//! # OpenAI API client
//!
//! Thin wrapper around [async-openai] for chat completion (non-stream and stream).
//! Requests are built by the caller (messages, tools, stream options); this crate only
//! sends them, logs them with the API key masked, and reports token usage.

use async_openai::{config::OpenAIConfig, Client};
use std::sync::Arc;

pub use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCallChunk,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs, ChatCompletionRequestMessageContentPartTextArgs,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    ChatCompletionResponseStream, ChatCompletionStreamOptions, ChatCompletionTool,
    ChatCompletionToolArgs, ChatCompletionToolType, CompletionUsage, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    CreateChatCompletionStreamResponse, FinishReason, FunctionCall, FunctionCallStream, FunctionObjectArgs,
    ImageUrlArgs,
};

/// Masks an API key/token for safe logging: shows first 7 chars + "***" + last 4 chars.
/// If length <= 11, returns "***" to avoid leaking any part of the key.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 11 {
        return "***".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

/// OpenAI chat client. Wraps async-openai client; optionally holds API key for masked logging.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Arc<Client<OpenAIConfig>>,
    /// None when created via `with_client()`.
    api_key_for_logging: Option<String>,
}

impl OpenAIClient {
    /// Builds a client using the given API key and default API base URL.
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.clone());
        Self {
            client: Arc::new(Client::with_config(config)),
            api_key_for_logging: Some(api_key),
        }
    }

    /// Builds a client with a custom base URL (e.g. for proxies or compatible endpoints).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.clone())
            .with_api_base(base_url);
        Self {
            client: Arc::new(Client::with_config(config)),
            api_key_for_logging: Some(api_key),
        }
    }

    /// Builds a client from an existing async-openai client (no API key stored for logging).
    pub fn with_client(client: Client<OpenAIConfig>) -> Self {
        Self {
            client: Arc::new(client),
            api_key_for_logging: None,
        }
    }

    fn masked_key(&self) -> String {
        self.api_key_for_logging
            .as_deref()
            .map(mask_token)
            .unwrap_or_else(|| "***".to_string())
    }

    fn log_request(&self, kind: &str, request: &CreateChatCompletionRequest) {
        tracing::info!(
            model = %request.model,
            message_count = request.messages.len(),
            tool_count = request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            api_key = %self.masked_key(),
            "OpenAI {} request",
            kind
        );
        if let Ok(json) = serde_json::to_string(request) {
            tracing::debug!(request_json = %json, "OpenAI {} request JSON", kind);
        }
    }

    /// Sends a chat completion request and returns the raw response.
    ///
    /// Logs masked API key, request JSON (debug) and token usage.
    pub async fn chat_completion(
        &self,
        request: CreateChatCompletionRequest,
    ) -> anyhow::Result<CreateChatCompletionResponse> {
        self.log_request("chat_completion", &request);

        let response = self.client.chat().create(request).await?;

        if let Some(ref u) = response.usage {
            tracing::info!(
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                total_tokens = u.total_tokens,
                "OpenAI chat_completion usage"
            );
        }
        if response.choices.is_empty() {
            anyhow::bail!("No response from OpenAI");
        }
        Ok(response)
    }

    /// Opens a streamed chat completion. The `stream` flag is forced on; chunks are
    /// returned as they arrive and stream errors surface as stream items.
    pub async fn chat_completion_stream(
        &self,
        mut request: CreateChatCompletionRequest,
    ) -> anyhow::Result<ChatCompletionResponseStream> {
        request.stream = Some(true);
        self.log_request("chat_completion_stream", &request);

        let stream = self.client.chat().create_stream(request).await?;
        Ok(stream)
    }
}
