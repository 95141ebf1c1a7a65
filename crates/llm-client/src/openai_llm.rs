//! OpenAI implementation of [`LlmClient`]: maps conversation turns to chat-completion
//! messages, prepends the instructions as system message, and turns the chunk stream
//! into [`StreamEvent`]s.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use openai_client::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCallChunk,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs, ChatCompletionRequestMessageContentPartTextArgs,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    ChatCompletionResponseStream, ChatCompletionStreamOptions, ChatCompletionTool,
    ChatCompletionToolArgs, ChatCompletionToolType, CompletionUsage, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, FunctionObjectArgs, ImageUrlArgs,
};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, instrument, warn};

use crate::{
    CompletionRequest, CompletionResponse, ContentPart, ConversationTurn, EventStream,
    FunctionCall, LlmClient, Role, StreamEvent, TokenUsage, ToolDefinition,
};

/// LlmClient backed by openai-client.
#[derive(Clone)]
pub struct OpenAILlmClient {
    client: openai_client::OpenAIClient,
}

impl OpenAILlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: openai_client::OpenAIClient::new(api_key),
        }
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: openai_client::OpenAIClient::with_base_url(api_key, base_url),
        }
    }

    fn build_request(request: &CompletionRequest, stream: bool) -> Result<CreateChatCompletionRequest> {
        let messages = to_openai_messages(&request.instructions, &request.input)?;
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(request.model.clone()).messages(messages);
        if !request.tools.is_empty() {
            args.tools(to_openai_tools(&request.tools)?);
        }
        if stream {
            args.stream_options(ChatCompletionStreamOptions { include_usage: true });
        }
        Ok(args.build()?)
    }
}

fn usage_from(u: &CompletionUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    }
}

/// Converts offered tools to the chat-completions `tools` array.
fn to_openai_tools(tools: &[ToolDefinition]) -> Result<Vec<ChatCompletionTool>> {
    tools
        .iter()
        .map(|t| {
            let function = FunctionObjectArgs::default()
                .name(t.name.clone())
                .description(t.description.clone())
                .parameters(t.parameters.clone())
                .build()?;
            Ok(ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()?)
        })
        .collect()
}

/// Builds the message list: instructions as system message, then one or more messages per turn.
///
/// Tool results become one `tool` message each; assistant tool calls ride on the assistant
/// message. Developer turns are sent as system messages.
fn to_openai_messages(
    instructions: &str,
    input: &[ConversationTurn],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut out: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(input.len() + 1);
    if !instructions.is_empty() {
        out.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(instructions.to_string())
                .build()?
                .into(),
        );
    }

    for turn in input {
        match turn.role {
            Role::User => {
                let has_image = turn.content.iter().any(|p| matches!(p, ContentPart::Image { .. }));
                if !has_image {
                    out.push(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(turn.text())
                            .build()?
                            .into(),
                    );
                    continue;
                }
                let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();
                for part in &turn.content {
                    match part {
                        ContentPart::Text { text } => parts.push(
                            ChatCompletionRequestMessageContentPartTextArgs::default()
                                .text(text.clone())
                                .build()?
                                .into(),
                        ),
                        ContentPart::Image { url } => parts.push(
                            ChatCompletionRequestMessageContentPartImageArgs::default()
                                .image_url(ImageUrlArgs::default().url(url.clone()).build()?)
                                .build()?
                                .into(),
                        ),
                        _ => {}
                    }
                }
                out.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(parts)
                        .build()?
                        .into(),
                );
            }
            Role::Developer => out.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(turn.text())
                    .build()?
                    .into(),
            ),
            Role::Assistant => {
                let text = turn.text();
                let calls: Vec<ChatCompletionMessageToolCall> = turn
                    .function_calls()
                    .map(|c| ChatCompletionMessageToolCall {
                        id: c.call_id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: openai_client::FunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect();
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() || calls.is_empty() {
                    args.content(text);
                }
                if !calls.is_empty() {
                    args.tool_calls(calls);
                }
                out.push(args.build()?.into());
            }
            Role::Tool => {
                for part in &turn.content {
                    if let ContentPart::ToolResult { call_id, output } = part {
                        out.push(
                            ChatCompletionRequestToolMessageArgs::default()
                                .content(output.clone())
                                .tool_call_id(call_id.clone())
                                .build()?
                                .into(),
                        );
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Tool call being assembled from stream chunks, keyed by the chunk index.
#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

fn merge_tool_chunks(calls: &mut BTreeMap<i32, PartialCall>, chunks: Vec<ChatCompletionMessageToolCallChunk>) {
    for chunk in chunks {
        let entry = calls.entry(chunk.index).or_default();
        if let Some(id) = chunk.id {
            entry.id = id;
        }
        if let Some(function) = chunk.function {
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.arguments.push_str(&arguments);
            }
        }
    }
}

/// Drains the OpenAI chunk stream into `tx`. Function calls and the final text are
/// emitted once the upstream stream ends, after any usage chunk. Chat-completion
/// chunks carry no reasoning summaries, so no reasoning events are produced.
async fn pump_stream(
    mut stream: ChatCompletionResponseStream,
    tx: mpsc::UnboundedSender<Result<StreamEvent>>,
) {
    let mut text = String::new();
    let mut calls: BTreeMap<i32, PartialCall> = BTreeMap::new();

    while let Some(item) = stream.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(anyhow!("Stream error: {}", e)));
                return;
            }
        };
        if let Some(ref u) = chunk.usage {
            if tx.send(Ok(StreamEvent::Usage(usage_from(u)))).is_err() {
                return;
            }
        }
        let Some(choice) = chunk.choices.into_iter().next() else {
            continue;
        };
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                text.push_str(&content);
                if tx.send(Ok(StreamEvent::OutputTextDelta(content))).is_err() {
                    debug!("Stream receiver dropped; stopping");
                    return;
                }
            }
        }
        if let Some(tool_chunks) = choice.delta.tool_calls {
            merge_tool_chunks(&mut calls, tool_chunks);
        }
    }

    for (_, call) in calls {
        let event = StreamEvent::FunctionCall(FunctionCall {
            call_id: call.id,
            name: call.name,
            arguments: call.arguments,
        });
        if tx.send(Ok(event)).is_err() {
            return;
        }
    }
    let _ = tx.send(Ok(StreamEvent::OutputTextDone(text)));
}

#[async_trait]
impl LlmClient for OpenAILlmClient {
    #[instrument(skip(self, request), fields(model = %request.model, turns = request.input.len()))]
    async fn create_completion(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let openai_request = Self::build_request(&request, false)?;
        let response = self.client.chat_completion(openai_request).await?;
        let usage = response.usage.as_ref().map(usage_from);

        let Some(choice) = response.choices.into_iter().next() else {
            warn!("Completion returned no choices");
            return Ok(CompletionResponse {
                usage,
                ..CompletionResponse::default()
            });
        };

        let output_text = choice.message.content.unwrap_or_default();
        let mut parts = Vec::new();
        if !output_text.is_empty() {
            parts.push(ContentPart::text(output_text.clone()));
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            parts.push(ContentPart::ToolCall(FunctionCall {
                call_id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            }));
        }
        let output = if parts.is_empty() {
            Vec::new()
        } else {
            vec![ConversationTurn::new(Role::Assistant, parts)]
        };

        Ok(CompletionResponse {
            output,
            output_text,
            usage,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model, turns = request.input.len()))]
    async fn create_streaming_completion(&self, request: CompletionRequest) -> Result<EventStream> {
        let openai_request = Self::build_request(&request, true)?;
        let stream = self.client.chat_completion_stream(openai_request).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_stream(stream, tx));
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ContentPart {
        ContentPart::ToolCall(FunctionCall {
            call_id: id.to_string(),
            name: "list_memories".to_string(),
            arguments: r#"{"guildId":null,"query":null,"limit":null}"#.to_string(),
        })
    }

    /// **Test: Instructions come first as a system message; empty instructions are omitted.**
    #[test]
    fn instructions_become_leading_system_message() {
        let input = vec![ConversationTurn::user_text("hi")];
        let with = to_openai_messages("be nice", &input).unwrap();
        assert_eq!(with.len(), 2);
        assert!(matches!(with[0], ChatCompletionRequestMessage::System(_)));

        let without = to_openai_messages("", &input).unwrap();
        assert_eq!(without.len(), 1);
        assert!(matches!(without[0], ChatCompletionRequestMessage::User(_)));
    }

    /// **Test: A tool turn with two results yields two tool messages; assistant calls stay on one message.**
    #[test]
    fn tool_turns_expand_per_result() {
        let input = vec![
            ConversationTurn::new(Role::Assistant, vec![call("c1"), call("c2")]),
            ConversationTurn::new(
                Role::Tool,
                vec![
                    ContentPart::ToolResult { call_id: "c1".into(), output: "{}".into() },
                    ContentPart::ToolResult { call_id: "c2".into(), output: "{}".into() },
                ],
            ),
        ];
        let messages = to_openai_messages("", &input).unwrap();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::Tool(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Tool(_)));
    }

    /// **Test: Developer turns are sent with system role.**
    #[test]
    fn developer_turn_is_system_message() {
        let input = vec![ConversationTurn::new(Role::Developer, vec![ContentPart::text("event")])];
        let messages = to_openai_messages("", &input).unwrap();
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
    }

    fn chunk(index: i32, id: Option<&str>, name: Option<&str>, arguments: &str) -> ChatCompletionMessageToolCallChunk {
        ChatCompletionMessageToolCallChunk {
            index,
            id: id.map(String::from),
            r#type: id.map(|_| ChatCompletionToolType::Function),
            function: Some(openai_client::FunctionCallStream {
                name: name.map(String::from),
                arguments: Some(arguments.to_string()),
            }),
        }
    }

    /// **Test: Streamed tool-call fragments are merged per chunk index, in index order.**
    #[test]
    fn tool_chunks_merge_by_index() {
        let mut calls = BTreeMap::new();
        merge_tool_chunks(
            &mut calls,
            vec![chunk(1, Some("b"), Some("list_emojis"), "{"), chunk(0, Some("a"), Some("list_memories"), "{\"li")],
        );
        merge_tool_chunks(&mut calls, vec![chunk(0, None, None, "mit\":2}"), chunk(1, None, None, "}")]);

        let merged: Vec<(i32, String, String, String)> = calls
            .into_iter()
            .map(|(i, c)| (i, c.id, c.name, c.arguments))
            .collect();
        assert_eq!(
            merged,
            vec![
                (0, "a".into(), "list_memories".into(), r#"{"limit":2}"#.into()),
                (1, "b".into(), "list_emojis".into(), "{}".into()),
            ]
        );
    }
}
