//! Conversation model shared by the bot and LLM adapters.
//!
//! A [`ConversationTurn`] is one message-equivalent unit of history. Its content is an
//! ordered list of [`ContentPart`]s so a single turn can carry text and images (user),
//! text and tool calls (assistant), or tool results (tool).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author role of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Operator/system-level input (e.g. structured events). Sent as a system message.
    Developer,
    Tool,
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: String,
    /// Serialized JSON arguments, exactly as the model produced them.
    pub arguments: String,
}

/// One part of a turn's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { url: String },
    ToolCall(FunctionCall),
    ToolResult { call_id: String, output: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::Image { url: url.into() }
    }

    /// Text payload if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// One entry of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: Vec<ContentPart>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Creates a turn stamped with the current time.
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(text)])
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentPart::text(text)])
    }

    /// Tool turn holding one function result.
    pub fn tool_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(
            Role::Tool,
            vec![ContentPart::ToolResult {
                call_id: call_id.into(),
                output: output.into(),
            }],
        )
    }

    /// Returns the same turn with a different timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Function calls carried by this turn, in order.
    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.content.iter().filter_map(|p| match p {
            ContentPart::ToolCall(call) => Some(call),
            _ => None,
        })
    }
}

/// Tool definition offered to the model (JSON-schema parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Token accounting reported by the upstream API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Test: text() joins only text parts; images and tool calls are skipped.**
    #[test]
    fn text_joins_text_parts_only() {
        let turn = ConversationTurn::new(
            Role::User,
            vec![
                ContentPart::text("hello"),
                ContentPart::image("https://cdn.example/cat.png"),
                ContentPart::text("world"),
            ],
        );
        assert_eq!(turn.text(), "hello\nworld");
    }

    /// **Test: function_calls() yields calls in order.**
    #[test]
    fn function_calls_in_order() {
        let call = |id: &str| {
            ContentPart::ToolCall(FunctionCall {
                call_id: id.to_string(),
                name: "list_emojis".to_string(),
                arguments: "{}".to_string(),
            })
        };
        let turn = ConversationTurn::new(Role::Assistant, vec![call("a"), ContentPart::text("x"), call("b")]);
        let ids: Vec<_> = turn.function_calls().map(|c| c.call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
