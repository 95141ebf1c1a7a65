//! # Prompt
//!
//! Builds the per-session instructions sent to the model.
//!
//! ## Format
//!
//! - **Template**: operator-provided text (or [`DEFAULT_INSTRUCTIONS`]) with runtime
//!   placeholders: `{@}` (bot username), `{NAME}` (display name in the guild),
//!   `{NICK}` (configured nickname).
//! - **Structured input appendix**: the JSON schema of incoming user payloads, Discord
//!   formatting rules and output rules.
//! - **Emoji list** (optional): the custom emoji shortcodes available in replies.
//!
//! ## Usage
//!
//! Built once per conversation session by [`InstructionBuilder`]; the result is
//! immutable for the session's lifetime.

/// Placeholder for the bot's account username.
pub const PLACEHOLDER_USERNAME: &str = "{@}";
/// Placeholder for the bot's display name in the current guild.
pub const PLACEHOLDER_NAME: &str = "{NAME}";
/// Placeholder for the configured nickname.
pub const PLACEHOLDER_NICK: &str = "{NICK}";

/// Instruction template used when no custom system prompt is configured.
pub const DEFAULT_INSTRUCTIONS: &str = "You are {NICK}, a friendly member of this Discord server. \
Your account is {@} and people see you as {NAME}. Keep replies short and conversational, \
match the language of the person you reply to, and use tools when they help.";

/// Structured input schema and formatting rules appended to every instruction set.
pub const STRUCTURED_INPUT_APPENDIX: &str = "\
All messages come as structured JSON objects representing Discord messages.
Interpret them as chat input and respond naturally in plain text following Discord conventions.

Schema:
{ \"currentChannel\": { \"id\": string, \"name\": string },
  \"channelId\": string,
  \"serverId\": string,
  \"messageId\": string,
  \"messageAuthor\": { \"id\": string, \"username\": string, \"displayName\": string },
  \"replyingTo\"?: { \"id\": string, \"username\": string, \"displayName\": string, \"messageId\": string },
  \"message\": string }

Discord formatting rules:
 - User mention: <@{user.id}>
 - Role mention: <@&{role.id}>
 - Channel mention: <#{channel.id}>
 - Markdown: *italic*, **bold**, `code`, ```blocks```
 - Timestamps: <t:unix[:style]>
 - Emojis: :emoji_name: or Unicode emoji

Rules:
 - Reply in plain text only, with no JSON or structural output.
 - Never echo or restate the input JSON.
 - Use only IDs provided; don't invent users, roles, or channels.
 - The `message` field is the user's actual text; `replyingTo` gives reply context.
 - Reply with exactly [skip] when the conversation does not need your answer.";

/// Replaces the runtime placeholders in `template`. All occurrences are replaced.
pub fn render_template(template: &str, username: &str, display_name: &str, nickname: &str) -> String {
    template
        .replace(PLACEHOLDER_USERNAME, username)
        .replace(PLACEHOLDER_NAME, display_name)
        .replace(PLACEHOLDER_NICK, nickname)
}

/// Renders the thinking line shown while the model works: the first `{@}` becomes `mention`.
pub fn render_thinking(template: &str, mention: &str) -> String {
    template.replacen(PLACEHOLDER_USERNAME, mention, 1)
}

/// Builder for session instructions.
///
/// ```
/// let text = prompt::InstructionBuilder::new("I am {NICK} ({@})")
///     .username("gptbot")
///     .nickname("Chat")
///     .build();
/// assert!(text.starts_with("I am Chat (gptbot)\n"));
/// ```
#[derive(Debug, Clone)]
pub struct InstructionBuilder {
    template: String,
    username: String,
    display_name: Option<String>,
    nickname: String,
    emojis: Vec<String>,
}

impl Default for InstructionBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}

impl InstructionBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            username: String::new(),
            display_name: None,
            nickname: "ChatGPT".to_string(),
            emojis: Vec::new(),
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Guild display name; falls back to the username when unset.
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    /// Custom emoji names (without colons) listed as available shortcodes.
    pub fn emojis<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.emojis = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    pub fn build(&self) -> String {
        let display_name = self.display_name.as_deref().unwrap_or(&self.username);
        let mut out = render_template(&self.template, &self.username, display_name, &self.nickname);
        out.push('\n');
        out.push_str(STRUCTURED_INPUT_APPENDIX);
        if !self.emojis.is_empty() {
            out.push_str(
                "\n\nThe following custom emojis are available for use in responses (each separated by whitespace):\n```\n",
            );
            let list: Vec<String> = self.emojis.iter().map(|n| format!(":{}:", n)).collect();
            out.push_str(&list.join(" "));
            out.push_str("\n```");
        }
        out
    }
}
