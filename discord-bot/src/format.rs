//! Status text for streamed replies: thinking placeholder, footers, elapsed time, error notice.

use crate::emoji::EmojiTable;
use llm_client::TokenUsage;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Invisible spacer between the model id and the clock.
pub const GAP: &str = "\u{200e} \u{200e} \u{200e} \u{200e} \u{200e} \u{200e} ";

/// Number of trailing reasoning words shown under the thinking line.
pub const REASONING_TAIL_WORDS: usize = 80;

/// Cap on the reasoning tail in chars, so long words cannot push the placeholder past
/// Discord's limit.
pub const REASONING_TAIL_MAX_CHARS: usize = 1200;

static FENCE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```.*\n").expect("invalid regex"));

/// Glyphs used by the footer and thinking placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FooterStyle {
    pub spinner: String,
    pub clock: String,
    pub done: String,
}

impl Default for FooterStyle {
    fn default() -> Self {
        Self {
            spinner: "⏳".to_string(),
            clock: "🕒".to_string(),
            done: "💤".to_string(),
        }
    }
}

impl FooterStyle {
    /// Uses the `loading`, `minecraft_clock` and `resting` custom emojis when configured.
    pub fn from_emojis(emojis: &EmojiTable) -> Self {
        let base = Self::default();
        let pick = |name: &str, fallback: String| {
            emojis.get(name).map(|e| e.markup()).unwrap_or(fallback)
        };
        Self {
            spinner: pick("loading", base.spinner),
            clock: pick("minecraft_clock", base.clock),
            done: pick("resting", base.done),
        }
    }
}

/// `1h 2m 3s 45ms`; leading zero units are dropped, milliseconds are always shown.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let h = total_ms / 3_600_000;
    let m = (total_ms / 60_000) % 60;
    let s = (total_ms / 1000) % 60;
    let ms = total_ms % 1000;

    let mut parts = Vec::with_capacity(4);
    if h > 0 {
        parts.push(format!("{}h", h));
    }
    if h > 0 || m > 0 {
        parts.push(format!("{}m", m));
    }
    if h > 0 || m > 0 || s > 0 {
        parts.push(format!("{}s", s));
    }
    parts.push(format!("{}ms", ms));
    parts.join(" ")
}

/// Strips emphasis, fences, ticks and newlines so reasoning fits one quoted line.
pub fn sanitize_reasoning(text: &str) -> String {
    let text = text.replace("**", "").replace('*', "");
    let text = FENCE_LINE_RE.replace_all(&text, " ");
    text.replace("```", "")
        .replace('`', "")
        .replace("\n\n", " ")
        .replace('\n', " ")
}

/// Last `max_words` words of the sanitized reasoning, prefixed with "..." when cut.
pub fn reasoning_tail(reasoning: &str, max_words: usize) -> Option<String> {
    let sanitized = sanitize_reasoning(reasoning);
    let words: Vec<&str> = sanitized.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let tail = if words.len() > max_words {
        format!("...{}", words[words.len() - max_words..].join(" "))
    } else {
        words.join(" ")
    };
    let count = tail.chars().count();
    if count > REASONING_TAIL_MAX_CHARS {
        let keep: String = tail.chars().skip(count - (REASONING_TAIL_MAX_CHARS - 3)).collect();
        return Some(format!("...{}", keep));
    }
    Some(tail)
}

/// Placeholder shown before the first output token.
pub fn thinking_message(
    style: &FooterStyle,
    model: &str,
    started_unix: i64,
    thinking_text: &str,
    reasoning: &str,
) -> String {
    let mut out = format!(
        "### `{}` {}{} <t:{}:R>\n## {} **{}**",
        model, GAP, style.clock, started_unix, style.spinner, thinking_text
    );
    if let Some(tail) = reasoning_tail(reasoning, REASONING_TAIL_WORDS) {
        out.push_str("\n-# > ");
        out.push_str(&tail);
    }
    out
}

pub fn streaming_footer(style: &FooterStyle, model: &str, started_unix: i64) -> String {
    format!(
        "### {} `{}` {}{} <t:{}:R>",
        style.spinner, model, GAP, style.clock, started_unix
    )
}

pub fn done_footer(
    style: &FooterStyle,
    model: &str,
    elapsed: Duration,
    usage: Option<&TokenUsage>,
    context_count: Option<usize>,
) -> String {
    let mut out = format!(
        "-# {} `{}` {}{} {}",
        style.done,
        model,
        GAP,
        style.clock,
        format_elapsed(elapsed)
    );
    if let Some(u) = usage {
        out.push_str(&format!(
            " · {}/{} tokens",
            u.prompt_tokens, u.completion_tokens
        ));
    }
    if let Some(n) = context_count {
        out.push_str(&format!(" · {} contexts", n));
    }
    out
}

/// Chars a live message needs besides its body: the wider of the streaming footer and
/// the final footer at its widest, plus the blank line in front of it.
pub fn footer_reserve(style: &FooterStyle, model: &str, started_unix: i64) -> usize {
    let widest_usage = TokenUsage {
        prompt_tokens: u32::MAX,
        completion_tokens: u32::MAX,
        total_tokens: u32::MAX,
    };
    let longest_run = Duration::from_millis(999 * 3_600_000 + 3_599_999);
    let streaming = streaming_footer(style, model, started_unix).chars().count();
    let done = done_footer(style, model, longest_run, Some(&widest_usage), Some(usize::MAX))
        .chars()
        .count();
    streaming.max(done) + 2
}

/// Channel notice for a failed response cycle.
pub fn error_message(err: &dyn std::fmt::Display) -> String {
    format!("⚠️ **Error**\n```\n{}\n```", err)
}
