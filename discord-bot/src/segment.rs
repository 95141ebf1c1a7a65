//! Text segmenter: cuts a growing reply into chunks that fit one Discord message.
//!
//! Lengths are counted in chars. A cut never leaves a chunk with an open code fence
//! or inline code span: the head is closed and the tail reopened with the same marker.
//! Inline-code detection is a regex heuristic, not a Markdown parser.

use regex::Regex;
use std::sync::LazyLock;

/// Chunk budget per message; leaves room for the status footer under Discord's 2000.
pub const MESSAGE_MAX_LENGTH: usize = 1900;

/// Hard limit Discord enforces on message content.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Longest `<...>` token (custom emoji, mention, timestamp) a hard cut steps around.
const MARKUP_MAX_CHARS: usize = 64;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)```([a-zA-Z0-9]*)(?:$|\n)").expect("invalid regex"));

static INLINE_TICK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)( `|` |^`[^`]|`,|`\.|\(`|`\)|[^`\n]`)").expect("invalid regex")
});

/// Formatting still open at the end of a text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenFormatting {
    pub in_code_block: bool,
    /// Opening marker of the unclosed fence, e.g. "```rust".
    pub code_block_header: Option<String>,
    pub in_inline_code: bool,
}

impl OpenFormatting {
    pub fn is_open(&self) -> bool {
        self.in_code_block || self.in_inline_code
    }

    /// Marker that closes whatever is open ("\n```", "`" or nothing).
    pub fn closing_marker(&self) -> &'static str {
        if self.in_code_block {
            "\n```"
        } else if self.in_inline_code {
            "`"
        } else {
            ""
        }
    }
}

/// One cut: the balanced head and the reopened tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
    pub head: String,
    pub tail: String,
    /// Formatting the head was left in before it was closed; the tail reopens it.
    pub tail_formatting: OpenFormatting,
}

pub fn check_open_formatting(text: &str) -> OpenFormatting {
    let fences: Vec<_> = FENCE_RE.find_iter(text).collect();
    if fences.len() % 2 == 1 {
        let header = fences.last().map(|m| m.as_str().trim().to_string());
        return OpenFormatting {
            in_code_block: true,
            code_block_header: header,
            in_inline_code: false,
        };
    }

    // Only text outside closed fences counts for inline code.
    let mut ticks = 0;
    let mut start = 0;
    for (i, fence) in fences.iter().enumerate() {
        if i % 2 == 0 {
            ticks += INLINE_TICK_RE.find_iter(&text[start..fence.start()]).count();
        }
        start = fence.end();
    }
    ticks += INLINE_TICK_RE.find_iter(&text[start..]).count();

    OpenFormatting {
        in_code_block: false,
        code_block_header: None,
        in_inline_code: ticks % 2 == 1,
    }
}

fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(b, _)| b)
        .unwrap_or(text.len())
}

fn trimmed_pair(head: &str, tail: &str) -> (String, String) {
    (head.trim().to_string(), tail.trim().to_string())
}

fn split_at_newline(text: &str, max_length: usize) -> Option<(String, String)> {
    let newlines: Vec<usize> = text
        .char_indices()
        .enumerate()
        .filter(|(ci, (_, c))| *c == '\n' && ci + 1 < max_length)
        .map(|(_, (b, _))| b)
        .collect();
    newlines
        .into_iter()
        .rev()
        .find(|&b| !text[..b].trim().is_empty())
        .map(|b| trimmed_pair(&text[..b], &text[b + 1..]))
}

fn split_at_sentence(text: &str, max_length: usize) -> Option<(String, String)> {
    let mut head_end = None;
    let mut consumed = 0;
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(". ") {
        let dot = search_from + rel;
        let piece = text[search_from..dot].chars().count();
        // head includes the pieces so far plus their ". " joins and a final "."
        let candidate = consumed + piece + 1;
        if candidate >= max_length {
            break;
        }
        consumed = candidate + 1;
        head_end = Some(dot);
        search_from = dot + 2;
    }
    let dot = head_end?;
    let head = &text[..=dot];
    if head.trim().is_empty() {
        return None;
    }
    Some(trimmed_pair(head, &text[dot + 2..]))
}

/// Start of a `<...>` token that a cut before `cut` would split in two.
fn markup_start(chars: &[char], cut: usize) -> Option<usize> {
    let lt = chars[..cut].iter().rposition(|&c| c == '<')?;
    let gt = lt + chars[lt..].iter().position(|&c| c == '>')?;
    let token = &chars[lt..=gt];
    let splits = gt >= cut && lt > 0;
    (splits && token.len() <= MARKUP_MAX_CHARS && !token.iter().any(|c| c.is_whitespace())).then_some(lt)
}

fn hard_cut(text: &str, max_length: usize) -> (String, String) {
    let chars: Vec<char> = text.chars().collect();
    let original = max_length.saturating_sub(1).max(1).min(chars.len());
    let mut cut = original;
    while cut > 0 && cut < chars.len() && chars[cut] == '`' && chars[cut - 1] == '`' {
        cut -= 1;
    }
    if cut == 0 {
        cut = original;
    }
    if let Some(start) = markup_start(&chars, cut) {
        cut = start;
    }
    let b = byte_offset(text, cut);
    trimmed_pair(&text[..b], &text[b..])
}

/// Splits `text` into a head of at most `max_length` chars and the remaining tail.
/// Prefers the last newline, then sentence boundaries, then a hard cut that avoids
/// landing inside a backtick run or a `<...>` token.
pub fn break_message(text: &str, max_length: usize) -> (String, String) {
    if text.chars().count() <= max_length {
        return (text.trim().to_string(), String::new());
    }
    split_at_newline(text, max_length)
        .or_else(|| split_at_sentence(text, max_length))
        .unwrap_or_else(|| hard_cut(text, max_length))
}

/// [`break_message`], then closes open formatting on the head and reopens it on the tail.
/// When the closing marker pushes the head over `max_length` the cut is retried with
/// a smaller budget.
pub fn break_and_fix_message(text: &str, max_length: usize) -> SplitResult {
    fix_with(text, max_length, break_message)
}

fn hard_break(text: &str, max_length: usize) -> (String, String) {
    if text.chars().count() <= max_length {
        return (text.trim().to_string(), String::new());
    }
    hard_cut(text, max_length)
}

fn fix_with(text: &str, max_length: usize, breaker: fn(&str, usize) -> (String, String)) -> SplitResult {
    let mut budget = max_length.max(2);
    loop {
        let (mut head, mut tail) = breaker(text, budget);
        let formatting = check_open_formatting(&head);
        if formatting.in_code_block {
            head.push_str("\n```");
            if !tail.is_empty() {
                let header = formatting.code_block_header.as_deref().unwrap_or("```");
                tail = format!("{}\n{}", header, tail);
            }
        } else if formatting.in_inline_code {
            head.push('`');
            if !tail.is_empty() {
                tail.insert(0, '`');
            }
        }

        let len = head.chars().count();
        if len <= max_length || budget <= 2 {
            return SplitResult {
                head,
                tail,
                tail_formatting: formatting,
            };
        }
        budget = budget.saturating_sub(len - max_length).max(2);
    }
}

/// One cut that always shortens the remaining text. A split whose reopened tail is not
/// shorter than the input (e.g. a head holding only a fence opener) is redone as a
/// fixed hard cut, and as a plain hard cut if even that cannot make progress.
pub(crate) fn next_chunk(text: &str, max_length: usize) -> SplitResult {
    let total = text.chars().count();
    let shorter = |split: &SplitResult| split.tail.is_empty() || split.tail.chars().count() < total;

    let split = break_and_fix_message(text, max_length);
    if shorter(&split) {
        return split;
    }
    let split = fix_with(text, max_length, hard_break);
    if shorter(&split) {
        return split;
    }
    let (head, tail) = hard_cut(text, max_length);
    SplitResult {
        head,
        tail,
        tail_formatting: OpenFormatting::default(),
    }
}

/// Splits a complete reply into well-formed chunks, in order.
pub fn split_message(text: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(2);
    let mut chunks = Vec::new();
    let mut rest = text.trim().to_string();
    while !rest.is_empty() {
        let split = next_chunk(&rest, max_length);
        if !split.head.is_empty() {
            chunks.push(split.head);
        }
        rest = split.tail;
    }
    chunks
}
