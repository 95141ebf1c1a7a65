//! Custom emoji table from `CUSTOM_EMOJIS` (`name:id[:a],...`).
//!
//! Used to expand `:name:` shortcodes in model output, to resolve reaction targets by
//! name, and to pick footer glyphs.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-zA-Z0-9_]+):").expect("invalid regex"));

/// Discord caps emoji names at 32 chars; longer runs are never held back.
const NAME_MAX_CHARS: usize = 32;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEmoji {
    pub name: String,
    pub id: u64,
    pub animated: bool,
}

impl CustomEmoji {
    /// Discord markup: `<:name:id>` or `<a:name:id>`.
    pub fn markup(&self) -> String {
        format!(
            "<{}:{}:{}>",
            if self.animated { "a" } else { "" },
            self.name,
            self.id
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmojiTable {
    by_name: BTreeMap<String, CustomEmoji>,
}

impl EmojiTable {
    /// Parses `name:id[:a]` entries separated by commas. Malformed entries are skipped.
    pub fn parse(raw: &str) -> Self {
        let mut by_name = BTreeMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.split(':');
            let (Some(name), Some(id)) = (parts.next(), parts.next()) else {
                tracing::warn!(entry = %entry, "Skipping malformed custom emoji entry");
                continue;
            };
            let Ok(id) = id.trim().parse::<u64>() else {
                tracing::warn!(entry = %entry, "Skipping custom emoji with non-numeric id");
                continue;
            };
            let animated = matches!(parts.next(), Some(flag) if flag.trim() == "a");
            let name = name.trim().to_string();
            by_name.insert(name.clone(), CustomEmoji { name, id, animated });
        }
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&CustomEmoji> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomEmoji> {
        self.by_name.values()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Replaces known `:name:` shortcodes with their markup; unknown ones and shortcodes
    /// already inside `<:name:id>` / `<a:name:id>` markup are left as is.
    pub fn substitute(&self, text: &str) -> String {
        if self.by_name.is_empty() {
            return text.to_string();
        }
        SHORTCODE_RE
            .replace_all(text, |caps: &Captures| {
                let before = &text[..caps.get(0).map_or(0, |m| m.start())];
                if before.ends_with('<') || before.ends_with("<a") {
                    return caps[0].to_string();
                }
                match self.by_name.get(&caps[1]) {
                    Some(emoji) => emoji.markup(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Byte offset where a trailing `:name` that later text could complete into a
    /// shortcode begins; `text.len()` when nothing needs holding back. A `<` or `<a`
    /// right before that point is held back too, so markup split across deltas is
    /// recognized as markup once it completes.
    pub fn pending_shortcode_start(&self, text: &str) -> usize {
        if self.by_name.is_empty() {
            return text.len();
        }
        let settled = SHORTCODE_RE.find_iter(text).last().map_or(0, |m| m.end());
        let hold = match text[settled..].rfind(':').map(|i| settled + i) {
            Some(colon)
                if text[colon + 1..].chars().count() <= NAME_MAX_CHARS
                    && text[colon + 1..].chars().all(is_name_char) =>
            {
                colon
            }
            _ => text.len(),
        };
        let head = &text[..hold];
        if head.ends_with("<a") {
            hold - 2
        } else if head.ends_with('<') {
            hold - 1
        } else {
            hold
        }
    }
}
