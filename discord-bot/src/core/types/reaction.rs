//! Reaction emoji.

/// Emoji used to react to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionEmoji {
    Unicode(String),
    Custom {
        id: u64,
        name: Option<String>,
        animated: bool,
    },
}

impl ReactionEmoji {
    /// Text form: the Unicode emoji itself or `<:name:id>` / `<a:name:id>`.
    pub fn markup(&self) -> String {
        match self {
            ReactionEmoji::Unicode(s) => s.clone(),
            ReactionEmoji::Custom { id, name, animated } => format!(
                "<{}:{}:{}>",
                if *animated { "a" } else { "" },
                name.as_deref().unwrap_or("_"),
                id
            ),
        }
    }
}
