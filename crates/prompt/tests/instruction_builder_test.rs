//! Unit tests for `prompt::InstructionBuilder` and the template helpers.
//!
//! External interactions: none (pure function tests).

use prompt::{
    render_template, render_thinking, InstructionBuilder, DEFAULT_INSTRUCTIONS,
    STRUCTURED_INPUT_APPENDIX,
};

/// **Test: All three placeholders are replaced, every occurrence.**
#[test]
fn render_template_replaces_all_placeholders() {
    let out = render_template("{@} {NAME} {NICK} / {@}", "gptbot", "GPT Bot", "Chat");
    assert_eq!(out, "gptbot GPT Bot Chat / gptbot");
}

/// **Test: Thinking template replaces only the first {@} with the mention.**
#[test]
fn render_thinking_replaces_first_mention_only() {
    assert_eq!(render_thinking("{@} is thinking...", "<@42>"), "<@42> is thinking...");
    assert_eq!(render_thinking("{@} {@}", "<@42>"), "<@42> {@}");
    assert_eq!(render_thinking("Thinking", "<@42>"), "Thinking");
}

/// **Test: Display name falls back to the username when not provided.**
#[test]
fn display_name_defaults_to_username() {
    let out = InstructionBuilder::new("{NAME}").username("gptbot").build();
    assert!(out.starts_with("gptbot\n"));
}

/// **Test: The structured input appendix is always present.**
#[test]
fn appendix_always_appended() {
    let out = InstructionBuilder::default().username("bot").build();
    assert!(out.ends_with(STRUCTURED_INPUT_APPENDIX));
    assert!(!out.contains("{NICK}"));
    assert!(DEFAULT_INSTRUCTIONS.contains("{NICK}"));
}

/// **Test: Emoji names are listed as shortcodes inside a code block.**
#[test]
fn emojis_listed_as_shortcodes() {
    let out = InstructionBuilder::new("x")
        .emojis(["pepe_laugh", "catjam"])
        .build();
    assert!(out.contains(":pepe_laugh: :catjam:"));
    assert!(out.ends_with("\n```"));
}

/// **Test: No emoji section without emojis.**
#[test]
fn no_emoji_section_when_empty() {
    let out = InstructionBuilder::new("x").build();
    assert!(!out.contains("custom emojis"));
}
