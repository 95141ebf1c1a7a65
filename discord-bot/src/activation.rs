//! Activation policy for chat-mode channels.
//!
//! Decides whether a freshly appended user turn triggers a model call or is only
//! buffered into history. After the model declines twice in a row, four buffered
//! messages are needed before it is asked again.

/// Reply that means "stay silent".
pub const SKIP_SENTINEL: &str = "[skip]";

/// Per-session activation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationState {
    /// Sticky "live exchange in progress" flag.
    pub activated: bool,
    /// Messages buffered since the last processed one.
    pub skipped_count: u32,
    /// Consecutive model replies that declined to respond.
    pub skip_streak: u32,
}

/// Facts about an incoming message that may wake the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationSignals {
    pub mentions_bot: bool,
    pub has_wake_keyword: bool,
    pub replies_to_bot: bool,
}

/// Why a message is processed; the first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationReason {
    Activated,
    SkipThreshold,
    Mention,
    WakeKeyword,
    ReplyToBot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Process(ActivationReason),
    Buffer,
}

impl ActivationState {
    pub fn skip_threshold(&self) -> u32 {
        if self.skip_streak <= 1 {
            1
        } else {
            4
        }
    }

    pub fn decide(&self, signals: &ActivationSignals) -> Decision {
        if self.activated {
            Decision::Process(ActivationReason::Activated)
        } else if self.skipped_count >= self.skip_threshold() {
            Decision::Process(ActivationReason::SkipThreshold)
        } else if signals.mentions_bot {
            Decision::Process(ActivationReason::Mention)
        } else if signals.has_wake_keyword {
            Decision::Process(ActivationReason::WakeKeyword)
        } else if signals.replies_to_bot {
            Decision::Process(ActivationReason::ReplyToBot)
        } else {
            Decision::Buffer
        }
    }

    pub fn on_buffered(&mut self) {
        self.skipped_count += 1;
    }

    pub fn on_processed(&mut self) {
        self.skipped_count = 0;
    }

    /// The model declined with the skip sentinel.
    pub fn on_skip(&mut self) {
        self.activated = false;
        self.skip_streak += 1;
    }

    /// The model produced a real reply.
    pub fn on_reply(&mut self, activate: bool) {
        if activate {
            self.activated = true;
        }
        self.skip_streak = 0;
    }
}

/// Case-insensitive substring match against any non-empty keyword.
pub fn contains_wake_keyword(text: &str, keywords: &[String]) -> bool {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .any(|k| lower.contains(&k.to_lowercase()))
}

/// `[skip]`, `` `[skip]` `` or any reply starting with `[skip]`.
pub fn is_skip_sentinel(reply: &str) -> bool {
    let trimmed = reply.trim();
    trimmed.starts_with(SKIP_SENTINEL)
        || trimmed
            .strip_prefix('`')
            .map(|rest| rest.starts_with(SKIP_SENTINEL))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: ActivationSignals = ActivationSignals {
        mentions_bot: false,
        has_wake_keyword: false,
        replies_to_bot: false,
    };

    /// **Test: A fresh session buffers a plain message and counts it.**
    #[test]
    fn test_fresh_session_buffers_plain_message() {
        let mut state = ActivationState::default();
        assert_eq!(state.decide(&QUIET), Decision::Buffer);
        state.on_buffered();
        assert_eq!(state.skipped_count, 1);
    }

    /// **Test: Rules are applied in precedence order.**
    #[test]
    fn test_precedence() {
        let all = ActivationSignals {
            mentions_bot: true,
            has_wake_keyword: true,
            replies_to_bot: true,
        };
        let active = ActivationState {
            activated: true,
            ..Default::default()
        };
        assert_eq!(active.decide(&all), Decision::Process(ActivationReason::Activated));

        let idle = ActivationState::default();
        assert_eq!(idle.decide(&all), Decision::Process(ActivationReason::Mention));
        let kw = ActivationSignals {
            has_wake_keyword: true,
            replies_to_bot: true,
            ..QUIET
        };
        assert_eq!(idle.decide(&kw), Decision::Process(ActivationReason::WakeKeyword));
        let reply = ActivationSignals {
            replies_to_bot: true,
            ..QUIET
        };
        assert_eq!(idle.decide(&reply), Decision::Process(ActivationReason::ReplyToBot));
    }

    /// **Test: With a streak of 0 or 1 the second plain message is processed.**
    #[test]
    fn test_threshold_one_after_single_skip() {
        let mut state = ActivationState {
            skip_streak: 1,
            ..Default::default()
        };
        state.on_buffered();
        assert_eq!(
            state.decide(&QUIET),
            Decision::Process(ActivationReason::SkipThreshold)
        );
    }

    /// **Test: After two skips in a row, four plain messages are buffered before the next one is processed.**
    #[test]
    fn test_skip_backoff() {
        let mut state = ActivationState::default();
        state.on_skip();
        state.on_skip();
        assert_eq!(state.skip_threshold(), 4);
        for _ in 0..4 {
            assert_eq!(state.decide(&QUIET), Decision::Buffer);
            state.on_buffered();
        }
        assert_eq!(state.skipped_count, 4);
        assert_eq!(
            state.decide(&QUIET),
            Decision::Process(ActivationReason::SkipThreshold)
        );
        state.on_processed();
        assert_eq!(state.skipped_count, 0);
    }

    /// **Test: Once activated every message is processed until a skip reply.**
    #[test]
    fn test_activation_is_sticky_until_skip() {
        let mut state = ActivationState::default();
        state.on_reply(true);
        for _ in 0..5 {
            assert_eq!(state.decide(&QUIET), Decision::Process(ActivationReason::Activated));
            state.on_processed();
        }
        state.on_skip();
        assert!(!state.activated);
        assert_eq!(state.decide(&QUIET), Decision::Buffer);
    }

    #[test]
    fn test_reply_without_activation_only_resets_streak() {
        let mut state = ActivationState {
            skip_streak: 3,
            ..Default::default()
        };
        state.on_reply(false);
        assert!(!state.activated);
        assert_eq!(state.skip_streak, 0);
    }

    #[test]
    fn test_skip_sentinel_forms() {
        assert!(is_skip_sentinel("[skip]"));
        assert!(is_skip_sentinel("  `[skip]`  "));
        assert!(is_skip_sentinel("[skip] nothing to add"));
        assert!(!is_skip_sentinel("I would [skip] that"));
        assert!(!is_skip_sentinel(""));
    }

    #[test]
    fn test_wake_keywords() {
        let kws = vec!["Robo".to_string(), " ".to_string()];
        assert!(contains_wake_keyword("hey ROBOT are you there", &kws));
        assert!(!contains_wake_keyword("hello there", &kws));
        assert!(!contains_wake_keyword("anything", &[]));
    }
}
