//! Integration tests for ConversationSession: debounce, in-flight coalescing, skip
//! backoff, error recovery and assistant-mode streaming.
//!
//! Uses paused tokio time so debounce windows and slow model calls run instantly.

mod common;

use common::mock_bot::{Failure, MockBot};
use common::mock_llm::MockLlm;
use common::{bot_user, channel, mention_message, user_message, BOT_ID};
use discord_bot::core::{ChatMode, ReplyRef};
use discord_bot::emoji::EmojiTable;
use discord_bot::session::{ConversationSession, SessionDeps, SessionSettings};
use discord_bot::tools::NoTools;
use llm_client::{StreamEvent, TokenUsage};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn session_with(llm: MockLlm, mode: ChatMode) -> (Arc<ConversationSession>, Arc<MockBot>, Arc<MockLlm>) {
    let bot = Arc::new(MockBot::new());
    let llm = Arc::new(llm);
    let deps = SessionDeps {
        bot: bot.clone(),
        llm: llm.clone(),
        tools: Arc::new(NoTools),
        emojis: Arc::new(EmojiTable::default()),
    };
    let settings = SessionSettings::new("gpt-4o", mode, "You are a test bot.");
    let session = Arc::new(ConversationSession::new(channel(), BOT_ID, settings, deps));
    (session, bot, llm)
}

fn chat_session(llm: MockLlm) -> (Arc<ConversationSession>, Arc<MockBot>, Arc<MockLlm>) {
    session_with(llm, ChatMode::Chat)
}

/// Waits past one debounce window.
async fn settle() {
    sleep(Duration::from_millis(1500)).await;
}

/// **Test: A burst of messages inside the debounce window produces one model call.**
#[tokio::test(start_paused = true)]
async fn test_burst_is_coalesced() {
    let (session, bot, llm) = chat_session(MockLlm::replying("hi there"));

    session.handle(&mention_message(1, "hello")).await.unwrap();
    sleep(Duration::from_millis(300)).await;
    session.handle(&user_message(2, "are you")).await.unwrap();
    sleep(Duration::from_millis(300)).await;
    session.handle(&user_message(3, "there?")).await.unwrap();
    assert_eq!(llm.calls(), 0, "debounce window still open");

    settle().await;
    assert_eq!(llm.calls(), 1);
    assert_eq!(llm.requests()[0].input.len(), 3);

    let sends = bot.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].1, None);
    assert_eq!(sends[0].2, "hi there");
    assert!(session.activation().await.activated);
    assert_eq!(session.history_len().await, 4);
}

/// **Test: Triggers during an in-flight call yield exactly one follow-up, never overlapping.**
#[tokio::test(start_paused = true)]
async fn test_single_in_flight_with_one_follow_up() {
    let llm = MockLlm::replying("ok").with_delay(Duration::from_secs(5));
    let (session, bot, llm) = chat_session(llm);

    session.handle(&mention_message(1, "first")).await.unwrap();
    sleep(Duration::from_millis(1200)).await;
    assert_eq!(llm.calls(), 1);
    assert!(session.is_processing().await);

    session.handle(&mention_message(2, "second")).await.unwrap();
    sleep(Duration::from_millis(500)).await;
    session.handle(&mention_message(3, "third")).await.unwrap();
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(llm.calls(), 1, "no second call while the first is running");
    assert!(session.has_pending().await);

    sleep(Duration::from_secs(20)).await;
    assert_eq!(llm.calls(), 2);
    assert_eq!(llm.max_in_flight(), 1);
    assert!(!session.is_processing().await);
    assert!(!session.has_pending().await);

    let follow_up = &llm.requests()[1].input;
    assert_eq!(follow_up.len(), 4);
    assert!(follow_up.iter().any(|t| t.text().contains("second")));
    assert!(follow_up.iter().any(|t| t.text().contains("third")));
    assert_eq!(bot.sends().len(), 2);
}

/// **Test: After two skips in a row, four buffered messages are needed before the next call.**
#[tokio::test(start_paused = true)]
async fn test_skip_backoff() {
    let (session, bot, llm) = chat_session(MockLlm::replying("[skip]"));

    session.handle(&mention_message(1, "anyone?")).await.unwrap();
    settle().await;
    assert_eq!(llm.calls(), 1);
    assert!(!session.activation().await.activated);

    // Streak of one: the next plain message is buffered, the one after is processed.
    session.handle(&user_message(2, "chatter")).await.unwrap();
    settle().await;
    assert_eq!(llm.calls(), 1);
    session.handle(&user_message(3, "more chatter")).await.unwrap();
    settle().await;
    assert_eq!(llm.calls(), 2);
    assert_eq!(session.activation().await.skip_streak, 2);

    for id in 4..=7 {
        session.handle(&user_message(id, "background")).await.unwrap();
        settle().await;
    }
    assert_eq!(llm.calls(), 2);
    assert_eq!(session.activation().await.skipped_count, 4);

    session.handle(&user_message(8, "still here")).await.unwrap();
    settle().await;
    assert_eq!(llm.calls(), 3);
    assert!(bot.sends().is_empty(), "skip replies are never sent");
}

/// **Test: A permission failure while sending leaves the session usable and is not reported.**
#[tokio::test(start_paused = true)]
async fn test_permission_error_resets_processing() {
    let (session, bot, llm) = chat_session(MockLlm::replying("hello"));
    bot.fail_sends(Some(Failure::Permission));

    session.handle(&mention_message(1, "hi")).await.unwrap();
    settle().await;
    assert_eq!(llm.calls(), 1);
    assert!(!session.is_processing().await);

    bot.fail_sends(None);
    session.handle(&mention_message(2, "hi again")).await.unwrap();
    settle().await;
    assert_eq!(llm.calls(), 2);
    let sends = bot.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].2, "hello");
}

/// **Test: A failed model call posts the error notice and the next trigger is served.**
#[tokio::test(start_paused = true)]
async fn test_model_failure_reports_and_recovers() {
    let llm = MockLlm::replying("recovered").failing_first(1, "upstream returned 503");
    let (session, bot, llm) = chat_session(llm);

    session.handle(&mention_message(1, "hi")).await.unwrap();
    settle().await;
    assert_eq!(llm.calls(), 1);
    assert!(!session.is_processing().await);
    assert!(!session.has_pending().await);

    let sends = bot.sends();
    assert_eq!(sends.len(), 1);
    let notice = &sends[0].2;
    assert!(notice.starts_with("⚠️ **Error**\n```\n"), "{}", notice);
    assert!(notice.contains("upstream returned 503"), "{}", notice);
    assert!(notice.ends_with("\n```"));

    session.handle(&mention_message(2, "hi again")).await.unwrap();
    settle().await;
    assert_eq!(llm.calls(), 2);
    assert_eq!(bot.sends().last().unwrap().2, "recovered");
}

/// **Test: A failing streamed turn in assistant mode also reports the error.**
#[tokio::test(start_paused = true)]
async fn test_streaming_failure_reports_error() {
    let llm = MockLlm::streaming(vec![StreamEvent::OutputTextDelta("never".into())])
        .failing_first(1, "stream refused");
    let (session, bot, _llm) = session_with(llm, ChatMode::Assistant);

    session.handle(&mention_message(1, "hi")).await.unwrap();
    settle().await;
    assert!(!session.is_processing().await);
    let notices: Vec<String> = bot
        .sends()
        .into_iter()
        .map(|(_, _, text)| text)
        .filter(|t| t.starts_with("⚠️ **Error**"))
        .collect();
    assert_eq!(notices.len(), 1, "{:?}", bot.sends());
    assert!(notices[0].contains("stream refused"));
}

/// **Test: Replying to one of the bot's messages wakes it; a plain message does not.**
#[tokio::test(start_paused = true)]
async fn test_reply_to_bot_activates() {
    let (quiet, _, quiet_llm) = chat_session(MockLlm::replying("yes?"));
    quiet.handle(&user_message(1, "just talking")).await.unwrap();
    settle().await;
    assert_eq!(quiet_llm.calls(), 0);

    let (session, bot, llm) = chat_session(MockLlm::replying("yes?"));
    bot.register_message(555, bot_user());
    let mut reply = user_message(2, "what did you mean");
    reply.reply_to = Some(ReplyRef {
        message_id: 555,
        author: None,
    });
    session.handle(&reply).await.unwrap();
    settle().await;
    assert_eq!(llm.calls(), 1);
    let input = &llm.requests()[0].input;
    assert_eq!(input.len(), 1);
    assert!(input[0].text().contains("replyingTo"), "{}", input[0].text());
}

/// **Test: Assistant mode streams a reply to the triggering message and records it.**
#[tokio::test]
async fn test_assistant_mode_streams_reply() {
    let events = vec![
        StreamEvent::ReasoningPartAdded,
        StreamEvent::ReasoningDelta("pondering".into()),
        StreamEvent::OutputTextDelta("Hel".into()),
        StreamEvent::OutputTextDelta("lo".into()),
        StreamEvent::OutputTextDone("Hello".into()),
        StreamEvent::Usage(TokenUsage {
            prompt_tokens: 5,
            completion_tokens: 2,
            total_tokens: 7,
        }),
    ];
    let (session, bot, llm) = session_with(MockLlm::streaming(events), ChatMode::Assistant);

    let msg = user_message(77, "say hello");
    session.handle(&msg).await.unwrap();

    assert_eq!(llm.calls(), 1);
    assert_eq!(llm.requests()[0].input.len(), 1);

    let sends = bot.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].1, Some(77));
    assert!(sends[0].2.contains("<@7> is thinking..."), "{}", sends[0].2);
    let final_text = bot.text_of(sends[0].0).unwrap();
    assert!(final_text.starts_with("Hello\n\n-# 💤 `gpt-4o`"), "{}", final_text);

    let history = session.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].text(), "Hello");
    assert!(!session.is_processing().await);
}
