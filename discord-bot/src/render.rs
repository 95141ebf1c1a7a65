//! Streaming renderer: turns completion deltas into a chain of edited Discord messages.
//!
//! One [`RenderJob`] per model turn. Producers (the stream loop) only mutate state and
//! raise `has_pending_update`; a single flusher task owns all network calls, so at most
//! one edit or send is in flight per job. Updates arriving during a network round trip
//! collapse into the next flush; intermediate states may be skipped but the final state
//! is always written.
//!
//! Emoji shortcodes are expanded before text is cut, and each chunk is sized so the live
//! message (body, closing marker and footer) stays within Discord's hard limit.

use crate::core::{is_message_not_modified_error, Bot, DbotError, Result, SentMessage};
use crate::emoji::EmojiTable;
use crate::format::{self, FooterStyle};
use crate::segment::{
    check_open_formatting, next_chunk, OpenFormatting, DISCORD_MESSAGE_LIMIT, MESSAGE_MAX_LENGTH,
};
use llm_client::TokenUsage;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Longest marker `OpenFormatting::closing_marker` can append ("\n```").
const CLOSING_MARKER_MAX_CHARS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    /// No output yet; the placeholder shows the thinking line and reasoning.
    Thinking,
    Streaming,
    /// Finalized chunks are waiting to be written.
    Flushing,
    Done,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub model: String,
    /// Bold line of the placeholder, with mentions already substituted.
    pub thinking_text: String,
    pub max_length: usize,
    pub footer: FooterStyle,
    pub emojis: Arc<EmojiTable>,
}

impl RenderOptions {
    pub fn new(model: impl Into<String>, thinking_text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            thinking_text: thinking_text.into(),
            max_length: MESSAGE_MAX_LENGTH,
            footer: FooterStyle::default(),
            emojis: Arc::new(EmojiTable::default()),
        }
    }
}

struct RenderState {
    phase: RenderPhase,
    /// Live tail as displayed, shortcodes already expanded.
    buffer: String,
    /// Raw text held back because more deltas could complete it into a shortcode.
    pending_raw: String,
    full_text: String,
    segments: Vec<String>,
    /// Segments already written to Discord.
    active_segment_index: usize,
    open_formatting: OpenFormatting,
    reasoning: String,
    has_pending_update: bool,
    is_flushing: bool,
    completed: bool,
    /// Set by `finish`; the flusher exits once nothing is pending.
    closing: bool,
    /// Message currently displaying the live tail.
    current: Option<SentMessage>,
    /// Last message of the reply chain.
    last: SentMessage,
    usage: Option<TokenUsage>,
    context_count: Option<usize>,
}

struct Shared {
    state: Mutex<RenderState>,
    notify: Notify,
    options: RenderOptions,
    /// Chunk size for the body; leaves room for the footer under the hard limit.
    body_budget: usize,
    started: Instant,
    started_unix: i64,
}

/// Body chars per message: `max_length`, shrunk until body, closing marker and the
/// widest footer fit in one Discord message.
fn body_budget(options: &RenderOptions, started_unix: i64) -> usize {
    let reserve = format::footer_reserve(&options.footer, &options.model, started_unix)
        + CLOSING_MARKER_MAX_CHARS;
    options
        .max_length
        .min(DISCORD_MESSAGE_LIMIT.saturating_sub(reserve))
        .max(2)
}

/// What one flush writes: finalized chunks first, then the live text.
struct FlushPlan {
    segments: Vec<String>,
    live: String,
    current: Option<SentMessage>,
    last: SentMessage,
}

impl Shared {
    fn live_text(&self, st: &RenderState) -> String {
        if st.phase == RenderPhase::Thinking {
            return format::thinking_message(
                &self.options.footer,
                &self.options.model,
                self.started_unix,
                &self.options.thinking_text,
                &st.reasoning,
            );
        }
        let footer = if st.completed {
            format::done_footer(
                &self.options.footer,
                &self.options.model,
                self.started.elapsed(),
                st.usage.as_ref(),
                st.context_count,
            )
        } else {
            format::streaming_footer(&self.options.footer, &self.options.model, self.started_unix)
        };
        let body = st.buffer.trim_end();
        if body.is_empty() {
            return footer;
        }
        format!("{}{}\n\n{}", body, st.open_formatting.closing_marker(), footer)
    }

    fn plan(&self, st: &RenderState) -> FlushPlan {
        FlushPlan {
            segments: st.segments[st.active_segment_index..].to_vec(),
            live: self.live_text(st),
            current: st.current,
            last: st.last,
        }
    }

    /// Moves settled raw text into the buffer with shortcodes expanded, then cuts
    /// finished chunks off its front. `release_all` also lets go of a held-back `:name`.
    fn absorb(&self, st: &mut RenderState, release_all: bool) {
        let raw = std::mem::take(&mut st.pending_raw);
        let emojis = &self.options.emojis;
        let settled = if release_all {
            raw.len()
        } else {
            emojis.pending_shortcode_start(&raw)
        };
        st.buffer.push_str(&emojis.substitute(&raw[..settled]));
        st.pending_raw = raw[settled..].to_string();

        while st.buffer.chars().count() > self.body_budget {
            let split = next_chunk(&st.buffer, self.body_budget);
            if !split.head.is_empty() {
                st.segments.push(split.head);
                st.phase = RenderPhase::Flushing;
            }
            let mut tail = split.tail;
            // The cut trims the tail; whitespace at its end separates it from the next delta.
            if !release_all && !tail.is_empty() {
                tail.push_str(&st.buffer[st.buffer.trim_end().len()..]);
            }
            st.buffer = tail;
        }
        st.open_formatting = check_open_formatting(&st.buffer);
    }

    /// Sets the pending flag and wakes the flusher when it is idle. Caller holds the lock.
    fn mark_dirty(&self, st: &mut RenderState) {
        st.has_pending_update = true;
        if !st.is_flushing {
            self.notify.notify_one();
        }
    }
}

async fn edit_tolerant(bot: &dyn Bot, message: &SentMessage, text: &str) -> Result<()> {
    match bot.edit_message(message, text).await {
        Err(e) if is_message_not_modified_error(&e.to_string()) => {
            debug!(message_id = message.message_id, "Edit skipped: message not modified");
            Ok(())
        }
        other => other,
    }
}

async fn write_plan(bot: &dyn Bot, plan: FlushPlan) -> Result<(usize, Option<SentMessage>, SentMessage)> {
    let FlushPlan {
        segments,
        live,
        mut current,
        mut last,
    } = plan;
    let written = segments.len();

    for segment in segments {
        match current.take() {
            Some(msg) => {
                edit_tolerant(bot, &msg, &segment).await?;
                last = msg;
            }
            None => {
                last = bot
                    .send_message(last.channel_id, &segment, Some(last.message_id))
                    .await?;
            }
        }
    }

    match current {
        Some(msg) => edit_tolerant(bot, &msg, &live).await?,
        None => {
            let sent = bot
                .send_message(last.channel_id, &live, Some(last.message_id))
                .await?;
            current = Some(sent);
            last = sent;
        }
    }
    Ok((written, current, last))
}

async fn run_flusher(shared: Arc<Shared>, bot: Arc<dyn Bot>) -> Result<()> {
    loop {
        let plan = {
            let mut st = shared.state.lock().await;
            if st.has_pending_update {
                st.has_pending_update = false;
                st.is_flushing = true;
                Some(shared.plan(&st))
            } else {
                st.is_flushing = false;
                if st.closing {
                    return Ok(());
                }
                None
            }
        };

        let Some(plan) = plan else {
            shared.notify.notified().await;
            continue;
        };

        let (written, current, last) = write_plan(bot.as_ref(), plan).await?;

        let mut st = shared.state.lock().await;
        st.active_segment_index += written;
        st.current = current;
        st.last = last;
        if st.phase == RenderPhase::Flushing && st.active_segment_index == st.segments.len() {
            st.phase = RenderPhase::Streaming;
        }
    }
}

/// Live rendering of one streamed model turn.
pub struct RenderJob {
    shared: Arc<Shared>,
    flusher: JoinHandle<Result<()>>,
}

impl RenderJob {
    /// Sends the thinking placeholder as a reply to `source` and starts the flusher.
    #[instrument(skip(bot, options), fields(channel_id = source.channel_id, source_id = source.message_id))]
    pub async fn start(bot: Arc<dyn Bot>, source: SentMessage, options: RenderOptions) -> Result<Self> {
        let started = Instant::now();
        let started_unix = chrono::Utc::now().timestamp();
        let placeholder_text = format::thinking_message(
            &options.footer,
            &options.model,
            started_unix,
            &options.thinking_text,
            "",
        );
        if let Err(e) = bot.broadcast_typing(source.channel_id).await {
            debug!(error = %e, "Typing indicator failed");
        }
        let placeholder = bot
            .send_message(source.channel_id, &placeholder_text, Some(source.message_id))
            .await?;
        info!(placeholder_id = placeholder.message_id, "step: render started");

        let state = RenderState {
            phase: RenderPhase::Thinking,
            buffer: String::new(),
            pending_raw: String::new(),
            full_text: String::new(),
            segments: Vec::new(),
            active_segment_index: 0,
            open_formatting: OpenFormatting::default(),
            reasoning: String::new(),
            has_pending_update: false,
            is_flushing: false,
            completed: false,
            closing: false,
            current: Some(placeholder),
            last: placeholder,
            usage: None,
            context_count: None,
        };
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            notify: Notify::new(),
            body_budget: body_budget(&options, started_unix),
            options,
            started,
            started_unix,
        });
        let flusher = tokio::spawn(run_flusher(Arc::clone(&shared), bot));
        Ok(Self { shared, flusher })
    }

    pub async fn push_reasoning(&self, delta: &str) {
        let mut st = self.shared.state.lock().await;
        st.reasoning.push_str(delta);
        if st.phase == RenderPhase::Thinking {
            self.shared.mark_dirty(&mut st);
        }
    }

    /// A new reasoning summary part started.
    pub async fn reasoning_part_added(&self) {
        let mut st = self.shared.state.lock().await;
        if !st.reasoning.is_empty() {
            st.reasoning.push(' ');
        }
    }

    pub async fn push_text(&self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        let mut st = self.shared.state.lock().await;
        st.full_text.push_str(delta);
        st.pending_raw.push_str(delta);
        if st.phase == RenderPhase::Thinking {
            st.phase = RenderPhase::Streaming;
        }
        self.shared.absorb(&mut st, false);
        self.shared.mark_dirty(&mut st);
    }

    pub async fn set_usage(&self, usage: TokenUsage) {
        let mut st = self.shared.state.lock().await;
        st.usage = Some(usage);
    }

    /// Number of history turns sent as context; shown in the final footer.
    pub async fn set_context_count(&self, count: usize) {
        let mut st = self.shared.state.lock().await;
        st.context_count = Some(count);
    }

    /// Upstream signalled the end of output text.
    pub async fn complete(&self) {
        let mut st = self.shared.state.lock().await;
        self.shared.absorb(&mut st, true);
        st.completed = true;
        self.shared.mark_dirty(&mut st);
    }

    pub async fn phase(&self) -> RenderPhase {
        self.shared.state.lock().await.phase
    }

    /// True once the flusher stopped early because a send or edit failed.
    pub fn has_failed(&self) -> bool {
        self.flusher.is_finished()
    }

    /// Writes the final state, waits for the flusher and returns the full streamed text.
    /// A send/edit failure of any flush is returned here.
    pub async fn finish(self) -> Result<String> {
        {
            let mut st = self.shared.state.lock().await;
            if !st.completed {
                warn!("Stream ended without a done event");
                self.shared.absorb(&mut st, true);
                st.completed = true;
            }
            st.closing = true;
            self.shared.mark_dirty(&mut st);
        }

        self.flusher
            .await
            .map_err(|e| DbotError::Bot(format!("Render task failed: {}", e)))??;

        let mut st = self.shared.state.lock().await;
        st.phase = RenderPhase::Done;
        info!(
            segments = st.segments.len(),
            chars = st.full_text.chars().count(),
            "step: render finished"
        );
        Ok(st.full_text.clone())
    }
}
