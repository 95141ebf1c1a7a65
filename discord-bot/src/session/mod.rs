//! Per-channel conversation session.
//!
//! Owns the rolling history and activation counters of one channel. In chat mode
//! incoming messages are appended and a trailing-edge debounce timer coalesces bursts
//! into one model call; at most one call is in flight and triggers arriving meanwhile
//! produce exactly one follow-up. In assistant mode every message gets an immediate
//! streamed answer, serialized by the invocation lock.
//!
//! The state mutex is never held across network I/O.

mod factory;
pub mod input;

pub use factory::SessionFactory;

use crate::activation::{self, ActivationSignals, ActivationState, Decision};
use crate::core::{
    is_permission_error, Bot, Channel, ChatMode, DbotError, Message, Result, SentMessage, User,
};
use crate::emoji::EmojiTable;
use crate::format::{self, FooterStyle};
use crate::render::{RenderJob, RenderOptions};
use crate::segment::{split_message, MESSAGE_MAX_LENGTH};
use crate::tools::{ToolContext, ToolExecutor};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use llm_client::{
    CompletionRequest, ContentPart, ConversationTurn, LlmClient, Role, StreamEvent,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const DEFAULT_RETENTION_HOURS: i64 = 24;
pub const DEFAULT_MAX_TOOL_PASSES: usize = 3;

/// Immutable per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub mode: ChatMode,
    /// Final system instructions, placeholders already substituted.
    pub instructions: String,
    /// Thinking line template; `{@}` becomes the author mention.
    pub thinking_template: String,
    pub wake_keywords: Vec<String>,
    pub debounce: Duration,
    pub max_length: usize,
    pub history_retention: chrono::Duration,
    pub max_tool_passes: usize,
    pub footer: FooterStyle,
}

impl SessionSettings {
    pub fn new(model: impl Into<String>, mode: ChatMode, instructions: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            mode,
            instructions: instructions.into(),
            thinking_template: "{@} is thinking...".to_string(),
            wake_keywords: Vec::new(),
            debounce: DEFAULT_DEBOUNCE,
            max_length: MESSAGE_MAX_LENGTH,
            history_retention: chrono::Duration::hours(DEFAULT_RETENTION_HOURS),
            max_tool_passes: DEFAULT_MAX_TOOL_PASSES,
            footer: FooterStyle::default(),
        }
    }
}

/// Collaborators shared by all sessions.
#[derive(Clone)]
pub struct SessionDeps {
    pub bot: Arc<dyn Bot>,
    pub llm: Arc<dyn LlmClient>,
    pub tools: Arc<dyn ToolExecutor>,
    pub emojis: Arc<EmojiTable>,
}

/// Options of [`ConversationSession::handle_structured_prompt`].
#[derive(Debug, Clone, Copy)]
pub struct PromptOptions {
    pub activate_chat: bool,
    pub role: Role,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            activate_chat: true,
            role: Role::User,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Trigger {
    message_id: u64,
    author_id: u64,
}

#[derive(Default)]
struct SessionState {
    history: Vec<ConversationTurn>,
    activation: ActivationState,
    processing: bool,
    pending_reprocess: bool,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every reschedule; a timer only fires for its own generation.
    timer_generation: u64,
    last_trigger: Option<Trigger>,
}

pub struct ConversationSession {
    channel: Channel,
    settings: SessionSettings,
    deps: SessionDeps,
    bot_id: u64,
    state: Mutex<SessionState>,
    invocation_lock: Mutex<()>,
}

impl ConversationSession {
    pub fn new(channel: Channel, bot_id: u64, settings: SessionSettings, deps: SessionDeps) -> Self {
        Self {
            channel,
            settings,
            deps,
            bot_id,
            state: Mutex::new(SessionState::default()),
            invocation_lock: Mutex::new(()),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn mode(&self) -> ChatMode {
        self.settings.mode
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Snapshot of the history.
    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.state.lock().await.history.clone()
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }

    pub async fn activation(&self) -> ActivationState {
        self.state.lock().await.activation
    }

    pub async fn is_processing(&self) -> bool {
        self.state.lock().await.processing
    }

    pub async fn has_pending(&self) -> bool {
        self.state.lock().await.pending_reprocess
    }

    /// Appends a turn after purging expired history.
    pub async fn append_turn(&self, turn: ConversationTurn) {
        let mut st = self.state.lock().await;
        self.purge_locked(&mut st, Utc::now());
        st.history.push(turn);
    }

    pub async fn purge_expired_history(&self) -> usize {
        self.purge_expired_history_at(Utc::now()).await
    }

    /// Drops turns older than the retention window relative to `now`. Returns how many
    /// were removed.
    pub async fn purge_expired_history_at(&self, now: DateTime<Utc>) -> usize {
        let mut st = self.state.lock().await;
        self.purge_locked(&mut st, now)
    }

    fn purge_locked(&self, st: &mut SessionState, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.settings.history_retention;
        let before = st.history.len();
        st.history.retain(|t| t.timestamp >= cutoff);
        let purged = before - st.history.len();
        if purged > 0 {
            debug!(channel_id = self.channel.id, purged, "Purged expired history");
        }
        purged
    }

    /// Aborts the pending debounce timer, if any.
    pub async fn cancel_pending(&self) {
        let mut st = self.state.lock().await;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }
        st.timer_generation += 1;
        st.pending_reprocess = false;
    }

    /// Entry point for a user message in this channel.
    #[instrument(skip(self, message), fields(channel_id = self.channel.id, message_id = message.id, mode = %self.settings.mode))]
    pub async fn handle(self: &Arc<Self>, message: &Message) -> Result<()> {
        if self.settings.mode == ChatMode::Assistant {
            if let Err(e) = self.respond_streaming(message).await {
                error!(error = %e, "Streaming response failed");
                self.report_error(&e).await;
            }
            return Ok(());
        }

        let reply_author = self.resolve_reply_author(message).await;
        let Some(turn) = input::build_user_turn(message, reply_author.as_ref()) else {
            debug!("Ignoring empty message");
            return Ok(());
        };
        let signals = ActivationSignals {
            mentions_bot: message.mentions_user(self.bot_id),
            has_wake_keyword: activation::contains_wake_keyword(
                &message.content,
                &self.settings.wake_keywords,
            ),
            replies_to_bot: reply_author.map(|a| a.id == self.bot_id).unwrap_or(false),
        };

        let mut st = self.state.lock().await;
        self.purge_locked(&mut st, Utc::now());
        st.history.push(turn);
        st.last_trigger = Some(Trigger {
            message_id: message.id,
            author_id: message.author.id,
        });
        match st.activation.decide(&signals) {
            Decision::Process(reason) => {
                info!(?reason, "step: message qualifies for a response");
                st.activation.on_processed();
                st.pending_reprocess = true;
            }
            Decision::Buffer => {
                st.activation.on_buffered();
                info!(skipped = st.activation.skipped_count, "Message added to history without response");
            }
        }
        self.schedule_locked(&mut st);
        Ok(())
    }

    /// Appends a system-originated prompt and responds immediately, without debounce.
    /// When a call is already running the prompt is picked up by its follow-up.
    #[instrument(skip(self, payload), fields(channel_id = self.channel.id))]
    pub async fn handle_structured_prompt(self: &Arc<Self>, payload: &Value, options: PromptOptions) -> Result<()> {
        let text = match payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        {
            let mut st = self.state.lock().await;
            self.purge_locked(&mut st, Utc::now());
            st.history
                .push(ConversationTurn::new(options.role, vec![ContentPart::text(text)]));
            if options.activate_chat {
                st.activation.activated = true;
                st.activation.skipped_count = 0;
            }
            if st.processing {
                st.pending_reprocess = true;
                return Ok(());
            }
            st.processing = true;
            st.pending_reprocess = false;
        }
        self.run_invocation(options.activate_chat).await;
        Ok(())
    }

    /// (Re)starts the debounce timer. Caller holds the state lock.
    fn schedule_locked(self: &Arc<Self>, st: &mut SessionState) {
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }
        st.timer_generation += 1;
        let generation = st.timer_generation;
        let delay = self.settings.debounce;
        let session = Arc::clone(self);
        st.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.on_timer(generation).await;
        }));
    }

    async fn on_timer(self: Arc<Self>, generation: u64) {
        {
            let mut st = self.state.lock().await;
            if st.timer_generation != generation {
                return;
            }
            // Detach: a reschedule from here on must not abort this task.
            st.timer = None;
            if !st.pending_reprocess || st.processing {
                return;
            }
            st.processing = true;
            st.pending_reprocess = false;
        }
        self.run_invocation(true).await;
    }

    /// Runs one response cycle. The caller has set `processing`; it is always reset
    /// here, and one follow-up is scheduled when a trigger arrived meanwhile.
    async fn run_invocation(self: &Arc<Self>, activate: bool) {
        if let Err(e) = self.respond_from_history(activate).await {
            error!(channel_id = self.channel.id, error = %e, "Failed to process messages");
            self.report_error(&e).await;
        }
        let mut st = self.state.lock().await;
        st.processing = false;
        if st.pending_reprocess {
            debug!(channel_id = self.channel.id, "Scheduling follow-up invocation");
            self.schedule_locked(&mut st);
        }
    }

    /// Non-streaming completion over the current history with the tool loop; sends the
    /// reply in bounded chunks. Returns the sent text, or `None` when nothing was sent.
    async fn respond_from_history(&self, activate: bool) -> Result<Option<String>> {
        let (mut input, ctx) = {
            let mut st = self.state.lock().await;
            self.purge_locked(&mut st, Utc::now());
            (st.history.clone(), self.tool_context(&st))
        };
        if let Err(e) = self.deps.bot.broadcast_typing(self.channel.id).await {
            debug!(error = %e, "Typing indicator failed");
        }

        let tools = self.deps.tools.definitions();
        let mut text = String::new();
        for pass in 1..=self.settings.max_tool_passes.max(1) {
            let request = CompletionRequest {
                model: self.settings.model.clone(),
                instructions: self.settings.instructions.clone(),
                input: input.clone(),
                tools: tools.clone(),
            };
            let response = self.deps.llm.create_completion(request).await?;
            let calls = response.function_calls();
            text = response.output_text;
            self.extend_history(&response.output).await;
            input.extend(response.output);
            if calls.is_empty() {
                break;
            }

            info!(pass, calls = calls.len(), "step: running tool calls");
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                let output = self.deps.tools.execute(call, &ctx).await;
                results.push(ConversationTurn::tool_result(call.call_id.clone(), output));
            }
            self.extend_history(&results).await;
            input.extend(results);
            if pass == self.settings.max_tool_passes {
                warn!(pass, "Tool pass limit reached; using available text");
            }
        }

        let reply = text.trim();
        info!(chars = reply.chars().count(), "Got chat response");
        if reply.is_empty() {
            return Ok(None);
        }
        if activation::is_skip_sentinel(reply) {
            self.state.lock().await.activation.on_skip();
            info!("Response was [skip], not sending message");
            return Ok(None);
        }
        self.state.lock().await.activation.on_reply(activate);

        let rendered = self.deps.emojis.substitute(reply);
        for chunk in split_message(&rendered, self.settings.max_length) {
            match self.deps.bot.send_message(self.channel.id, &chunk, None).await {
                Ok(_) => {}
                Err(e) if is_permission(&e) => {
                    warn!(channel_id = self.channel.id, error = %e, "Missing permission to send; skipping");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Some(rendered))
    }

    /// Assistant mode: one streamed answer per message, serialized per session.
    async fn respond_streaming(&self, message: &Message) -> Result<()> {
        let _invocation = self.invocation_lock.lock().await;
        let reply_author = self.resolve_reply_author(message).await;
        let Some(turn) = input::build_user_turn(message, reply_author.as_ref()) else {
            debug!("Ignoring empty message");
            return Ok(());
        };
        let input = {
            let mut st = self.state.lock().await;
            self.purge_locked(&mut st, Utc::now());
            st.history.push(turn);
            st.processing = true;
            st.history.clone()
        };

        let result = self.stream_reply(message, input).await;
        let mut st = self.state.lock().await;
        st.processing = false;
        let text = result?;
        if !text.trim().is_empty() {
            st.history.push(ConversationTurn::assistant_text(text));
        }
        Ok(())
    }

    async fn stream_reply(&self, message: &Message, input: Vec<ConversationTurn>) -> Result<String> {
        let mut options = RenderOptions::new(
            self.settings.model.clone(),
            prompt::render_thinking(&self.settings.thinking_template, &message.author.mention()),
        );
        options.max_length = self.settings.max_length;
        options.footer = self.settings.footer.clone();
        options.emojis = Arc::clone(&self.deps.emojis);

        let source = SentMessage {
            channel_id: message.channel.id,
            message_id: message.id,
        };
        let context_count = input.len();
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            instructions: self.settings.instructions.clone(),
            input,
            tools: Vec::new(),
        };

        let job = RenderJob::start(Arc::clone(&self.deps.bot), source, options).await?;
        job.set_context_count(context_count).await;
        let streamed = self.pump(&job, request).await;
        let finished = job.finish().await;
        streamed?;
        finished
    }

    async fn pump(&self, job: &RenderJob, request: CompletionRequest) -> Result<()> {
        let mut stream = self.deps.llm.create_streaming_completion(request).await?;
        while let Some(event) = stream.next().await {
            if job.has_failed() {
                warn!("Renderer stopped; abandoning stream");
                break;
            }
            match event? {
                StreamEvent::ReasoningDelta(delta) => job.push_reasoning(&delta).await,
                StreamEvent::ReasoningPartAdded => job.reasoning_part_added().await,
                StreamEvent::OutputTextDelta(delta) => job.push_text(&delta).await,
                StreamEvent::OutputTextDone(_) => job.complete().await,
                StreamEvent::Usage(usage) => job.set_usage(usage).await,
                StreamEvent::FunctionCall(call) => {
                    debug!(tool = %call.name, "Ignoring function call in streamed reply");
                }
            }
        }
        Ok(())
    }

    async fn extend_history(&self, turns: &[ConversationTurn]) {
        if turns.is_empty() {
            return;
        }
        let now = Utc::now();
        let mut st = self.state.lock().await;
        st.history.extend(turns.iter().cloned().map(|t| t.at(now)));
    }

    fn tool_context(&self, st: &SessionState) -> ToolContext {
        ToolContext {
            channel: self.channel.clone(),
            message_id: st.last_trigger.map(|t| t.message_id),
            author_id: st.last_trigger.map(|t| t.author_id),
        }
    }

    async fn resolve_reply_author(&self, message: &Message) -> Option<User> {
        let reply = message.reply_to.as_ref()?;
        if let Some(author) = &reply.author {
            return Some(author.clone());
        }
        match self
            .deps
            .bot
            .fetch_message(message.channel.id, reply.message_id)
            .await
        {
            Ok(meta) => Some(meta.author),
            Err(e) => {
                debug!(error = %e, reply_to = reply.message_id, "Could not fetch replied message");
                None
            }
        }
    }

    /// Posts the error notice to the channel; permission failures are only logged.
    async fn report_error(&self, err: &DbotError) {
        if is_permission(err) {
            warn!(channel_id = self.channel.id, error = %err, "Missing permission; not reporting to channel");
            return;
        }
        let notice = format::error_message(err);
        if let Err(e) = self.deps.bot.send_message(self.channel.id, &notice, None).await {
            warn!(channel_id = self.channel.id, error = %e, "Failed to report error to channel");
        }
    }
}

fn is_permission(err: &DbotError) -> bool {
    matches!(err, DbotError::Permission(_)) || is_permission_error(&err.to_string())
}
