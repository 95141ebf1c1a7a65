//! Scripted [`llm_client::LlmClient`] for integration tests.
//!
//! Completions pop from a queue (falling back to a fixed reply), streams replay a
//! fixed event list. Every request is recorded; an optional delay simulates a slow
//! model so tests can overlap triggers with an in-flight call, and the first calls can
//! be made to fail.

use async_trait::async_trait;
use llm_client::{
    CompletionRequest, CompletionResponse, ConversationTurn, EventStream, LlmClient, StreamEvent,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct MockLlm {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    stream_events: Vec<StreamEvent>,
    delay: Option<Duration>,
    failures: AtomicUsize,
    failure_message: String,
    requests: Mutex<Vec<CompletionRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLlm {
    /// Answers every completion with `reply`.
    pub fn replying(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply.to_string(),
            stream_events: Vec::new(),
            delay: None,
            failures: AtomicUsize::new(0),
            failure_message: String::new(),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Streams `events` for every streaming request.
    pub fn streaming(events: Vec<StreamEvent>) -> Self {
        Self {
            stream_events: events,
            ..Self::replying("")
        }
    }

    /// Queues replies used before the fallback.
    pub fn with_replies(self, replies: &[&str]) -> Self {
        self.replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| r.to_string()));
        self
    }

    /// The next `count` requests fail with `message`.
    pub fn failing_first(mut self, count: usize, message: &str) -> Self {
        self.failures = AtomicUsize::new(count);
        self.failure_message = message.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, request: CompletionRequest) {
        self.requests.lock().unwrap().push(request);
    }

    /// Consumes one scripted failure, if any are left.
    fn take_failure(&self) -> Option<anyhow::Error> {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| anyhow::anyhow!(self.failure_message.clone()))
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn create_completion(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        self.record(request);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Ok(CompletionResponse {
            output: vec![ConversationTurn::assistant_text(text.clone())],
            output_text: text,
            usage: None,
        })
    }

    async fn create_streaming_completion(&self, request: CompletionRequest) -> anyhow::Result<EventStream> {
        self.record(request);
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let events: Vec<anyhow::Result<StreamEvent>> =
            self.stream_events.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
