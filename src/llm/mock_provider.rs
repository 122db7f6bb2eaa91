// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Replays scripted replies in order and records every request so tests can
//! count backend calls and inspect prompts. The CLI uses it for offline runs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{ApiError, BizdeskError, Result};
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider, ToolCall, Usage};

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    replies: Arc<Mutex<Vec<MockReply>>>,
    call_count: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Option<Duration>,
    native_tools: bool,
}

/// A scripted reply
#[derive(Clone, Debug, Default)]
pub struct MockReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub failure: Option<MockFailure>,
}

/// Scripted failure kinds
#[derive(Clone, Debug)]
pub enum MockFailure {
    Timeout(u64),
    Rejected { status: u16, payload: String },
    ConfigurationMissing(String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool_calls: vec![ToolCall {
                name: name.into(),
                arguments,
            }],
            ..Default::default()
        }
    }

    pub fn failure(failure: MockFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Default::default()
        }
    }
}

impl MockFailure {
    fn into_error(self) -> BizdeskError {
        match self {
            MockFailure::Timeout(secs) => ApiError::Timeout(secs).into(),
            MockFailure::Rejected { status, payload } => ApiError::BackendRejected {
                status: Some(status),
                payload,
            }
            .into(),
            MockFailure::ConfigurationMissing(provider) => ApiError::ConfigurationMissing {
                setup: format!("Configure an API key for {}.", provider),
                provider,
            }
            .into(),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockProvider {
    /// Create a mock provider answering "Mock response"
    pub fn new() -> Self {
        Self::with_replies(vec![MockReply::text("Mock response")])
    }

    /// Queue replies (returned in order, the last one repeats)
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            name: "mock".to_string(),
            replies: Arc::new(Mutex::new(replies)),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
            delay: None,
            native_tools: false,
        }
    }

    /// Queue plain text replies
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_replies(texts.into_iter().map(MockReply::text).collect())
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Advertise native tool support
    pub fn with_native_tools(mut self) -> Self {
        self.native_tools = true;
        self
    }

    /// Append a reply to the script
    pub fn push_reply(&self, reply: MockReply) {
        lock(&self.replies).push(reply);
    }

    /// Get the number of times complete() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        lock(&self.recorded_requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    fn next_reply(&self) -> MockReply {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let replies = lock(&self.replies);
        if replies.is_empty() {
            MockReply::text("Mock response")
        } else {
            replies[count.min(replies.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_native_tools(&self) -> bool {
        self.native_tools
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        lock(&self.recorded_requests).push(request.clone());
        let reply = self.next_reply();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = reply.failure {
            return Err(failure.into_error());
        }

        Ok(CompletionResponse {
            model: request.model,
            usage: Usage {
                input_tokens: 10,
                output_tokens: (reply.text.len() / 4).max(1) as u32,
            },
            text: reply.text,
            tool_calls: reply.tool_calls,
        })
    }
}
