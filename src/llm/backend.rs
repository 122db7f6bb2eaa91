// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Uniform backend contract used by the rest of the engine
//!
//! `ModelBackend` bounds every provider call with a timeout. Dropping the
//! timed-out future cancels the in-flight request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ApiError, Result};
use crate::llm::message::PromptMessage;
use crate::llm::provider::{
    CompletionRequest, LlmProvider, ModelSelection, ToolCall, ToolDefinition,
};

/// Default bound for a single backend call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Text reply plus any typed tool calls
#[derive(Debug, Clone, Default)]
pub struct BackendReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// A provider bound to a model and call limits
#[derive(Clone)]
pub struct ModelBackend {
    provider: Arc<dyn LlmProvider>,
    model: String,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl ModelBackend {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_tokens: 2000,
            temperature: 0.7,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn supports_native_tools(&self) -> bool {
        self.provider.supports_native_tools()
    }

    /// `complete(messages) -> text`
    pub async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        Ok(self.complete_with_tools(messages, Vec::new()).await?.text)
    }

    /// Complete, offering tool schemas when the provider takes them.
    pub async fn complete_with_tools(
        &self,
        messages: &[PromptMessage],
        tools: Vec<ToolDefinition>,
    ) -> Result<BackendReply> {
        let tools = if self.provider.supports_native_tools() {
            tools
        } else {
            Vec::new()
        };
        let request = CompletionRequest::new(&self.model, messages.to_vec())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_tools(tools);

        let started = Instant::now();
        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => {
                tracing::debug!(
                    target: "bizdesk.llm",
                    provider = self.provider.name(),
                    model = %self.model,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    output_tokens = response.usage.output_tokens,
                    tool_calls = response.tool_calls.len(),
                    "backend call completed"
                );
                Ok(BackendReply {
                    text: response.text,
                    tool_calls: response.tool_calls,
                })
            }
            Ok(Err(err)) => {
                tracing::debug!(
                    target: "bizdesk.llm",
                    provider = self.provider.name(),
                    model = %self.model,
                    error = %err,
                    "backend call failed"
                );
                Err(err)
            }
            Err(_) => {
                tracing::warn!(
                    target: "bizdesk.llm",
                    provider = self.provider.name(),
                    model = %self.model,
                    timeout_secs = self.timeout.as_secs(),
                    "backend call timed out"
                );
                Err(ApiError::Timeout(self.timeout.as_secs()).into())
            }
        }
    }
}

/// Maps a model selection to a ready backend
pub trait BackendResolver: Send + Sync {
    fn resolve(&self, selection: &ModelSelection) -> Result<ModelBackend>;
}

/// Resolver that always uses one provider, keeping the selected model name
pub struct FixedBackendResolver {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl FixedBackendResolver {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl BackendResolver for FixedBackendResolver {
    fn resolve(&self, selection: &ModelSelection) -> Result<ModelBackend> {
        Ok(ModelBackend::new(self.provider.clone(), &selection.model).with_timeout(self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock_provider::{MockProvider, MockReply};
    use crate::llm::provider::ProviderKind;

    #[tokio::test]
    async fn test_complete_returns_text() {
        let provider = Arc::new(MockProvider::with_texts(["hello"]));
        let backend = ModelBackend::new(provider.clone(), "gpt-5-mini");
        let text = backend
            .complete(&[PromptMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(text, "hello");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.recorded_requests()[0].model, "gpt-5-mini");
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let provider = Arc::new(
            MockProvider::with_replies(vec![MockReply::text("late")])
                .with_delay(Duration::from_millis(500)),
        );
        let backend = ModelBackend::new(provider, "m").with_timeout(Duration::from_millis(20));
        let err = backend
            .complete(&[PromptMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_tools_dropped_for_text_only_provider() {
        let provider = Arc::new(MockProvider::with_texts(["ok"]));
        let backend = ModelBackend::new(provider.clone(), "m");
        let tool = ToolDefinition {
            name: "t".to_string(),
            description: "d".to_string(),
            input_schema: crate::llm::provider::ToolInputSchema {
                schema_type: "object".to_string(),
                properties: serde_json::json!({}),
                required: vec![],
            },
        };
        backend
            .complete_with_tools(&[PromptMessage::user("hi")], vec![tool])
            .await
            .unwrap();
        assert!(provider.recorded_requests()[0].tools.is_empty());
    }

    #[test]
    fn test_fixed_resolver_keeps_model() {
        let resolver = FixedBackendResolver::new(Arc::new(MockProvider::new()));
        let backend = resolver
            .resolve(&ModelSelection::new(ProviderKind::Gemini, "gemini-2.5-pro"))
            .unwrap();
        assert_eq!(backend.model(), "gemini-2.5-pro");
        assert_eq!(backend.provider_name(), "mock");
    }
}
