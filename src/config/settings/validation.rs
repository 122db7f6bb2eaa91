// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{BizdeskError, Result};
use crate::llm::provider::ProviderKind;

use super::{HostedProviderConfig, Settings};

impl Settings {
    fn hosted(&self, kind: ProviderKind) -> Option<&HostedProviderConfig> {
        match kind {
            ProviderKind::Ollama => None,
            ProviderKind::OpenAi => Some(&self.providers.openai),
            ProviderKind::Gemini => Some(&self.providers.gemini),
            ProviderKind::Anthropic => Some(&self.providers.anthropic),
        }
    }

    /// Get the API key for a provider, checking the env var first.
    pub fn get_api_key(&self, kind: ProviderKind) -> Option<String> {
        let config = self.hosted(kind)?;
        // Priority: env var > config file.
        let from_env = if config.api_key_env.is_empty() {
            None
        } else {
            std::env::var(&config.api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty())
        };
        from_env.or_else(|| {
            config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty())
        })
    }

    /// Base URL override for a provider, if any.
    pub fn get_base_url(&self, kind: ProviderKind) -> Option<String> {
        match kind {
            ProviderKind::Ollama => Some(self.providers.ollama.base_url.clone()),
            other => self.hosted(other).and_then(|c| c.base_url.clone()),
        }
    }

    /// Name of the env var consulted for a provider's key.
    pub fn api_key_env(&self, kind: ProviderKind) -> Option<&str> {
        self.hosted(kind)
            .map(|c| c.api_key_env.as_str())
            .filter(|env| !env.is_empty())
    }

    /// Check if the given provider has a usable configuration.
    pub fn is_provider_configured(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Ollama => true,
            other => self.get_api_key(other).is_some(),
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.engine.history_window == 0 {
            return Err(BizdeskError::Config(
                "engine.history_window must be at least 1".to_string(),
            ));
        }
        if self.engine.request_timeout_secs == 0 {
            return Err(BizdeskError::Config(
                "engine.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.engine.content_tool.trim().is_empty() {
            return Err(BizdeskError::Config(
                "engine.content_tool must name a tool".to_string(),
            ));
        }
        Ok(())
    }
}
