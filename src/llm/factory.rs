// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider factory for creating model backends
//!
//! Resolves credentials from the settings (env var first) and builds the
//! matching provider for a model selection.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{ApiError, BizdeskError, Result};
use crate::llm::backend::{BackendResolver, ModelBackend};
use crate::llm::provider::{LlmProvider, ModelSelection, ProviderKind};
use crate::llm::providers::{AnthropicProvider, GeminiProvider, OllamaProvider, OpenAiProvider};

/// Settings-backed backend resolver
pub struct ProviderFactory {
    settings: Settings,
}

impl ProviderFactory {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Create a provider for the given backend kind
    pub fn create(kind: ProviderKind, settings: &Settings) -> Result<Arc<dyn LlmProvider>> {
        match kind {
            ProviderKind::Ollama => Ok(Self::create_ollama(settings)),
            ProviderKind::OpenAi => {
                let key = Self::require_key(kind, settings)?;
                Ok(Arc::new(match settings.get_base_url(kind) {
                    Some(url) => OpenAiProvider::with_base_url(key, url),
                    None => OpenAiProvider::new(key),
                }))
            }
            ProviderKind::Gemini => {
                let key = Self::require_key(kind, settings)?;
                Ok(Arc::new(match settings.get_base_url(kind) {
                    Some(url) => GeminiProvider::with_base_url(key, url),
                    None => GeminiProvider::new(key),
                }))
            }
            ProviderKind::Anthropic => {
                let key = Self::require_key(kind, settings)?;
                Ok(Arc::new(match settings.get_base_url(kind) {
                    Some(url) => AnthropicProvider::with_base_url(key, url),
                    None => AnthropicProvider::new(key),
                }))
            }
        }
    }

    /// Create an Ollama provider
    pub fn create_ollama(settings: &Settings) -> Arc<dyn LlmProvider> {
        Arc::new(OllamaProvider::with_base_url(
            settings.providers.ollama.base_url.clone(),
        ))
    }

    fn require_key(kind: ProviderKind, settings: &Settings) -> Result<String> {
        settings
            .get_api_key(kind)
            .ok_or_else(|| missing_credential(kind, settings))
    }
}

fn missing_credential(kind: ProviderKind, settings: &Settings) -> BizdeskError {
    let env = settings.api_key_env(kind).unwrap_or("(none)");
    let setup = format!(
        "設定方法:\n1. 環境変数 {env} にAPIキーを設定する\n2. または {path} の providers.{name}.api_key に設定する\n\n設定後、もう一度お試しください。",
        env = env,
        path = Settings::default_path().display(),
        name = kind.as_str(),
    );
    BizdeskError::Api(ApiError::ConfigurationMissing {
        provider: kind.display_name().to_string(),
        setup,
    })
}

impl BackendResolver for ProviderFactory {
    fn resolve(&self, selection: &ModelSelection) -> Result<ModelBackend> {
        let provider = Self::create(selection.provider, &self.settings)?;
        tracing::debug!(
            target: "bizdesk.llm",
            provider = selection.provider.as_str(),
            model = %selection.model,
            "resolved backend"
        );
        Ok(ModelBackend::new(provider, &selection.model)
            .with_timeout(Duration::from_secs(self.settings.engine.request_timeout_secs))
            .with_max_tokens(self.settings.defaults.max_tokens)
            .with_temperature(self.settings.defaults.temperature))
    }
}
