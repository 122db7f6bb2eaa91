// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for bizdesk
//!
//! Handles loading and saving settings from ~/.bizdesk/settings.json

use serde::{Deserialize, Serialize};

mod io;
mod validation;

/// Main settings structure, stored in ~/.bizdesk/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Model backend configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default model selection for new sessions
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Turn engine tunables
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Configuration for model backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Local Ollama server
    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default = "HostedProviderConfig::openai")]
    pub openai: HostedProviderConfig,

    #[serde(default = "HostedProviderConfig::gemini")]
    pub gemini: HostedProviderConfig,

    #[serde(default = "HostedProviderConfig::anthropic")]
    pub anthropic: HostedProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            openai: HostedProviderConfig::openai(),
            gemini: HostedProviderConfig::gemini(),
            anthropic: HostedProviderConfig::anthropic(),
        }
    }
}

/// Ollama configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

/// Configuration shared by the credentialed providers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostedProviderConfig {
    /// API key stored in the settings file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable checked before `api_key`
    #[serde(default)]
    pub api_key_env: String,

    /// Base URL override (proxies and tests)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl HostedProviderConfig {
    fn with_env(env: &str) -> Self {
        Self {
            api_key: None,
            api_key_env: env.to_string(),
            base_url: None,
        }
    }

    pub fn openai() -> Self {
        Self::with_env("OPENAI_API_KEY")
    }

    pub fn gemini() -> Self {
        Self::with_env("GEMINI_API_KEY")
    }

    pub fn anthropic() -> Self {
        Self::with_env("ANTHROPIC_API_KEY")
    }
}

/// Default model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Model name; the provider is inferred from it
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.7
}

/// Turn engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of prior messages sent to the backend
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Upper bound for a single backend call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Tool that receives the utterance when its content argument is omitted
    #[serde(default = "default_content_tool")]
    pub content_tool: String,

    #[serde(default = "default_content_argument")]
    pub content_argument: String,

    /// Send tool schemas to backends that support typed function calls
    #[serde(default = "default_true")]
    pub native_tool_calls: bool,

    /// Remaining characters after stripping ids for an utterance to count as content
    #[serde(default = "default_inline_content_min_chars")]
    pub inline_content_min_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            request_timeout_secs: default_request_timeout_secs(),
            content_tool: default_content_tool(),
            content_argument: default_content_argument(),
            native_tool_calls: default_true(),
            inline_content_min_chars: default_inline_content_min_chars(),
        }
    }
}

fn default_history_window() -> usize {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_content_tool() -> String {
    "format_meeting_note_content".to_string()
}

fn default_content_argument() -> String {
    "rawContent".to_string()
}

fn default_true() -> bool {
    true
}

fn default_inline_content_min_chars() -> usize {
    20
}
