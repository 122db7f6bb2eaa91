// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for bizdesk
//!
//! Every failure inside a turn ends up as one of these variants and is turned
//! into a single assistant-visible message by the turn controller.

use thiserror::Error;

/// Main error type for bizdesk operations
#[derive(Error, Debug)]
pub enum BizdeskError {
    /// Model backend errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A directive named a tool the registry does not know
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A directive named a tool the active agent may not use
    #[error("Tool not allowed for the active agent: {0}")]
    ToolNotAllowed(String),

    /// A directive body could not be parsed
    #[error("Malformed directive: {0}")]
    MalformedDirective(String),

    /// A tool ran and failed
    #[error("Tool {tool} failed: {message}")]
    ToolExecutionFailed {
        tool: String,
        identifiers: Vec<(String, String)>,
        message: String,
    },

    /// Backing store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Model backend error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// No credential available for the selected provider
    #[error("No credential configured for {provider}")]
    ConfigurationMissing { provider: String, setup: String },

    /// The call did not finish within the configured bound
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Non-2xx status or an undecodable payload
    #[error("Backend rejected the request{}: {payload}", status_suffix(.status))]
    BackendRejected {
        status: Option<u16>,
        payload: String,
    },

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

/// Result type alias for bizdesk operations
pub type Result<T> = std::result::Result<T, BizdeskError>;

impl BizdeskError {
    /// Shorthand for a rejected payload that failed to decode.
    pub fn malformed_payload(payload: impl Into<String>) -> Self {
        BizdeskError::Api(ApiError::BackendRejected {
            status: None,
            payload: payload.into(),
        })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BizdeskError::Api(ApiError::Timeout(_)))
    }

    pub fn is_configuration_missing(&self) -> bool {
        matches!(self, BizdeskError::Api(ApiError::ConfigurationMissing { .. }))
    }

    pub fn is_backend_rejected(&self) -> bool {
        matches!(self, BizdeskError::Api(ApiError::BackendRejected { .. }))
    }

    /// Render the message shown in place of the loading placeholder.
    pub fn user_message(&self) -> String {
        match self {
            BizdeskError::Api(ApiError::ConfigurationMissing { provider, setup }) => {
                format!("❌ {}のAPIキーが設定されていません。\n\n{}", provider, setup)
            }
            BizdeskError::Api(ApiError::Timeout(secs)) => format!(
                "❌ リクエストがタイムアウトしました（{}秒）。入力を短くして再度お試しください。",
                secs
            ),
            BizdeskError::Api(ApiError::BackendRejected { status, payload }) => match status {
                Some(code) => format!("❌ モデルAPIエラー (HTTP {}):\n\n{}", code, payload),
                None => format!("❌ モデルAPIの応答を解釈できませんでした:\n\n{}", payload),
            },
            BizdeskError::ToolExecutionFailed {
                tool,
                identifiers,
                message,
            } => {
                let mut out = format!("❌ Tool \"{}\" の実行に失敗しました。\n\n詳細: {}", tool, message);
                if !identifiers.is_empty() {
                    out.push('\n');
                    for (key, value) in identifiers {
                        out.push_str(&format!("\n{}: {}", key, value));
                    }
                }
                out
            }
            other => format!("❌ エラーが発生しました: {}", other),
        }
    }
}
