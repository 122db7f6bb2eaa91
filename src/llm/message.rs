// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt messages sent to model backends
//!
//! Callers only ever use the uniform role vocabulary below; providers map it
//! to whatever their wire format expects.

use serde::{Deserialize, Serialize};

/// Role of a prompt message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single `{role, content}` entry of a backend request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Split leading system content from the conversational messages.
///
/// All system messages are joined with blank lines regardless of position.
pub fn split_system(messages: &[PromptMessage]) -> (Option<String>, Vec<PromptMessage>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let rest = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();
    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(PromptMessage::system("s").role, Role::System);
        assert_eq!(PromptMessage::user("u").role, Role::User);
        assert_eq!(PromptMessage::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&PromptMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_split_system() {
        let messages = vec![
            PromptMessage::system("one"),
            PromptMessage::user("q"),
            PromptMessage::system("two"),
        ];
        let (system, rest) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("one\n\ntwo"));
        assert_eq!(rest, vec![PromptMessage::user("q")]);
    }

    #[test]
    fn test_split_system_none() {
        let (system, rest) = split_system(&[PromptMessage::user("q")]);
        assert!(system.is_none());
        assert_eq!(rest.len(), 1);
    }
}
