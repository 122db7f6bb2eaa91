// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Agents
//!
//! An agent bundles a system prompt fragment, an allowed tool subset and a
//! backend preference. Agents are read-only configuration; selecting one is
//! a session operation.

pub mod builtin;

pub use builtin::{builtin_agents, find_builtin, MEETING_NOTE_AGENT, ORGANIZATION_CREATION_AGENT};

use serde::{Deserialize, Serialize};

use crate::llm::provider::ModelSelection;

/// A named assistant configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub system_prompt_fragment: String,
    #[serde(default)]
    pub backend_preference: Option<ModelSelection>,
    /// Extra line shown after the selection announcement
    #[serde(default)]
    pub usage_hint: Option<String>,
}

impl Agent {
    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Announcement appended when the agent is selected
    pub fn announcement(&self) -> String {
        let mut text = format!(
            "🤖 **Agentが選択されました: {}**\n\n{}",
            self.name, self.description
        );
        if let Some(hint) = &self.usage_hint {
            text.push_str("\n\n");
            text.push_str(hint);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announcement_includes_hint() {
        let agent = find_builtin(MEETING_NOTE_AGENT).unwrap();
        let text = agent.announcement();
        assert!(text.starts_with("🤖 **Agentが選択されました: 議事録編集Agent**"));
        assert!(text.contains("議事録ID"));
    }

    #[test]
    fn test_allows() {
        let agent = find_builtin(ORGANIZATION_CREATION_AGENT).unwrap();
        assert!(agent.allows("create_organization"));
        assert!(!agent.allows("format_meeting_note_content"));
    }

    #[test]
    fn test_agent_json_round_trip_fields() {
        let json = r#"{"id": "x", "name": "X", "description": "d", "allowedTools": ["a"]}"#;
        let agent: Agent = serde_json::from_str(json).unwrap();
        assert!(agent.allows("a"));
        assert!(agent.backend_preference.is_none());
        assert!(agent.capabilities.is_empty());
    }
}
