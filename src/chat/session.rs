// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session state
//!
//! One mutable record per conversation. The turn controller owns it and is
//! the only writer; everything else receives shared references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::Agent;
use crate::llm::provider::ModelSelection;

use super::confirmation::ConfirmationState;

/// Placeholder text shown while a turn is in flight
pub const LOADING_TEXT: &str = "考え中...";

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// What a message is used for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Conversation,
    /// Transient placeholder replaced when the turn resolves
    Loading,
    /// Shown when an agent is selected
    AgentAnnouncement,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub kind: MessageKind,
}

impl Message {
    fn new(role: ChatRole, content: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content, MessageKind::Conversation)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content, MessageKind::Conversation)
    }

    pub fn loading() -> Self {
        Self::new(ChatRole::Assistant, LOADING_TEXT, MessageKind::Loading)
    }

    pub fn announcement(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content, MessageKind::AgentAnnouncement)
    }

    pub fn is_loading(&self) -> bool {
        self.kind == MessageKind::Loading
    }

    /// Whether the message belongs in backend history
    pub fn is_conversation(&self) -> bool {
        self.kind == MessageKind::Conversation
    }
}

/// Identifiers that persist across turns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyIds {
    pub meeting_note_id: Option<String>,
    pub item_id: Option<String>,
}

impl StickyIds {
    pub fn is_empty(&self) -> bool {
        self.meeting_note_id.is_none() && self.item_id.is_none()
    }
}

/// Bindings supplied by the page the chat is opened on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    /// Route path, optionally with a query string
    pub path: String,
    pub meeting_note_id: Option<String>,
    pub organization_id: Option<String>,
}

impl PageContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_meeting_note(mut self, id: impl Into<String>) -> Self {
        self.meeting_note_id = Some(id.into());
        self
    }

    pub fn with_organization(mut self, id: impl Into<String>) -> Self {
        self.organization_id = Some(id.into());
        self
    }
}

/// Per-conversation state
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub(crate) messages: Vec<Message>,
    pub(crate) sticky: StickyIds,
    pub(crate) active_agent: Option<Agent>,
    pub(crate) page: PageContext,
    pub(crate) confirmation: ConfirmationState,
    pub(crate) model_selection: ModelSelection,
    /// Selection used when no agent overrides it
    pub(crate) default_selection: ModelSelection,
}

impl Session {
    pub fn new(model_selection: ModelSelection) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            sticky: StickyIds::default(),
            active_agent: None,
            page: PageContext::default(),
            confirmation: ConfirmationState::Idle,
            default_selection: model_selection.clone(),
            model_selection,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn sticky(&self) -> &StickyIds {
        &self.sticky
    }

    pub fn active_agent(&self) -> Option<&Agent> {
        self.active_agent.as_ref()
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn confirmation(&self) -> &ConfirmationState {
        &self.confirmation
    }

    pub fn model_selection(&self) -> &ModelSelection {
        &self.model_selection
    }

    /// Tool names the active agent restricts execution to
    pub fn allowed_tools(&self) -> Option<&[String]> {
        self.active_agent.as_ref().map(|a| a.allowed_tools.as_slice())
    }

    pub(crate) fn push(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Overwrite a message in place, keeping its id.
    pub(crate) fn replace(&mut self, id: Uuid, content: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.content = content.into();
                message.kind = MessageKind::Conversation;
                message.timestamp = Utc::now();
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_announcements(&mut self) {
        self.messages
            .retain(|m| m.kind != MessageKind::AgentAnnouncement);
    }

    /// Conversation messages before `before`, newest `window` of them.
    pub fn history_window(&self, before: Uuid, window: usize) -> Vec<&Message> {
        let end = self
            .messages
            .iter()
            .position(|m| m.id == before)
            .unwrap_or(self.messages.len());
        let prior: Vec<&Message> = self.messages[..end]
            .iter()
            .filter(|m| m.is_conversation())
            .collect();
        let skip = prior.len().saturating_sub(window);
        prior.into_iter().skip(skip).collect()
    }

    /// Newest assistant conversation message
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Assistant && m.is_conversation())
    }

    /// Reset everything tied to the active agent
    pub(crate) fn clear_agent_state(&mut self) {
        self.sticky = StickyIds::default();
        self.confirmation = ConfirmationState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(ModelSelection::for_model("gpt-5-mini"))
    }

    #[test]
    fn test_replace_keeps_identity() {
        let mut session = session();
        let id = session.push(Message::loading());
        assert!(session.messages()[0].is_loading());
        assert!(session.replace(id, "完了"));
        assert_eq!(session.messages()[0].id, id);
        assert_eq!(session.messages()[0].content, "完了");
        assert!(!session.messages()[0].is_loading());
        assert!(!session.replace(Uuid::new_v4(), "x"));
    }

    #[test]
    fn test_history_window_excludes_non_conversation() {
        let mut session = session();
        session.push(Message::announcement("🤖"));
        for i in 0..12 {
            session.push(Message::user(format!("u{}", i)));
        }
        let current = session.push(Message::user("now"));
        session.push(Message::loading());

        let window = session.history_window(current, 10);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "u2");
        assert_eq!(window[9].content, "u11");
    }

    #[test]
    fn test_remove_announcements() {
        let mut session = session();
        session.push(Message::announcement("a"));
        session.push(Message::user("b"));
        session.remove_announcements();
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_message_serde_kind_default() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "role": "assistant",
            "content": "x",
            "timestamp": Utc::now(),
        });
        let message: Message = serde_json::from_value(json).unwrap();
        assert_eq!(message.kind, MessageKind::Conversation);
        assert_eq!(message.role, ChatRole::Assistant);
    }
}
