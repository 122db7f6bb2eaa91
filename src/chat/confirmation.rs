// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Confirmation protocol
//!
//! State-changing tools first run as a preview. The session then holds a
//! [`PendingCommit`] until the next utterance: an affirmation commits it,
//! anything else discards it. Commits are only reachable from a pending
//! preview, so an unrelated later "ok" never saves twice.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::store::ItemCandidate;
use crate::tools::builtin::{CONFIRM_MARKER, CONTENT_HEADER, PREVIEW_HEADER};
use crate::tools::{ExecutedInvocation, ToolInvocation};

use super::intent::{is_affirmation, mentioned_item_id, wants_latest_item};
use super::session::{ChatRole, Message};

/// A preview waiting for the user's answer
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommit {
    /// Previewed invocations with their prepared arguments
    pub invocations: Vec<ToolInvocation>,
    /// Content shown in the preview, when the content tool produced it
    pub previewed_content: Option<String>,
    /// Message that displayed the preview
    pub preview_message_id: Option<Uuid>,
}

impl PendingCommit {
    /// Build from the previews of one turn; `None` when there are none.
    pub fn from_executed(executed: &[ExecutedInvocation], content_tool: &str) -> Option<Self> {
        let previews: Vec<&ExecutedInvocation> =
            executed.iter().filter(|e| e.is_pending_preview()).collect();
        if previews.is_empty() {
            return None;
        }
        let previewed_content = previews
            .iter()
            .find(|e| e.tool_name() == content_tool)
            .and_then(|e| e.result.data["formattedContent"].as_str())
            .map(str::to_string);
        Some(Self {
            invocations: previews.into_iter().map(with_result_ids).collect(),
            previewed_content,
            preview_message_id: None,
        })
    }

    pub fn with_message(mut self, id: Uuid) -> Self {
        self.preview_message_id = Some(id);
        self
    }

    /// First invocation of `tool`
    pub fn invocation(&self, tool: &str) -> Option<&ToolInvocation> {
        self.invocations.iter().find(|i| i.tool == tool)
    }
}

/// Carry ids the tool resolved itself into the arguments used at commit.
fn with_result_ids(executed: &ExecutedInvocation) -> ToolInvocation {
    let mut invocation = executed.invocation.clone();
    invocation.tool = executed.tool_name().to_string();
    if let Value::Object(data) = &executed.result.data {
        for key in ["meetingNoteId", "itemId", "topicId"] {
            if let Some(Value::String(id)) = data.get(key) {
                invocation
                    .arguments
                    .entry(key.to_string())
                    .or_insert_with(|| Value::String(id.clone()));
            }
        }
    }
    invocation
}

/// Per-session confirmation state
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConfirmationState {
    #[default]
    Idle,
    Previewed(PendingCommit),
    /// Confirmed, but the target item still has to be chosen
    AwaitingItem {
        pending: PendingCommit,
        candidates: Vec<ItemCandidate>,
    },
}

impl ConfirmationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConfirmationState::Idle)
    }

    pub fn pending(&self) -> Option<&PendingCommit> {
        match self {
            ConfirmationState::Idle => None,
            ConfirmationState::Previewed(pending) => Some(pending),
            ConfirmationState::AwaitingItem { pending, .. } => Some(pending),
        }
    }
}

/// What to do with the utterance given the current state
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nothing pending; run a normal turn
    Proceed,
    /// Something was pending and the utterance did not confirm it
    Discard,
    Commit(PendingCommit),
    /// The awaited item was chosen
    CommitWithItem {
        pending: PendingCommit,
        item_id: String,
    },
}

/// Classify an utterance against the confirmation state.
pub fn classify(state: &ConfirmationState, utterance: &str) -> Decision {
    let decision = match state {
        ConfirmationState::Idle => Decision::Proceed,
        ConfirmationState::Previewed(pending) => {
            if is_affirmation(utterance) {
                Decision::Commit(pending.clone())
            } else {
                Decision::Discard
            }
        }
        ConfirmationState::AwaitingItem {
            pending,
            candidates,
        } => {
            let chosen = mentioned_item_id(utterance)
                .or_else(|| {
                    candidates
                        .iter()
                        .find(|c| utterance.trim() == c.id)
                        .map(|c| c.id.clone())
                })
                .or_else(|| {
                    wants_latest_item(utterance)
                        .then(|| pick_latest(candidates).map(|c| c.id.clone()))
                        .flatten()
                });
            match chosen {
                Some(item_id) => Decision::CommitWithItem {
                    pending: pending.clone(),
                    item_id,
                },
                None => Decision::Discard,
            }
        }
    };
    tracing::debug!(target: "bizdesk.chat.confirm", decision = decision_label(&decision), "utterance classified");
    decision
}

fn decision_label(decision: &Decision) -> &'static str {
    match decision {
        Decision::Proceed => "proceed",
        Decision::Discard => "discard",
        Decision::Commit(_) => "commit",
        Decision::CommitWithItem { .. } => "commit_with_item",
    }
}

/// Candidate with the latest timestamp.
///
/// Ties keep the first seen; when no candidate has a timestamp the first
/// candidate is returned.
pub fn pick_latest(candidates: &[ItemCandidate]) -> Option<&ItemCandidate> {
    let mut best: Option<&ItemCandidate> = None;
    for candidate in candidates {
        let Some(ts) = candidate.timestamp else {
            continue;
        };
        match best.and_then(|b| b.timestamp) {
            Some(best_ts) if ts <= best_ts => {}
            _ => best = Some(candidate),
        }
    }
    best.or_else(|| candidates.first())
}

/// Question listing the items the content could belong to
pub fn item_question(candidates: &[ItemCandidate]) -> String {
    let mut out = String::from(
        "⚠️ **ItemIDが指定されていません。**\n\n保存先のアイテムを選んでください:\n\n",
    );
    for candidate in candidates {
        out.push_str(&format!("- **{}** (ItemID: {})\n", candidate.title, candidate.id));
    }
    out.push_str("\n「itemId: xxx」の形式で指定するか、「最新のもの」と回答してください。");
    out
}

fn next_heading() -> &'static Regex {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    HEADING.get_or_init(|| Regex::new(r"(?m)^#{1,3}\s").unwrap())
}

fn fenced_block() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```[^\n]*\n(.*?)```").unwrap())
}

/// Recover previewed content from the text of a preview message.
///
/// Tried in order: the content section up to the confirmation marker or a
/// horizontal rule, the content section up to the next heading, the first
/// fenced block.
pub fn extract_previewed_content(text: &str) -> Option<String> {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    if let Some(start) = text.find(CONTENT_HEADER) {
        let body = &text[start + CONTENT_HEADER.len()..];
        let boundary = [body.find(CONFIRM_MARKER), body.find("\n---")]
            .into_iter()
            .flatten()
            .min();
        if let Some(end) = boundary {
            if let Some(content) = non_empty(&body[..end]) {
                return Some(content);
            }
        }
        let end = next_heading()
            .find(body)
            .map(|m| m.start())
            .unwrap_or(body.len());
        if let Some(content) = non_empty(&body[..end]) {
            return Some(content);
        }
    }

    fenced_block()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

fn labelled_id(text: &str, label: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let rest = line.trim().strip_prefix(label)?;
        let rest = rest.trim_start().strip_prefix([':', '：'])?;
        let id = rest.trim();
        (!id.is_empty()).then(|| id.to_string())
    })
}

/// Rebuild the pending preview of a restored conversation.
///
/// Only the newest assistant message counts, and only when it is a preview
/// still asking for confirmation. The content is left for re-extraction.
pub fn restore_from_history(messages: &[Message], content_tool: &str) -> ConfirmationState {
    let Some(last) = messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::Assistant && m.is_conversation())
    else {
        return ConfirmationState::Idle;
    };
    if !last.content.contains(PREVIEW_HEADER) || !last.content.contains(CONFIRM_MARKER) {
        return ConfirmationState::Idle;
    }

    let mut arguments = serde_json::Map::new();
    for (label, key) in [
        ("議事録ID", "meetingNoteId"),
        ("ItemID", "itemId"),
        ("トピックID", "topicId"),
    ] {
        if let Some(id) = labelled_id(&last.content, label) {
            arguments.insert(key.to_string(), Value::String(id));
        }
    }
    tracing::debug!(target: "bizdesk.chat.confirm", message = %last.id, "pending preview restored from history");
    ConfirmationState::Previewed(PendingCommit {
        invocations: vec![ToolInvocation::new(content_tool, arguments)],
        previewed_content: None,
        preview_message_id: Some(last.id),
    })
}
