// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Grounding loop
//!
//! Decides when tool output warrants another backend call and builds the
//! prompts for it. Two triggers exist:
//!
//! - a search produced results, so the answer is rewritten on top of them
//! - a tree listing succeeded for a creation request but nothing was created,
//!   so the model is asked again with the parent id it now has

use serde_json::Value;

use crate::llm::message::PromptMessage;
use crate::tools::{ExecutedInvocation, ToolRole};

use super::intent::has_creation_intent;

/// Whether a result carries data the answer must be based on
pub fn has_grounding_payload(executed: &ExecutedInvocation) -> bool {
    if !executed.result.success {
        return false;
    }
    let data = &executed.result.data;
    let has_results = data["results"].as_array().is_some_and(|r| !r.is_empty());
    let has_context = data["context"]
        .as_str()
        .is_some_and(|c| !c.trim().is_empty());
    match executed.role {
        ToolRole::Search => has_results || has_context,
        _ => has_context,
    }
}

/// Search grounding fires when any result has a payload and nothing is
/// waiting for confirmation.
pub fn needs_search_grounding(executed: &[ExecutedInvocation]) -> bool {
    let triggered = executed.iter().any(has_grounding_payload)
        && !executed.iter().any(ExecutedInvocation::is_pending_preview);
    if triggered {
        tracing::debug!(target: "bizdesk.chat.grounding", "search grounding triggered");
    }
    triggered
}

fn payload_text(executed: &[ExecutedInvocation]) -> String {
    executed
        .iter()
        .filter(|e| has_grounding_payload(e))
        .map(|e| {
            let data = &e.result.data;
            let body = match data["context"].as_str().filter(|c| !c.trim().is_empty()) {
                Some(context) => context.to_string(),
                None => serde_json::to_string_pretty(&data["results"]).unwrap_or_default(),
            };
            format!("### {}\n{}", e.tool_name(), body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Messages for the grounded answer: the original request plus the tool
/// output, with an instruction to treat the output as authoritative.
pub fn grounding_messages(
    base: &[PromptMessage],
    utterance: &str,
    executed: &[ExecutedInvocation],
) -> Vec<PromptMessage> {
    let mut messages: Vec<PromptMessage> = base.to_vec();
    if messages.last().is_some_and(|m| m.content == utterance) {
        messages.pop();
    }
    messages.push(PromptMessage::user(format!(
        "{}\n\n## ツール実行結果（信頼できる情報）\n\n{}\n\n\
        上記のツール実行結果は正確な情報です。この結果だけを根拠に質問に回答してください。\
        結果が存在するため「情報が見つかりません」「該当する情報はありません」とは回答しないでください。\
        ツール呼び出し（<tool_call>）は出力しないでください。",
        utterance,
        payload_text(executed)
    )));
    messages
}

/// Parent id the creation re-ask should use
#[derive(Debug, Clone, PartialEq)]
pub struct ReaskTarget {
    pub parent_id: String,
    pub tree: Value,
}

/// Re-ask target when a tree listing succeeded for a creation request that
/// produced no creation call.
pub fn organization_reask(
    executed: &[ExecutedInvocation],
    utterance: &str,
) -> Option<ReaskTarget> {
    if executed.iter().any(|e| e.role == ToolRole::RecordCreation) {
        return None;
    }
    if !has_creation_intent(utterance) {
        return None;
    }
    let listing = executed
        .iter()
        .find(|e| e.role == ToolRole::TreeListing && e.result.success)?;
    let parent_id = listing.result.data["tree"]["id"]
        .as_str()
        .map(str::to_string)
        .or_else(|| listing.invocation.str_arg("rootId").map(str::to_string))?;
    tracing::debug!(target: "bizdesk.chat.grounding", parent_id = %parent_id, "organization re-ask triggered");
    Some(ReaskTarget {
        parent_id,
        tree: listing.result.data["tree"].clone(),
    })
}

/// Messages asking for one creation directive per record.
pub fn reask_messages(
    base: &[PromptMessage],
    utterance: &str,
    target: &ReaskTarget,
    creation_tool: &str,
) -> Vec<PromptMessage> {
    let tree = serde_json::to_string_pretty(&target.tree).unwrap_or_default();
    let mut messages: Vec<PromptMessage> = base.to_vec();
    if messages.last().is_some_and(|m| m.content == utterance) {
        messages.pop();
    }
    messages.push(PromptMessage::user(format!(
        "{utterance}\n\n## 取得済みの組織ツリー\n\n```json\n{tree}\n```\n\n\
        親組織のIDは \"{parent}\" です。ユーザーの依頼どおりに組織を作成するため、\
        作成する組織ごとに {tool} を1回ずつ呼び出してください。例:\n\n\
        <tool_call name=\"{tool}\">{{\"parentId\": \"{parent}\", \"name\": \"営業一課\"}}</tool_call>\n\
        <tool_call name=\"{tool}\">{{\"parentId\": \"{parent}\", \"name\": \"営業二課\"}}</tool_call>\n\n\
        組織名はユーザーの依頼から決めてください。説明文は短くして構いません。",
        utterance = utterance,
        tree = tree,
        parent = target.parent_id,
        tool = creation_tool,
    )));
    messages
}
