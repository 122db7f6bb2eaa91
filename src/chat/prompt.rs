// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! System prompt and request assembly

use crate::agents::Agent;
use crate::context::RetrievalContext;
use crate::llm::message::PromptMessage;
use crate::llm::provider::ToolDefinition;
use crate::tools::render_tool_catalog;

use super::intent::Slots;
use super::session::{ChatRole, Message};

const ASSISTANT_ROLE: &str = "あなたは業務ダッシュボードのアシスタントです。組織図、議事録、ナレッジグラフに関する質問や操作を手伝います。\
回答は日本語で、簡潔かつ正確に行ってください。分からないことは推測せず、確認を求めてください。";

const DIRECTIVE_GRAMMAR: &str = r#"ツールを使う場合は、回答の中に次の形式で呼び出しを記述してください（1回の呼び出しにつき1ブロック、複数可）:

<tool_call name="ツール名">
{"引数名": "値"}
</tool_call>

- 本文は1つのJSONオブジェクトにしてください
- ブロックを入れ子にしないでください
- 保存や作成はユーザーの確認後に行われます。確認前に完了したと伝えないでください"#;

/// Inputs of the system prompt
pub struct PromptParts<'a> {
    pub agent: Option<&'a Agent>,
    pub retrieval: &'a RetrievalContext,
    pub tools: &'a [ToolDefinition],
    pub slots: &'a Slots,
}

/// Build the system prompt.
///
/// Sections, in order: role, retrieved context, tools and directive grammar,
/// agent fragment, current identifiers.
pub fn build_system_prompt(parts: &PromptParts<'_>) -> String {
    let mut sections = vec![ASSISTANT_ROLE.to_string()];

    if !parts.retrieval.text.trim().is_empty() {
        sections.push(format!("# 参考情報\n\n{}", parts.retrieval.text.trim()));
    }

    if !parts.tools.is_empty() {
        sections.push(format!(
            "# 利用可能なツール\n\n{}\n{}",
            render_tool_catalog(parts.tools),
            DIRECTIVE_GRAMMAR
        ));
    }

    if let Some(agent) = parts.agent {
        if !agent.system_prompt_fragment.is_empty() {
            sections.push(format!(
                "# Agent: {}\n\n{}",
                agent.name, agent.system_prompt_fragment
            ));
        }
    }

    let mut ids = Vec::new();
    if let Some(id) = parts.slots.meeting_note_id() {
        ids.push(format!("- 議事録ID: {}", id));
    }
    if let Some(id) = parts.slots.item_id() {
        ids.push(format!("- アイテムID: {}", id));
    }
    if let Some(slot) = &parts.slots.topic_id {
        ids.push(format!("- トピックID: {}", slot.value));
    }
    if let Some(id) = parts.slots.organization_id() {
        ids.push(format!("- 組織ID: {}", id));
    }
    if !ids.is_empty() {
        sections.push(format!("# 現在の対象\n\n{}", ids.join("\n")));
    }

    sections.join("\n\n")
}

/// System prompt, the history window, then the current utterance.
pub fn build_messages(system: String, history: &[&Message], utterance: &str) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(system));
    for message in history {
        messages.push(match message.role {
            ChatRole::User => PromptMessage::user(message.content.clone()),
            ChatRole::Assistant => PromptMessage::assistant(message.content.clone()),
        });
    }
    messages.push(PromptMessage::user(utterance));
    messages
}
