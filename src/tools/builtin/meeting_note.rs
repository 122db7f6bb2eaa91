// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Meeting note formatting tool
//!
//! Preview asks the session's model to turn raw notes into Markdown. Commit
//! stores the given content verbatim without another model call.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Result;
use crate::llm::backend::BackendResolver;
use crate::llm::message::PromptMessage;
use crate::llm::provider::ToolDefinition;
use crate::store::MeetingNoteStore;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolInvocation, ToolResult};

pub const FORMAT_MEETING_NOTE_CONTENT: &str = "format_meeting_note_content";

/// Heading that opens a rendered preview
pub const PREVIEW_HEADER: &str = "## 議事録整形結果";
/// Heading directly above the formatted content
pub const CONTENT_HEADER: &str = "### 整形された内容";
/// Marker that opens the confirmation question after the content
pub const CONFIRM_MARKER: &str = "💡 **確認**";

const FORMAT_SYSTEM_PROMPT: &str = "あなたは議事録の編集者です。与えられたメモを、見出し・箇条書き・決定事項・TODOを含む読みやすいMarkdownの議事録に整形してください。内容を創作せず、整形後の本文のみを出力してください。";

/// Strip code fences and unwrap a `{"formattedContent": ...}` answer.
pub fn clean_formatted_output(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    if text.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            if let Some(content) = value["formattedContent"].as_str() {
                return content.trim().to_string();
            }
        }
    }
    text.to_string()
}

/// Tool that formats and saves meeting note content
pub struct FormatMeetingNoteContentTool {
    notes: Arc<dyn MeetingNoteStore>,
    resolver: Arc<dyn BackendResolver>,
}

impl FormatMeetingNoteContentTool {
    pub fn new(notes: Arc<dyn MeetingNoteStore>, resolver: Arc<dyn BackendResolver>) -> Self {
        Self { notes, resolver }
    }

    async fn format(&self, raw: &str, context: &ToolContext) -> Result<String> {
        let backend = self.resolver.resolve(&context.model_selection)?;
        let reply = backend
            .complete(&[
                PromptMessage::system(FORMAT_SYSTEM_PROMPT),
                PromptMessage::user(raw),
            ])
            .await?;
        Ok(clean_formatted_output(&reply))
    }
}

#[async_trait]
impl Tool for FormatMeetingNoteContentTool {
    fn name(&self) -> &str {
        FORMAT_MEETING_NOTE_CONTENT
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: FORMAT_MEETING_NOTE_CONTENT.to_string(),
            description: "議事録の内容をMarkdownに整形します。save=trueで議事録アイテムに保存します（保存はユーザーの確認後のみ）。".to_string(),
            input_schema: SchemaBuilder::new()
                .string("rawContent", "整形する元の内容", false)
                .string("meetingNoteId", "議事録ID", false)
                .string("itemId", "議事録アイテムID", false)
                .string("topicId", "トピックID", false)
                .object("options", "整形オプション", false)
                .boolean("save", "trueで保存（既定はfalse）", false)
                .build(),
        }
    }

    fn commit_switch(&self) -> Option<&'static str> {
        Some("save")
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolResult> {
        let id = |key: &str| {
            arguments[key]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let raw_content = arguments["rawContent"].as_str();
        let sticky = &context.sticky;
        let meeting_note_id = id("meetingNoteId").or_else(|| sticky.meeting_note_id.clone());
        // A stored item only applies to the stored meeting note
        let item_id = id("itemId").or_else(|| {
            sticky
                .item_id
                .clone()
                .filter(|_| meeting_note_id == sticky.meeting_note_id)
        });
        let topic_id = id("topicId");

        if raw_content.is_none() && meeting_note_id.is_none() {
            return Ok(ToolResult::failure(
                "rawContentまたはmeetingNoteIdのいずれかが必要です",
            ));
        }
        if raw_content.is_some_and(|c| c.trim().is_empty()) {
            return Ok(ToolResult::failure("rawContentが空です"));
        }
        if item_id.is_some() && meeting_note_id.is_none() {
            return Ok(ToolResult::failure(
                "itemIdを指定する場合はmeetingNoteIdも必要です",
            ));
        }
        if topic_id.is_some() && (meeting_note_id.is_none() || item_id.is_none()) {
            return Ok(ToolResult::failure(
                "topicIdを指定する場合はmeetingNoteIdとitemIdも必要です",
            ));
        }

        let note = match &meeting_note_id {
            Some(note_id) => match self.notes.get_meeting_note(note_id).await? {
                Some(note) => Some(note),
                None => {
                    return Ok(ToolResult::failure(format!(
                        "議事録が見つかりません: {}",
                        note_id
                    )))
                }
            },
            None => None,
        };

        if arguments["save"].as_bool().unwrap_or(false) {
            let (Some(note_id), Some(item)) = (&meeting_note_id, &item_id) else {
                return Ok(ToolResult::failure(
                    "保存にはmeetingNoteIdとitemIdが必要です",
                ));
            };
            let Some(content) = raw_content else {
                return Ok(ToolResult::failure("保存する内容（rawContent）がありません"));
            };
            self.notes
                .save_item_content(note_id, item, topic_id.as_deref(), content)
                .await?;
            tracing::debug!(target: "bizdesk.tools", meeting_note_id = %note_id, item_id = %item, "meeting note content saved");
            return Ok(ToolResult::success(json!({
                "saved": true,
                "meetingNoteId": note_id,
                "itemId": item,
                "topicId": topic_id,
                "formattedContent": content,
            })));
        }

        let source = match raw_content {
            Some(content) => content.to_string(),
            None => {
                let existing = note.as_ref().and_then(|n| {
                    item_id
                        .as_ref()
                        .and_then(|iid| n.items.iter().find(|i| &i.id == iid))
                        .map(|i| i.content.clone())
                });
                match existing.filter(|c| !c.trim().is_empty()) {
                    Some(content) => content,
                    None => return Ok(ToolResult::failure("整形する内容がありません")),
                }
            }
        };

        let formatted = self.format(&source, context).await?;
        Ok(ToolResult::success(json!({
            "saved": false,
            "meetingNoteId": meeting_note_id,
            "itemId": item_id,
            "topicId": topic_id,
            "formattedContent": formatted,
        })))
    }

    fn render_result(&self, _invocation: &ToolInvocation, result: &ToolResult) -> String {
        if !result.success {
            return format!("❌ エラー: {}", result.error.as_deref().unwrap_or("不明なエラー"));
        }
        if result.data["saved"].as_bool().unwrap_or(false) {
            return "✅ 議事録の内容を更新しました。".to_string();
        }

        let mut out = format!("{}\n\n", PREVIEW_HEADER);
        if let Some(id) = result.data["meetingNoteId"].as_str() {
            out.push_str(&format!("議事録ID: {}\n", id));
        }
        if let Some(id) = result.data["itemId"].as_str() {
            out.push_str(&format!("ItemID: {}\n", id));
        }
        if let Some(id) = result.data["topicId"].as_str() {
            out.push_str(&format!("トピックID: {}\n", id));
        }
        out.push_str(&format!(
            "\n{}\n\n{}\n\n{}: この内容で議事録に登録しますか？「はい」と回答すると保存します。",
            CONTENT_HEADER,
            result.data["formattedContent"].as_str().unwrap_or(""),
            CONFIRM_MARKER
        ));
        out
    }
}
