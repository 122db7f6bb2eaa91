// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in agents
//!
//! - meeting-note-agent: formats and saves meeting note content
//! - organization-creation-agent: inspects the org tree and adds nodes

use std::sync::OnceLock;

use super::Agent;
use crate::tools::builtin::{CREATE_ORGANIZATION, FORMAT_MEETING_NOTE_CONTENT, GET_ORGANIZATION_TREE};

pub const MEETING_NOTE_AGENT: &str = "meeting-note-agent";
pub const ORGANIZATION_CREATION_AGENT: &str = "organization-creation-agent";

const MEETING_NOTE_PROMPT: &str = r#"あなたは議事録編集Agentです。ユーザーが送った内容を議事録として整形し、確認を得てから保存します。

手順:
1. 議事録IDが不明な場合は、議事録IDを教えてもらうよう依頼する
2. 整形する内容を受け取ったら format_meeting_note_content を save=false で呼び出してプレビューを表示する
3. 保存はユーザーが「はい」などで確認した後にのみ行われる。自分から save=true を指定しない

制約:
- 内容を創作しない
- 議事録ID・アイテムIDは会話中で示されたものだけを使う"#;

const ORGANIZATION_PROMPT: &str = r#"あなたは組織作成Agentです。組織図に新しい組織を追加します。

手順:
1. まず get_organization_tree で組織ツリーを取得し、親組織のIDを確認する
2. 作成する組織ごとに create_organization を1回ずつ呼び出す（parentIdには取得したIDを使う）
3. 作成はユーザーの確認後に確定される

制約:
- 存在しない親組織IDを推測しない
- 複数作成する場合は組織の数だけ呼び出す"#;

static BUILTIN_AGENTS: OnceLock<Vec<Agent>> = OnceLock::new();

/// Get the built-in agents
pub fn builtin_agents() -> &'static [Agent] {
    BUILTIN_AGENTS.get_or_init(|| {
        vec![
            Agent {
                id: MEETING_NOTE_AGENT.to_string(),
                name: "議事録編集Agent".to_string(),
                description: "議事録の内容を整形し、確認後に議事録アイテムへ保存します。".to_string(),
                capabilities: vec!["meeting-note-editing".to_string(), "formatting".to_string()],
                allowed_tools: vec![FORMAT_MEETING_NOTE_CONTENT.to_string()],
                system_prompt_fragment: MEETING_NOTE_PROMPT.to_string(),
                backend_preference: None,
                usage_hint: Some(
                    "💡 まず「議事録ID: xxx」の形式で編集する議事録を指定し、整形したい内容を送信してください。"
                        .to_string(),
                ),
            },
            Agent {
                id: ORGANIZATION_CREATION_AGENT.to_string(),
                name: "組織作成Agent".to_string(),
                description: "組織ツリーを確認し、指定された親組織の下に新しい組織を作成します。".to_string(),
                capabilities: vec!["organization-management".to_string()],
                allowed_tools: vec![
                    GET_ORGANIZATION_TREE.to_string(),
                    CREATE_ORGANIZATION.to_string(),
                ],
                system_prompt_fragment: ORGANIZATION_PROMPT.to_string(),
                backend_preference: None,
                usage_hint: None,
            },
        ]
    })
}

/// Look up a built-in agent by id
pub fn find_builtin(id: &str) -> Option<Agent> {
    builtin_agents().iter().find(|a| a.id == id).cloned()
}
