// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Organization tree tools
//!
//! `get_organization_tree` lists a subtree; `create_organization` adds a node
//! under a parent and goes through preview/commit.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::store::{default_org_type, NewOrganization, OrgNode, OrganizationStore};
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolInvocation, ToolResult, ToolRole};

pub const GET_ORGANIZATION_TREE: &str = "get_organization_tree";
pub const CREATE_ORGANIZATION: &str = "create_organization";

/// Default display name for an organization level
pub fn default_level_name(level: u32) -> String {
    match level {
        0 => "本部".to_string(),
        1 => "部".to_string(),
        2 => "課".to_string(),
        3 => "グループ".to_string(),
        4 => "チーム".to_string(),
        n => format!("レベル{}", n),
    }
}

fn count_nodes(node: &OrgNode) -> usize {
    1 + node.children.iter().map(count_nodes).sum::<usize>()
}

fn render_tree(node: &OrgNode, depth: usize, out: &mut String) {
    out.push_str(&format!(
        "{}- {} (ID: {}, レベル{}: {})\n",
        "  ".repeat(depth),
        node.name,
        node.id,
        node.level,
        node.level_name
    ));
    for child in &node.children {
        render_tree(child, depth + 1, out);
    }
}

/// Tool that returns an organization subtree
pub struct GetOrganizationTreeTool {
    store: Arc<dyn OrganizationStore>,
}

impl GetOrganizationTreeTool {
    pub fn new(store: Arc<dyn OrganizationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetOrganizationTreeTool {
    fn name(&self) -> &str {
        GET_ORGANIZATION_TREE
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: GET_ORGANIZATION_TREE.to_string(),
            description: "組織ツリーを取得します。新しい組織を作成する前に親組織のIDを確認するために使用します。".to_string(),
            input_schema: SchemaBuilder::new()
                .string(
                    "rootId",
                    "ルート組織のID（省略時は表示中の組織、なければ最上位組織）",
                    false,
                )
                .build(),
        }
    }

    fn role(&self) -> ToolRole {
        ToolRole::TreeListing
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolResult> {
        let root_id = arguments["rootId"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .or_else(|| context.organization_id.clone());

        let Some(tree) = self.store.organization_tree(root_id.as_deref()).await? else {
            return Ok(ToolResult::failure(match root_id {
                Some(id) => format!("組織が見つかりません: {}", id),
                None => "組織が登録されていません".to_string(),
            }));
        };

        let count = count_nodes(&tree);
        Ok(ToolResult::success(json!({
            "rootId": tree.id,
            "tree": tree,
            "message": format!("組織ツリーを取得しました（{}件の組織）", count),
        })))
    }

    fn render_result(&self, _invocation: &ToolInvocation, result: &ToolResult) -> String {
        if !result.success {
            return format!("❌ エラー: {}", result.error.as_deref().unwrap_or("不明なエラー"));
        }
        let mut out = String::new();
        if let Some(message) = result.data["message"].as_str() {
            out.push_str(message);
            out.push_str("\n\n");
        }
        if let Ok(tree) = serde_json::from_value::<OrgNode>(result.data["tree"].clone()) {
            render_tree(&tree, 0, &mut out);
        }
        out.trim_end().to_string()
    }
}

/// Tool that creates an organization under a parent
pub struct CreateOrganizationTool {
    store: Arc<dyn OrganizationStore>,
}

impl CreateOrganizationTool {
    pub fn new(store: Arc<dyn OrganizationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateOrganizationTool {
    fn name(&self) -> &str {
        CREATE_ORGANIZATION
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: CREATE_ORGANIZATION.to_string(),
            description: "新しい組織を作成します。複数作成する場合は組織ごとに1回ずつ呼び出してください。".to_string(),
            input_schema: SchemaBuilder::new()
                .string("parentId", "親組織のID（省略時はルート組織として作成）", false)
                .string("name", "組織名", true)
                .string("title", "英語名などの別表記", false)
                .string("description", "組織の説明", false)
                .integer("level", "階層レベル（省略時は親のレベル+1）", false)
                .string("levelName", "階層名（本部・部・課など）", false)
                .integer("position", "表示順", false)
                .string("orgType", "組織種別", false)
                .build(),
        }
    }

    fn role(&self) -> ToolRole {
        ToolRole::RecordCreation
    }

    fn commit_switch(&self) -> Option<&'static str> {
        Some("commit")
    }

    async fn execute(&self, arguments: Value, _context: &ToolContext) -> Result<ToolResult> {
        let text = |key: &str| {
            arguments[key]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let Some(name) = text("name") else {
            return Ok(ToolResult::failure("組織名（name）は必須です"));
        };
        let parent_id = text("parentId");

        let parent = match &parent_id {
            Some(id) => match self.store.get_organization(id).await? {
                Some(parent) => Some(parent),
                None => {
                    return Ok(ToolResult::failure(format!("親組織が見つかりません: {}", id)));
                }
            },
            None => None,
        };

        let level = match &arguments["level"] {
            Value::Null => parent.as_ref().map(|p| p.level + 1).unwrap_or(0),
            value => match value.as_u64().and_then(|l| u32::try_from(l).ok()) {
                Some(level) => level,
                None => {
                    return Ok(ToolResult::failure(format!(
                        "階層レベル（level）が不正です: {}",
                        value
                    )));
                }
            },
        };
        let plan = NewOrganization {
            parent_id,
            name,
            title: text("title"),
            description: text("description"),
            level,
            level_name: text("levelName").unwrap_or_else(|| default_level_name(level)),
            position: arguments["position"].as_i64().unwrap_or(0),
            org_type: text("orgType").unwrap_or_else(default_org_type),
        };

        if !arguments["commit"].as_bool().unwrap_or(false) {
            return Ok(ToolResult::success(json!({
                "committed": false,
                "plan": plan,
            })));
        }

        let created = self.store.create_organization(plan).await?;
        tracing::debug!(target: "bizdesk.tools", id = %created.id, name = %created.name, "organization created");
        Ok(ToolResult::success(json!({
            "committed": true,
            "organization": created,
        })))
    }

    fn render_result(&self, _invocation: &ToolInvocation, result: &ToolResult) -> String {
        if !result.success {
            return format!("❌ エラー: {}", result.error.as_deref().unwrap_or("不明なエラー"));
        }
        if result.data["committed"].as_bool().unwrap_or(false) {
            let org = &result.data["organization"];
            return format!(
                "✅ 組織「{}」を作成しました (ID: {})",
                org["name"].as_str().unwrap_or(""),
                org["id"].as_str().unwrap_or("")
            );
        }
        let plan = &result.data["plan"];
        format!(
            "📋 作成予定: **{}** (レベル{}: {}, 親組織ID: {})",
            plan["name"].as_str().unwrap_or(""),
            plan["level"].as_u64().unwrap_or(0),
            plan["levelName"].as_str().unwrap_or(""),
            plan["parentId"].as_str().unwrap_or("なし")
        )
    }
}
