// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Knowledge graph search tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::store::{KnowledgeGraphSearch, SearchHit};
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolInvocation, ToolResult, ToolRole};

pub const SEARCH_KNOWLEDGE_GRAPH: &str = "search_knowledge_graph";

const DEFAULT_LIMIT: usize = 10;

fn context_text(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            if hit.summary.is_empty() {
                format!("- {} ({})", hit.title, hit.kind)
            } else {
                format!("- {} ({}): {}", hit.title, hit.kind, hit.summary)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tool that searches entities, relations and topics
pub struct SearchKnowledgeGraphTool {
    search: Arc<dyn KnowledgeGraphSearch>,
}

impl SearchKnowledgeGraphTool {
    pub fn new(search: Arc<dyn KnowledgeGraphSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for SearchKnowledgeGraphTool {
    fn name(&self) -> &str {
        SEARCH_KNOWLEDGE_GRAPH
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_KNOWLEDGE_GRAPH.to_string(),
            description: "ナレッジグラフからエンティティ・リレーション・トピックを検索します。".to_string(),
            input_schema: SchemaBuilder::new()
                .string("query", "検索クエリ", true)
                .integer("limit", "最大件数（既定10）", false)
                .string("organizationId", "検索対象の組織ID", false)
                .build(),
        }
    }

    fn role(&self) -> ToolRole {
        ToolRole::Search
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolResult> {
        let Some(query) = arguments["query"].as_str().map(str::trim).filter(|q| !q.is_empty())
        else {
            return Ok(ToolResult::failure("検索クエリ（query）は必須です"));
        };
        let limit = arguments["limit"]
            .as_u64()
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LIMIT);
        let organization_id = arguments["organizationId"]
            .as_str()
            .map(str::to_string)
            .or_else(|| context.organization_id.clone());

        let hits = self
            .search
            .search(query, limit, organization_id.as_deref())
            .await?;
        tracing::debug!(target: "bizdesk.tools", query = %query, hits = hits.len(), "knowledge graph searched");

        Ok(ToolResult::success(json!({
            "query": query,
            "count": hits.len(),
            "context": context_text(&hits),
            "results": hits,
        })))
    }

    fn render_result(&self, _invocation: &ToolInvocation, result: &ToolResult) -> String {
        if !result.success {
            return format!("❌ エラー: {}", result.error.as_deref().unwrap_or("不明なエラー"));
        }
        let hits: Vec<SearchHit> =
            serde_json::from_value(result.data["results"].clone()).unwrap_or_default();
        if hits.is_empty() {
            return "🔍 検索結果はありませんでした。".to_string();
        }
        let mut out = format!("🔍 検索結果 ({}件)\n", hits.len());
        for hit in &hits {
            out.push_str(&format!(
                "- **{}** ({}, 関連度 {:.2})",
                hit.title, hit.kind, hit.score
            ));
            if !hit.summary.is_empty() {
                out.push_str(&format!(": {}", hit.summary));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}
