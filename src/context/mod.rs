// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retrieval context
//!
//! A retrieval provider turns the user's query into a block of background
//! text for the system prompt plus the list of sources it came from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::store::KnowledgeGraphSearch;

/// Heading of the appended source list
pub const SOURCES_HEADER: &str = "## 参考情報の出典";

/// A document or graph node the context was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSource {
    /// `entity`, `relation`, `topic` or `document`
    pub kind: String,
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub score: f64,
}

/// Context text and its sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub text: String,
    pub sources: Vec<RagSource>,
}

impl RetrievalContext {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.sources.is_empty()
    }
}

/// `getContext(query, scopeId) -> {text, sources}`
#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    async fn get_context(&self, query: &str, scope_id: Option<&str>) -> Result<RetrievalContext>;
}

/// Provider that never returns context
pub struct NoRetrieval;

#[async_trait]
impl RetrievalProvider for NoRetrieval {
    async fn get_context(&self, _query: &str, _scope_id: Option<&str>) -> Result<RetrievalContext> {
        Ok(RetrievalContext::default())
    }
}

/// Retrieval backed by knowledge graph search
pub struct KnowledgeGraphRetrieval {
    search: Arc<dyn KnowledgeGraphSearch>,
    limit: usize,
}

impl KnowledgeGraphRetrieval {
    pub fn new(search: Arc<dyn KnowledgeGraphSearch>) -> Self {
        Self { search, limit: 5 }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
impl RetrievalProvider for KnowledgeGraphRetrieval {
    async fn get_context(&self, query: &str, scope_id: Option<&str>) -> Result<RetrievalContext> {
        let hits = self.search.search(query, self.limit, scope_id).await?;
        if hits.is_empty() {
            return Ok(RetrievalContext::default());
        }
        let mut text = String::from("## 関連情報\n");
        for hit in &hits {
            text.push_str(&format!("- {}", hit.title));
            if !hit.summary.is_empty() {
                text.push_str(&format!(": {}", hit.summary));
            }
            text.push('\n');
        }
        let sources = hits
            .into_iter()
            .map(|hit| RagSource {
                kind: hit.kind,
                id: hit.id,
                title: hit.title,
                score: hit.score,
            })
            .collect();
        Ok(RetrievalContext { text, sources })
    }
}

/// Fetch context, degrading to empty on failure.
pub async fn fetch_or_empty(
    provider: &dyn RetrievalProvider,
    query: &str,
    scope_id: Option<&str>,
) -> RetrievalContext {
    match provider.get_context(query, scope_id).await {
        Ok(context) => context,
        Err(err) => {
            tracing::warn!(target: "bizdesk.context", error = %err, "retrieval failed, continuing without context");
            RetrievalContext::default()
        }
    }
}

fn kind_label(kind: &str) -> &str {
    match kind {
        "entity" => "エンティティ",
        "relation" => "リレーション",
        "topic" => "トピック",
        "document" => "ドキュメント",
        other => other,
    }
}

/// Render the source list section; empty when there are no sources.
pub fn format_sources(sources: &[RagSource]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let mut out = format!("\n\n---\n\n{}\n", SOURCES_HEADER);
    for source in sources {
        out.push_str(&format!(
            "- {} ({}, 関連度 {:.0}%)\n",
            source.title,
            kind_label(&source.kind),
            source.score * 100.0
        ));
    }
    out.trim_end().to_string()
}

/// Append the source list unless the reply already has one.
pub fn append_sources(reply: &str, sources: &[RagSource]) -> String {
    if sources.is_empty() || reply.contains(SOURCES_HEADER) {
        return reply.to_string();
    }
    format!("{}{}", reply, format_sources(sources))
}
