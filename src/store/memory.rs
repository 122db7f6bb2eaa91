// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-memory store
//!
//! Holds organizations as a flat list keyed by parent, meeting notes, and a
//! list of knowledge graph entries searched by keyword overlap.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;

use super::{
    KnowledgeGraphSearch, MeetingNote, MeetingNoteStore, NewOrganization, OrgNode,
    OrganizationStore, SearchHit,
};
use crate::error::{BizdeskError, Result};

/// Serializable contents of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Flat organization list; `children` is ignored
    #[serde(default)]
    pub organizations: Vec<OrgNode>,
    #[serde(default)]
    pub meeting_notes: Vec<MeetingNote>,
    #[serde(default)]
    pub knowledge: Vec<SearchHit>,
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<StoreSnapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(mut snapshot: StoreSnapshot) -> Self {
        for org in &mut snapshot.organizations {
            org.children.clear();
        }
        Self {
            data: RwLock::new(snapshot),
        }
    }

    /// Load a JSON fixture file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.data.read().await.clone()
    }

    pub async fn add_meeting_note(&self, note: MeetingNote) {
        self.data.write().await.meeting_notes.push(note);
    }

    pub async fn add_knowledge(&self, hit: SearchHit) {
        self.data.write().await.knowledge.push(hit);
    }

    pub async fn add_organization(&self, mut node: OrgNode) {
        node.children.clear();
        self.data.write().await.organizations.push(node);
    }
}

fn build_tree(flat: &[OrgNode], root: &OrgNode) -> OrgNode {
    let mut node = root.clone();
    let mut children: Vec<OrgNode> = flat
        .iter()
        .filter(|o| o.parent_id.as_deref() == Some(root.id.as_str()))
        .map(|child| build_tree(flat, child))
        .collect();
    children.sort_by_key(|c| c.position);
    node.children = children;
    node
}

#[async_trait]
impl OrganizationStore for InMemoryStore {
    async fn organization_tree(&self, root_id: Option<&str>) -> Result<Option<OrgNode>> {
        let data = self.data.read().await;
        let root = match root_id {
            Some(id) => data.organizations.iter().find(|o| o.id == id),
            None => data.organizations.iter().find(|o| o.parent_id.is_none()),
        };
        Ok(root.map(|r| build_tree(&data.organizations, r)))
    }

    async fn get_organization(&self, id: &str) -> Result<Option<OrgNode>> {
        let data = self.data.read().await;
        Ok(data.organizations.iter().find(|o| o.id == id).cloned())
    }

    async fn create_organization(&self, organization: NewOrganization) -> Result<OrgNode> {
        let mut data = self.data.write().await;
        if let Some(parent) = &organization.parent_id {
            if !data.organizations.iter().any(|o| &o.id == parent) {
                return Err(BizdeskError::Store(format!(
                    "parent organization not found: {}",
                    parent
                )));
            }
        }
        let id = format!("org-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let node = OrgNode {
            id,
            name: organization.name,
            title: organization.title,
            description: organization.description,
            level: organization.level,
            level_name: organization.level_name,
            position: organization.position,
            org_type: organization.org_type,
            parent_id: organization.parent_id,
            children: Vec::new(),
        };
        data.organizations.push(node.clone());
        Ok(node)
    }
}

#[async_trait]
impl MeetingNoteStore for InMemoryStore {
    async fn get_meeting_note(&self, id: &str) -> Result<Option<MeetingNote>> {
        let data = self.data.read().await;
        Ok(data.meeting_notes.iter().find(|n| n.id == id).cloned())
    }

    async fn save_item_content(
        &self,
        meeting_note_id: &str,
        item_id: &str,
        topic_id: Option<&str>,
        content: &str,
    ) -> Result<()> {
        let mut data = self.data.write().await;
        let note = data
            .meeting_notes
            .iter_mut()
            .find(|n| n.id == meeting_note_id)
            .ok_or_else(|| {
                BizdeskError::Store(format!("meeting note not found: {}", meeting_note_id))
            })?;
        let item = note
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| BizdeskError::Store(format!("item not found: {}", item_id)))?;
        match topic_id {
            Some(topic_id) => {
                let topic = item
                    .topics
                    .iter_mut()
                    .find(|t| t.id == topic_id)
                    .ok_or_else(|| BizdeskError::Store(format!("topic not found: {}", topic_id)))?;
                topic.content = content.to_string();
            }
            None => item.content = content.to_string(),
        }
        item.updated_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl KnowledgeGraphSearch for InMemoryStore {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        _organization_id: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let data = self.data.read().await;
        let mut hits: Vec<SearchHit> = data
            .knowledge
            .iter()
            .filter_map(|entry| {
                let haystack = format!("{} {}", entry.title, entry.summary).to_lowercase();
                let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (matched > 0).then(|| SearchHit {
                    score: matched as f64 / terms.len() as f64,
                    ..entry.clone()
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MeetingNoteItem;

    fn org(id: &str, parent: Option<&str>, position: i64) -> OrgNode {
        OrgNode {
            id: id.to_string(),
            name: id.to_uppercase(),
            title: None,
            description: None,
            level: if parent.is_some() { 1 } else { 0 },
            level_name: String::new(),
            position,
            org_type: "organization".to_string(),
            parent_id: parent.map(str::to_string),
            children: vec![],
        }
    }

    #[tokio::test]
    async fn test_tree_is_built_in_position_order() {
        let store = InMemoryStore::from_snapshot(StoreSnapshot {
            organizations: vec![
                org("root", None, 0),
                org("b", Some("root"), 2),
                org("a", Some("root"), 1),
            ],
            ..Default::default()
        });
        let tree = store.organization_tree(None).await.unwrap().unwrap();
        assert_eq!(tree.id, "root");
        let ids: Vec<&str> = tree.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(store.organization_tree(Some("zzz")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_under_missing_parent_fails() {
        let store = InMemoryStore::new();
        let err = store
            .create_organization(NewOrganization {
                parent_id: Some("ghost".to_string()),
                name: "x".to_string(),
                title: None,
                description: None,
                level: 1,
                level_name: "部".to_string(),
                position: 0,
                org_type: "organization".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BizdeskError::Store(_)));
    }

    #[tokio::test]
    async fn test_save_item_content() {
        let store = InMemoryStore::new();
        store
            .add_meeting_note(MeetingNote {
                id: "m1".to_string(),
                title: "定例".to_string(),
                organization_id: None,
                items: vec![MeetingNoteItem {
                    id: "i1".to_string(),
                    title: "第1回".to_string(),
                    content: String::new(),
                    created_at: None,
                    updated_at: None,
                    topics: vec![],
                }],
            })
            .await;
        store.save_item_content("m1", "i1", None, "# 議事録").await.unwrap();
        let note = store.get_meeting_note("m1").await.unwrap().unwrap();
        assert_eq!(note.items[0].content, "# 議事録");
        assert!(note.items[0].updated_at.is_some());
        assert!(store.save_item_content("m1", "i9", None, "x").await.is_err());
        assert!(store.save_item_content("m1", "i1", Some("t1"), "x").await.is_err());
    }

    #[tokio::test]
    async fn test_search_scores_by_term_overlap() {
        let store = InMemoryStore::new();
        store
            .add_knowledge(SearchHit {
                kind: "entity".to_string(),
                id: "e1".to_string(),
                title: "トヨタ".to_string(),
                score: 0.0,
                summary: "自動車 メーカー".to_string(),
            })
            .await;
        store
            .add_knowledge(SearchHit {
                kind: "topic".to_string(),
                id: "t1".to_string(),
                title: "EV市場".to_string(),
                score: 0.0,
                summary: "自動車".to_string(),
            })
            .await;
        let hits = store.search("トヨタ 自動車", 10, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "e1");
        assert_eq!(hits[0].score, 1.0);
        assert!(store.search("   ", 10, None).await.unwrap().is_empty());
        assert_eq!(store.search("自動車", 1, None).await.unwrap().len(), 1);
    }
}
