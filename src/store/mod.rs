// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Contracts for the dashboard's backing store
//!
//! The engine never talks to a database directly; built-in tools go through
//! these traits. `memory` provides an implementation for tests and the CLI.

pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A node of the organization tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgNode {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub level_name: String,
    #[serde(default)]
    pub position: i64,
    #[serde(rename = "type", default = "default_org_type")]
    pub org_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children: Vec<OrgNode>,
}

pub(crate) fn default_org_type() -> String {
    "organization".to_string()
}

/// Fields for a new organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrganization {
    pub parent_id: Option<String>,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: u32,
    pub level_name: String,
    pub position: i64,
    pub org_type: String,
}

/// Organization tree access
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Tree rooted at `root_id`, or the topmost root when `None`
    async fn organization_tree(&self, root_id: Option<&str>) -> Result<Option<OrgNode>>;

    /// Single node without children
    async fn get_organization(&self, id: &str) -> Result<Option<OrgNode>>;

    async fn create_organization(&self, organization: NewOrganization) -> Result<OrgNode>;
}

/// An editable entry inside a meeting note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingNoteItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub topics: Vec<MeetingTopic>,
}

/// A topic attached to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingTopic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// A meeting note with its items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingNote {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub items: Vec<MeetingNoteItem>,
}

/// An item offered to the user when the target item is ambiguous
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCandidate {
    pub id: String,
    pub title: String,
    /// `updatedAt`, falling back to `createdAt`
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&MeetingNoteItem> for ItemCandidate {
    fn from(item: &MeetingNoteItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            timestamp: item.updated_at.or(item.created_at),
        }
    }
}

/// Meeting note access
#[async_trait]
pub trait MeetingNoteStore: Send + Sync {
    async fn get_meeting_note(&self, id: &str) -> Result<Option<MeetingNote>>;

    /// Replace the content of an item, or of one of its topics
    async fn save_item_content(
        &self,
        meeting_note_id: &str,
        item_id: &str,
        topic_id: Option<&str>,
        content: &str,
    ) -> Result<()>;

    /// Items of a note in stored order; empty when the note does not exist
    async fn item_candidates(&self, meeting_note_id: &str) -> Result<Vec<ItemCandidate>> {
        Ok(self
            .get_meeting_note(meeting_note_id)
            .await?
            .map(|note| note.items.iter().map(ItemCandidate::from).collect())
            .unwrap_or_default())
    }
}

/// One knowledge graph search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// `entity`, `relation` or `topic`
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub title: String,
    pub score: f64,
    #[serde(default)]
    pub summary: String,
}

/// Knowledge graph search
#[async_trait]
pub trait KnowledgeGraphSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        organization_id: Option<&str>,
    ) -> Result<Vec<SearchHit>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_org_node_json_shape() {
        let node = OrgNode {
            id: "org-1".to_string(),
            name: "営業本部".to_string(),
            title: None,
            description: None,
            level: 0,
            level_name: "本部".to_string(),
            position: 0,
            org_type: default_org_type(),
            parent_id: None,
            children: vec![],
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["levelName"], "本部");
        assert_eq!(json["type"], "organization");
        assert!(json.get("parentId").is_none());
    }

    #[test]
    fn test_candidate_prefers_updated_at() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let updated = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let item = MeetingNoteItem {
            id: "i1".to_string(),
            title: "定例".to_string(),
            content: String::new(),
            created_at: Some(created),
            updated_at: Some(updated),
            topics: vec![],
        };
        assert_eq!(ItemCandidate::from(&item).timestamp, Some(updated));

        let item = MeetingNoteItem {
            updated_at: None,
            ..item
        };
        assert_eq!(ItemCandidate::from(&item).timestamp, Some(created));
    }
}
