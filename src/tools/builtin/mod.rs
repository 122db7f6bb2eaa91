// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools for bizdesk

mod knowledge_graph;
mod meeting_note;
mod organization;

pub use knowledge_graph::{SearchKnowledgeGraphTool, SEARCH_KNOWLEDGE_GRAPH};
pub use meeting_note::{
    clean_formatted_output, FormatMeetingNoteContentTool, CONFIRM_MARKER, CONTENT_HEADER,
    FORMAT_MEETING_NOTE_CONTENT, PREVIEW_HEADER,
};
pub use organization::{
    default_level_name, CreateOrganizationTool, GetOrganizationTreeTool, CREATE_ORGANIZATION,
    GET_ORGANIZATION_TREE,
};

use std::sync::Arc;

use crate::llm::backend::BackendResolver;
use crate::store::{KnowledgeGraphSearch, MeetingNoteStore, OrganizationStore};

use super::ToolRegistry;

/// Collaborators the built-in tools are backed by
#[derive(Clone)]
pub struct BuiltinServices {
    pub organizations: Arc<dyn OrganizationStore>,
    pub meeting_notes: Arc<dyn MeetingNoteStore>,
    pub knowledge: Arc<dyn KnowledgeGraphSearch>,
    pub resolver: Arc<dyn BackendResolver>,
}

impl ToolRegistry {
    /// Create a registry with all built-in tools
    pub fn with_builtins(services: &BuiltinServices) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(GetOrganizationTreeTool::new(
            services.organizations.clone(),
        )));
        registry.register(Arc::new(CreateOrganizationTool::new(
            services.organizations.clone(),
        )));
        registry.register(Arc::new(FormatMeetingNoteContentTool::new(
            services.meeting_notes.clone(),
            services.resolver.clone(),
        )));
        registry.register(Arc::new(SearchKnowledgeGraphTool::new(
            services.knowledge.clone(),
        )));

        // Names models commonly use instead of the registered ones
        registry.alias("search", SEARCH_KNOWLEDGE_GRAPH);
        registry.alias("knowledge_graph_search", SEARCH_KNOWLEDGE_GRAPH);
        registry.alias("format_meeting_note", FORMAT_MEETING_NOTE_CONTENT);
        registry.alias("get_org_tree", GET_ORGANIZATION_TREE);

        registry
    }
}
