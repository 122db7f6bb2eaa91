// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for bizdesk
//!
//! Tools are named, side-effecting operations the model may request through
//! directives. The registry describes them to the model; the executor runs
//! them one after another.

pub mod builtin;
pub mod definition;
pub mod executor;

pub use definition::*;
pub use executor::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::chat::session::StickyIds;
use crate::error::Result;
use crate::llm::provider::{ModelSelection, ToolDefinition};

/// Context provided to tools during execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The user's utterance for this turn
    pub utterance: String,
    /// Organization bound by the current page
    pub organization_id: Option<String>,
    /// Identifiers carried across turns
    pub sticky: StickyIds,
    /// Backend used by the session
    pub model_selection: ModelSelection,
}

impl ToolContext {
    pub fn new(utterance: impl Into<String>, model_selection: ModelSelection) -> Self {
        Self {
            utterance: utterance.into(),
            organization_id: None,
            sticky: StickyIds::default(),
            model_selection,
        }
    }

    pub fn with_organization(mut self, organization_id: Option<String>) -> Self {
        self.organization_id = organization_id;
        self
    }

    pub fn with_sticky(mut self, sticky: StickyIds) -> Self {
        self.sticky = sticky;
        self
    }
}

/// A single requested tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool name as written by the model
    pub tool: String,
    /// Argument object
    pub arguments: serde_json::Map<String, Value>,
    /// Exact text of the directive; empty for typed calls
    pub raw_span: String,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, arguments: serde_json::Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            raw_span: String::new(),
        }
    }

    /// Non-empty string argument
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Create an error result
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }
}

/// How the grounding loop treats a tool's results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolRole {
    Plain,
    /// Returns a result set the answer must be grounded on
    Search,
    /// Returns a tree whose nodes can parent new records
    TreeListing,
    /// Creates records under a parent
    RecordCreation,
}

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition for the LLM
    fn definition(&self) -> ToolDefinition;

    /// Get the tool name
    fn name(&self) -> &str;

    /// Execute the tool with the given argument object
    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolResult>;

    fn role(&self) -> ToolRole {
        ToolRole::Plain
    }

    /// Boolean argument selecting commit (`true`) over preview (`false`).
    ///
    /// Tools returning `Some` change state and go through confirmation.
    fn commit_switch(&self) -> Option<&'static str> {
        None
    }

    /// Textual form of a result, appended to the assistant reply
    fn render_result(&self, _invocation: &ToolInvocation, result: &ToolResult) -> String {
        if result.success {
            match serde_json::to_string_pretty(&result.data) {
                Ok(json) => format!("```json\n{}\n```", json),
                Err(_) => result.data.to_string(),
            }
        } else {
            format!("❌ エラー: {}", result.error.as_deref().unwrap_or("不明なエラー"))
        }
    }
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Aliases mapping alternate names to canonical tool names
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Register an alternate name for a tool
    pub fn alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.insert(alias.into(), canonical.into());
    }

    /// Get a tool by name or alias
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name).or_else(|| {
            self.aliases
                .get(name)
                .and_then(|canonical| self.tools.get(canonical))
        })
    }

    /// Canonical name for a tool name or alias
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.get(name).map(|tool| tool.name())
    }

    /// Definitions of all tools, sorted by name
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Definitions restricted to a set of allowed names
    pub fn list_allowed(&self, allowed: Option<&[String]>) -> Vec<ToolDefinition> {
        match allowed {
            Some(names) => self
                .list()
                .into_iter()
                .filter(|d| names.iter().any(|n| n == &d.name))
                .collect(),
            None => self.list(),
        }
    }

    /// Tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Tool that echoes its arguments and records every call
    pub struct EchoTool {
        pub name: &'static str,
        pub role: ToolRole,
        pub commit_switch: Option<&'static str>,
        pub calls: Mutex<Vec<Value>>,
        pub fail: bool,
    }

    impl EchoTool {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                role: ToolRole::Plain,
                commit_switch: None,
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        pub fn calls(&self) -> Vec<Value> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.to_string(),
                description: "echo".to_string(),
                input_schema: SchemaBuilder::new().build(),
            }
        }

        fn name(&self) -> &str {
            self.name
        }

        fn role(&self) -> ToolRole {
            self.role
        }

        fn commit_switch(&self) -> Option<&'static str> {
            self.commit_switch
        }

        async fn execute(&self, arguments: Value, _context: &ToolContext) -> Result<ToolResult> {
            self.calls.lock().unwrap().push(arguments.clone());
            if self.fail {
                return Err(crate::error::BizdeskError::Store("echo failed".to_string()));
            }
            Ok(ToolResult::success(arguments))
        }
    }
}
