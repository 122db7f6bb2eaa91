// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool definition types
//!
//! Schemas are built once per tool and rendered two ways: as JSON Schema for
//! backends with typed function calls, and as the Markdown catalog injected
//! into the system prompt.

use serde_json::Value;

use crate::llm::provider::{ToolDefinition, ToolInputSchema};

/// Helper to create a tool input schema
pub struct SchemaBuilder {
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            properties: serde_json::Map::new(),
            required: vec![],
        }
    }

    fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add a string property
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "string", "description": description }),
            required,
        )
    }

    /// Add an integer property
    pub fn integer(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "integer", "description": description }),
            required,
        )
    }

    /// Add a boolean property
    pub fn boolean(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "boolean", "description": description }),
            required,
        )
    }

    /// Add a free-form object property
    pub fn object(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "object", "description": description }),
            required,
        )
    }

    /// Build the schema
    pub fn build(self) -> ToolInputSchema {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: Value::Object(self.properties),
            required: self.required,
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the tool catalog section of the system prompt.
///
/// One bullet per tool, with one indented line per argument:
/// `name (type, 必須|オプション): description`.
pub fn render_tool_catalog(definitions: &[ToolDefinition]) -> String {
    let mut out = String::new();
    for definition in definitions {
        out.push_str(&format!(
            "- **{}**: {}\n",
            definition.name, definition.description
        ));
        if let Value::Object(properties) = &definition.input_schema.properties {
            for (name, schema) in properties {
                let kind = schema.get("type").and_then(Value::as_str).unwrap_or("any");
                let description = schema
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let requirement = if definition.input_schema.required.iter().any(|r| r == name) {
                    "必須"
                } else {
                    "オプション"
                };
                out.push_str(&format!(
                    "  - {} ({}, {}): {}\n",
                    name, kind, requirement, description
                ));
            }
        }
    }
    out
}
