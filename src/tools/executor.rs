// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool execution engine
//!
//! Runs invocations strictly in order. A bad invocation produces a failed
//! result and never stops the ones after it. State-changing tools only ever
//! run in preview mode here unless the caller asks for a commit explicitly.

use serde_json::Value;

use crate::error::BizdeskError;

use super::{ToolContext, ToolInvocation, ToolRegistry, ToolResult, ToolRole};

/// Result text for invocations naming an unregistered tool
pub const UNKNOWN_TOOL: &str = "UnknownTool";

/// How an invocation was run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    /// Tool without a commit switch
    Direct,
    /// State-changing tool forced into preview mode
    Preview,
    /// State-changing tool run for real after confirmation
    Commit,
}

/// An invocation together with its outcome
#[derive(Debug, Clone)]
pub struct ExecutedInvocation {
    /// Invocation as executed, with defaults and the commit switch applied
    pub invocation: ToolInvocation,
    /// Registered name, when the tool resolved
    pub canonical: Option<String>,
    pub role: ToolRole,
    pub phase: ExecutionPhase,
    pub result: ToolResult,
}

impl ExecutedInvocation {
    /// Tool name to display and match on
    pub fn tool_name(&self) -> &str {
        self.canonical.as_deref().unwrap_or(&self.invocation.tool)
    }

    /// A state-changing call that produced a preview awaiting confirmation
    pub fn is_pending_preview(&self) -> bool {
        self.phase == ExecutionPhase::Preview && self.result.success
    }

    /// Identifier arguments, for error reports
    pub fn identifiers(&self) -> Vec<(String, String)> {
        invocation_identifiers(&self.invocation)
    }

    /// Failed execution as a crate error
    pub fn failure(&self) -> Option<BizdeskError> {
        if self.result.success {
            return None;
        }
        Some(BizdeskError::ToolExecutionFailed {
            tool: self.tool_name().to_string(),
            identifiers: self.identifiers(),
            message: self
                .result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

/// String arguments whose key names an identifier
pub fn invocation_identifiers(invocation: &ToolInvocation) -> Vec<(String, String)> {
    invocation
        .arguments
        .iter()
        .filter(|(key, _)| key.ends_with("Id") || key.ends_with("ID"))
        .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
        .collect()
}

/// Sequential tool executor
pub struct ToolExecutor<'a> {
    registry: &'a ToolRegistry,
    content_tool: &'a str,
    content_argument: &'a str,
    allowed: Option<&'a [String]>,
}

impl<'a> ToolExecutor<'a> {
    /// Create an executor. `content_tool` receives the utterance as its
    /// `content_argument` when the model leaves it out.
    pub fn new(registry: &'a ToolRegistry, content_tool: &'a str, content_argument: &'a str) -> Self {
        Self {
            registry,
            content_tool,
            content_argument,
            allowed: None,
        }
    }

    /// Restrict execution to the given tool names
    pub fn with_allowed(mut self, allowed: Option<&'a [String]>) -> Self {
        self.allowed = allowed;
        self
    }

    /// Execute invocations from a model reply, in order.
    pub async fn execute_all(
        &self,
        invocations: &[ToolInvocation],
        context: &ToolContext,
    ) -> Vec<ExecutedInvocation> {
        let mut executed = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            executed.push(self.run(invocation, context, false).await);
        }
        executed
    }

    /// Re-run a previewed invocation with its commit switch on.
    pub async fn commit(&self, invocation: &ToolInvocation, context: &ToolContext) -> ExecutedInvocation {
        self.run(invocation, context, true).await
    }

    async fn run(
        &self,
        invocation: &ToolInvocation,
        context: &ToolContext,
        commit: bool,
    ) -> ExecutedInvocation {
        let Some(tool) = self.registry.get(&invocation.tool) else {
            tracing::warn!(target: "bizdesk.tools", tool = %invocation.tool, "unknown tool requested");
            return ExecutedInvocation {
                invocation: invocation.clone(),
                canonical: None,
                role: ToolRole::Plain,
                phase: ExecutionPhase::Direct,
                result: ToolResult::failure(UNKNOWN_TOOL),
            };
        };
        let name = tool.name().to_string();

        let mut prepared = invocation.clone();
        if name == self.content_tool && prepared.str_arg(self.content_argument).is_none() {
            prepared.arguments.insert(
                self.content_argument.to_string(),
                Value::String(context.utterance.clone()),
            );
        }

        let phase = match tool.commit_switch() {
            Some(switch) => {
                prepared
                    .arguments
                    .insert(switch.to_string(), Value::Bool(commit));
                if commit {
                    ExecutionPhase::Commit
                } else {
                    ExecutionPhase::Preview
                }
            }
            None => ExecutionPhase::Direct,
        };

        if let Some(allowed) = self.allowed {
            if !allowed.iter().any(|a| a == &name) {
                tracing::warn!(target: "bizdesk.tools", tool = %name, "tool not allowed for active agent");
                return ExecutedInvocation {
                    invocation: prepared,
                    canonical: Some(name.clone()),
                    role: tool.role(),
                    phase,
                    result: ToolResult::failure(BizdeskError::ToolNotAllowed(name).to_string()),
                };
            }
        }

        tracing::debug!(target: "bizdesk.tools", tool = %name, phase = ?phase, "executing tool");
        let arguments = Value::Object(prepared.arguments.clone());
        let result = match tool.execute(arguments, context).await {
            Ok(result) => result,
            Err(err) => ToolResult::failure(err.to_string()),
        };
        if !result.success {
            tracing::warn!(
                target: "bizdesk.tools",
                tool = %name,
                identifiers = ?invocation_identifiers(&prepared),
                error = result.error.as_deref().unwrap_or(""),
                "tool execution failed"
            );
        }

        ExecutedInvocation {
            invocation: prepared,
            canonical: Some(name),
            role: tool.role(),
            phase,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ModelSelection;
    use crate::tools::test_support::EchoTool;
    use serde_json::json;
    use std::sync::Arc;

    fn invocation(tool: &str, args: Value) -> ToolInvocation {
        let Value::Object(map) = args else {
            panic!("arguments must be an object")
        };
        ToolInvocation::new(tool, map)
    }

    fn context(utterance: &str) -> ToolContext {
        ToolContext::new(utterance, ModelSelection::for_model("gpt-5-mini"))
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_block_others() {
        let echo = Arc::new(EchoTool::new("echo"));
        let mut registry = ToolRegistry::new();
        registry.register(echo.clone());
        let executor = ToolExecutor::new(&registry, "format", "rawContent");

        let results = executor
            .execute_all(
                &[
                    invocation("echo", json!({"n": 1})),
                    invocation("nope", json!({})),
                    invocation("echo", json!({"n": 2})),
                ],
                &context("hi"),
            )
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].result.success);
        assert_eq!(results[1].result.error.as_deref(), Some(UNKNOWN_TOOL));
        assert!(results[2].result.success);
        assert_eq!(echo.calls(), vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn test_content_tool_gets_utterance_default() {
        let format = Arc::new(EchoTool::new("format"));
        let mut registry = ToolRegistry::new();
        registry.register(format.clone());
        let executor = ToolExecutor::new(&registry, "format", "rawContent");

        executor
            .execute_all(&[invocation("format", json!({}))], &context("本日の議題"))
            .await;
        executor
            .execute_all(
                &[invocation("format", json!({"rawContent": "explicit"}))],
                &context("ignored"),
            )
            .await;

        let calls = format.calls();
        assert_eq!(calls[0]["rawContent"], "本日の議題");
        assert_eq!(calls[1]["rawContent"], "explicit");
    }

    #[tokio::test]
    async fn test_other_tools_get_no_default() {
        let echo = Arc::new(EchoTool::new("echo"));
        let mut registry = ToolRegistry::new();
        registry.register(echo.clone());
        let executor = ToolExecutor::new(&registry, "format", "rawContent");
        executor
            .execute_all(&[invocation("echo", json!({}))], &context("text"))
            .await;
        assert!(echo.calls()[0].get("rawContent").is_none());
    }

    #[tokio::test]
    async fn test_state_changing_tool_forced_to_preview() {
        let mut tool = EchoTool::new("save");
        tool.commit_switch = Some("save");
        let tool = Arc::new(tool);
        let mut registry = ToolRegistry::new();
        registry.register(tool.clone());
        let executor = ToolExecutor::new(&registry, "format", "rawContent");

        let results = executor
            .execute_all(&[invocation("save", json!({"save": true}))], &context("x"))
            .await;
        assert_eq!(results[0].phase, ExecutionPhase::Preview);
        assert!(results[0].is_pending_preview());
        assert_eq!(tool.calls()[0]["save"], false);

        let committed = executor.commit(&results[0].invocation, &context("はい")).await;
        assert_eq!(committed.phase, ExecutionPhase::Commit);
        assert_eq!(tool.calls()[1]["save"], true);
    }

    #[tokio::test]
    async fn test_allowed_tools_enforced() {
        let echo = Arc::new(EchoTool::new("echo"));
        let mut registry = ToolRegistry::new();
        registry.register(echo.clone());
        let allowed = vec!["other".to_string()];
        let executor =
            ToolExecutor::new(&registry, "format", "rawContent").with_allowed(Some(&allowed));

        let results = executor
            .execute_all(&[invocation("echo", json!({}))], &context("x"))
            .await;
        assert!(!results[0].result.success);
        assert!(results[0]
            .result
            .error
            .as_deref()
            .unwrap()
            .contains("not allowed"));
        assert!(echo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_error_becomes_failure_with_identifiers() {
        let mut tool = EchoTool::new("echo");
        tool.fail = true;
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(tool));
        let executor = ToolExecutor::new(&registry, "format", "rawContent");

        let results = executor
            .execute_all(
                &[invocation("echo", json!({"meetingNoteId": "m1", "note": "x"}))],
                &context("x"),
            )
            .await;
        let err = results[0].failure().unwrap();
        match err {
            BizdeskError::ToolExecutionFailed {
                tool, identifiers, ..
            } => {
                assert_eq!(tool, "echo");
                assert_eq!(identifiers, vec![("meetingNoteId".to_string(), "m1".to_string())]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
