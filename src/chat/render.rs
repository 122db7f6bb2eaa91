// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Reply rendering
//!
//! Directive spans are swapped for a short marker and the rendered tool
//! results are appended in their own section.

use crate::tools::builtin::CONFIRM_MARKER;
use crate::tools::{ExecutedInvocation, ToolRegistry};

/// Heading of the appended results section
pub const RESULTS_HEADER: &str = "## Tool実行結果";

/// Marker left where a directive was
pub fn executed_marker(tool: &str) -> String {
    format!("[Tool \"{}\" を実行しました]", tool)
}

/// Replace each executed directive's span with its marker.
pub fn replace_spans(text: &str, executed: &[ExecutedInvocation]) -> String {
    let mut out = text.to_string();
    for item in executed {
        let span = &item.invocation.raw_span;
        if span.is_empty() {
            continue;
        }
        if let Some(pos) = out.find(span.as_str()) {
            out.replace_range(pos..pos + span.len(), &executed_marker(item.tool_name()));
        }
    }
    out.trim().to_string()
}

/// Results section, empty when nothing ran.
pub fn results_section(executed: &[ExecutedInvocation], registry: &ToolRegistry) -> String {
    if executed.is_empty() {
        return String::new();
    }
    let mut out = format!("{}\n", RESULTS_HEADER);
    for item in executed {
        let rendered = match (registry.get(&item.invocation.tool), item.failure()) {
            (None, _) => format!(
                "❌ Tool \"{}\" は存在しません（{}）",
                item.invocation.tool,
                item.result.error.as_deref().unwrap_or_default()
            ),
            (Some(_), Some(err)) => err.user_message(),
            (Some(tool), None) => tool.render_result(&item.invocation, &item.result),
        };
        out.push_str(&format!("\n### {}\n\n{}\n", item.tool_name(), rendered.trim()));
    }
    out
}

/// Generic question for previews whose rendering does not ask one
pub fn confirmation_question() -> String {
    format!(
        "{}: 上記の内容で実行しますか？「はい」と回答すると確定します。",
        CONFIRM_MARKER
    )
}

/// Assemble the displayed reply.
pub fn compose_reply(
    body: &str,
    executed: &[ExecutedInvocation],
    registry: &ToolRegistry,
    awaiting_confirmation: bool,
) -> String {
    let mut parts = Vec::new();
    if !body.trim().is_empty() {
        parts.push(body.trim().to_string());
    }
    let results = results_section(executed, registry);
    if !results.is_empty() {
        parts.push(results.trim_end().to_string());
    }
    let mut reply = parts.join("\n\n");
    if awaiting_confirmation && !reply.contains(CONFIRM_MARKER) {
        if !reply.is_empty() {
            reply.push_str("\n\n");
        }
        reply.push_str(&confirmation_question());
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::EchoTool;
    use crate::tools::{ExecutionPhase, ToolInvocation, ToolResult, ToolRole, UNKNOWN_TOOL};
    use serde_json::json;
    use std::sync::Arc;

    fn executed(tool: &str, span: &str, result: ToolResult) -> ExecutedInvocation {
        let mut invocation = ToolInvocation::new(tool, Default::default());
        invocation.raw_span = span.to_string();
        ExecutedInvocation {
            invocation,
            canonical: Some(tool.to_string()),
            role: ToolRole::Plain,
            phase: ExecutionPhase::Direct,
            result,
        }
    }

    #[test]
    fn test_replace_spans() {
        let span = "<tool_call name=\"echo\">{}</tool_call>";
        let text = format!("確認します。\n{}\n", span);
        let out = replace_spans(&text, &[executed("echo", span, ToolResult::success(json!({})))]);
        assert_eq!(out, "確認します。\n[Tool \"echo\" を実行しました]");
    }

    #[test]
    fn test_compose_with_results_and_question() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new("echo")));
        let ok = executed("echo", "", ToolResult::success(json!({"a": 1})));
        let mut missing = executed("ghost", "", ToolResult::failure(UNKNOWN_TOOL));
        missing.canonical = None;

        let reply = compose_reply("本文", &[ok, missing], &registry, true);
        assert!(reply.starts_with("本文\n\n## Tool実行結果"));
        assert!(reply.contains("### echo"));
        assert!(reply.contains("\"ghost\" は存在しません"));
        assert!(reply.ends_with("「はい」と回答すると確定します。"));
    }

    #[test]
    fn test_compose_plain() {
        let registry = ToolRegistry::new();
        assert_eq!(compose_reply(" 回答 ", &[], &registry, false), "回答");
    }
}
