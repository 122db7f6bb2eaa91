// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Directive parser
//!
//! Finds `<tool_call name="X"> {json} </tool_call>` blocks in a model reply.
//! Directives do not nest. A directive whose body is missing, unterminated or
//! not a JSON object is dropped with a warning and the rest of the reply is
//! still parsed. The reply text itself is returned untouched.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::BizdeskError;
use crate::tools::ToolInvocation;

const CLOSE_TAG: &str = "</tool_call>";

fn open_tag() -> &'static Regex {
    static OPEN_TAG: OnceLock<Regex> = OnceLock::new();
    OPEN_TAG.get_or_init(|| Regex::new(r#"<tool_call\s+name\s*=\s*"([^"]+)"\s*>"#).unwrap())
}

/// Output of a parse pass
#[derive(Debug, Default)]
pub struct ParsedReply {
    /// Reply text with every span still in place
    pub text: String,
    /// Well-formed directives in reply order
    pub invocations: Vec<ToolInvocation>,
    /// One entry per dropped directive
    pub warnings: Vec<BizdeskError>,
}

impl ParsedReply {
    pub fn has_directives(&self) -> bool {
        !self.invocations.is_empty()
    }
}

/// Strip a Markdown code fence some models wrap around the JSON body.
fn unfence(body: &str) -> &str {
    let body = body.trim();
    let Some(rest) = body.strip_prefix("```") else {
        return body;
    };
    let rest = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_body(name: &str, body: &str) -> Result<serde_json::Map<String, Value>, BizdeskError> {
    let body = unfence(body);
    if body.is_empty() {
        return Ok(serde_json::Map::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(BizdeskError::MalformedDirective(format!(
            "{}: body is not a JSON object ({})",
            name,
            json_kind(&other)
        ))),
        Err(err) => Err(BizdeskError::MalformedDirective(format!(
            "{}: invalid JSON body: {}",
            name, err
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse every directive in `reply`.
pub fn parse_directives(reply: &str) -> ParsedReply {
    let mut parsed = ParsedReply {
        text: reply.to_string(),
        ..Default::default()
    };
    let opens: Vec<_> = open_tag().captures_iter(reply).collect();

    for (index, caps) in opens.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let body_start = whole.end();
        let next_open = opens
            .get(index + 1)
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(reply.len());

        let Some(close_offset) = reply[body_start..].find(CLOSE_TAG) else {
            parsed.warnings.push(BizdeskError::MalformedDirective(format!(
                "{}: unterminated directive",
                name
            )));
            continue;
        };
        let close = body_start + close_offset;
        if close > next_open {
            // Another directive opens before this one closes
            parsed.warnings.push(BizdeskError::MalformedDirective(format!(
                "{}: nested or unterminated directive",
                name
            )));
            continue;
        }

        match parse_body(name, &reply[body_start..close]) {
            Ok(arguments) => parsed.invocations.push(ToolInvocation {
                tool: name.to_string(),
                arguments,
                raw_span: reply[whole.start()..close + CLOSE_TAG.len()].to_string(),
            }),
            Err(err) => parsed.warnings.push(err),
        }
    }

    for warning in &parsed.warnings {
        tracing::warn!(target: "bizdesk.chat.directive", %warning, "directive dropped");
    }
    tracing::debug!(
        target: "bizdesk.chat.directive",
        directives = parsed.invocations.len(),
        dropped = parsed.warnings.len(),
        "reply parsed"
    );
    parsed
}

/// Remove the given spans from `text`, first occurrence each.
pub fn excise_spans<'a>(text: &str, spans: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = text.to_string();
    for span in spans {
        if span.is_empty() {
            continue;
        }
        if let Some(pos) = out.find(span) {
            out.replace_range(pos..pos + span.len(), "");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_directive() {
        let reply = "検索します。\n<tool_call name=\"search_knowledge_graph\">{\"query\":\"Q\"}</tool_call>\n以上";
        let parsed = parse_directives(reply);
        assert_eq!(parsed.invocations.len(), 1);
        let inv = &parsed.invocations[0];
        assert_eq!(inv.tool, "search_knowledge_graph");
        assert_eq!(inv.arguments["query"], json!("Q"));
        assert!(inv.raw_span.starts_with("<tool_call"));
        assert!(inv.raw_span.ends_with("</tool_call>"));
        assert_eq!(parsed.text, reply);
    }

    #[test]
    fn test_multiline_and_fenced_body() {
        let reply = "<tool_call name=\"create_organization\">\n```json\n{\n  \"name\": \"営業部\",\n  \"parentId\": \"root\"\n}\n```\n</tool_call>";
        let parsed = parse_directives(reply);
        assert_eq!(parsed.invocations.len(), 1);
        assert_eq!(parsed.invocations[0].arguments["name"], json!("営業部"));
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_empty_body_is_empty_arguments() {
        let parsed = parse_directives("<tool_call name=\"get_organization_tree\"></tool_call>");
        assert_eq!(parsed.invocations.len(), 1);
        assert!(parsed.invocations[0].arguments.is_empty());
    }

    #[test]
    fn test_malformed_body_is_dropped() {
        let reply = concat!(
            "<tool_call name=\"a\">{\"x\": 1}</tool_call>",
            "<tool_call name=\"b\">{not json}</tool_call>",
            "<tool_call name=\"c\">[1, 2]</tool_call>",
            "<tool_call name=\"d\">{\"y\": 2}</tool_call>",
        );
        let parsed = parse_directives(reply);
        let names: Vec<&str> = parsed.invocations.iter().map(|i| i.tool.as_str()).collect();
        assert_eq!(names, vec!["a", "d"]);
        assert_eq!(parsed.warnings.len(), 2);
        assert!(matches!(parsed.warnings[0], BizdeskError::MalformedDirective(_)));
    }

    #[test]
    fn test_unterminated_directive() {
        let reply = "<tool_call name=\"a\">{\"x\": 1}</tool_call> text <tool_call name=\"b\">{\"y\": 2}";
        let parsed = parse_directives(reply);
        assert_eq!(parsed.invocations.len(), 1);
        assert_eq!(parsed.invocations[0].tool, "a");
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_nested_directive_drops_outer() {
        let reply = "<tool_call name=\"outer\">{\"a\": <tool_call name=\"inner\">{\"b\": 1}</tool_call>}</tool_call>";
        let parsed = parse_directives(reply);
        assert_eq!(parsed.invocations.len(), 1);
        assert_eq!(parsed.invocations[0].tool, "inner");
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_no_directives() {
        let parsed = parse_directives("ただの回答です。");
        assert!(!parsed.has_directives());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_excise_spans() {
        let reply = "前<tool_call name=\"a\">{}</tool_call>後";
        let parsed = parse_directives(reply);
        let text = excise_spans(&parsed.text, parsed.invocations.iter().map(|i| i.raw_span.as_str()));
        assert_eq!(text, "前後");
    }
}
