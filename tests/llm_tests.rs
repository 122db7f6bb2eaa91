// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;
use std::time::Duration;

use bizdesk::llm::backend::ModelBackend;
use bizdesk::llm::message::PromptMessage;
use bizdesk::llm::provider::{CompletionRequest, LlmProvider, ToolDefinition};
use bizdesk::llm::providers::{AnthropicProvider, GeminiProvider, OllamaProvider, OpenAiProvider};
use bizdesk::tools::SchemaBuilder;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(model: &str) -> CompletionRequest {
    CompletionRequest::new(
        model,
        vec![
            PromptMessage::system("あなたはアシスタントです"),
            PromptMessage::user("こんにちは"),
        ],
    )
    .with_max_tokens(500)
    .with_temperature(0.2)
}

fn search_tool() -> ToolDefinition {
    ToolDefinition {
        name: "search_knowledge_graph".to_string(),
        description: "ナレッジグラフを検索".to_string(),
        input_schema: SchemaBuilder::new()
            .string("query", "検索クエリ", true)
            .build(),
    }
}

#[tokio::test]
async fn test_ollama_chat_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "qwen2.5:latest",
            "stream": false,
            "options": {"num_predict": 500}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen2.5:latest",
            "message": {"role": "assistant", "content": "  こんにちは！ "},
            "prompt_eval_count": 12,
            "eval_count": 4
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::with_base_url(server.uri());
    let response = provider.complete(request("qwen2.5:latest")).await.unwrap();
    assert_eq!(response.text, "こんにちは！");
    assert_eq!(response.usage.input_tokens, 12);
    assert!(response.tool_calls.is_empty());
}

#[tokio::test]
async fn test_openai_gpt5_uses_completion_tokens_and_no_temperature() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-5-mini",
            "max_completion_tokens": 4000,
            "messages": [
                {"role": "system", "content": "あなたはアシスタントです"},
                {"role": "user", "content": "こんにちは"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-5-mini",
            "choices": [{"message": {"role": "assistant", "content": "はい"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("sk-test", server.uri());
    let response = provider.complete(request("gpt-5-mini")).await.unwrap();
    assert_eq!(response.text, "はい");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("temperature").is_none());
    assert!(body.get("max_tokens").is_none());
}

#[tokio::test]
async fn test_openai_native_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "max_tokens": 500,
            "tools": [{"type": "function", "function": {"name": "search_knowledge_graph"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "search_knowledge_graph",
                        "arguments": "{\"query\":\"売上\"}"
                    }
                }]
            }}]
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("sk-test", server.uri());
    let response = provider
        .complete(request("gpt-4o").with_tools(vec![search_tool()]))
        .await
        .unwrap();
    assert_eq!(response.text, "");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "search_knowledge_graph");
    assert_eq!(response.tool_calls[0].arguments["query"], "売上");
}

#[tokio::test]
async fn test_gemini_folds_system_and_maps_roles() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(query_param("key", "g-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "了解です"}]}}],
            "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::with_base_url("g-key", server.uri());
    let mut req = request("gemini-2.0-flash");
    req.messages.push(PromptMessage::assistant("前の回答"));
    let response = provider.complete(req).await.unwrap();
    assert_eq!(response.text, "了解です");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[0]["role"], "user");
    let first = contents[0]["parts"][0]["text"].as_str().unwrap();
    assert!(first.contains("あなたはアシスタントです"));
    assert!(first.ends_with("こんにちは"));
    assert_eq!(contents[1]["role"], "model");
}

#[tokio::test]
async fn test_gemini_without_candidates_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let provider = GeminiProvider::with_base_url("g-key", server.uri());
    let err = provider
        .complete(request("gemini-2.0-flash"))
        .await
        .unwrap_err();
    assert!(err.is_backend_rejected());
}

#[tokio::test]
async fn test_anthropic_system_field_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "a-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "system": "あなたはアシスタントです",
            "messages": [{"role": "user", "content": "こんにちは"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "claude-sonnet-4",
            "content": [
                {"type": "text", "text": "検索します"},
                {"type": "tool_use", "id": "tu_1", "name": "search_knowledge_graph", "input": {"query": "売上"}}
            ],
            "usage": {"input_tokens": 20, "output_tokens": 6}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("a-key", server.uri());
    let response = provider
        .complete(request("claude-sonnet-4").with_tools(vec![search_tool()]))
        .await
        .unwrap();
    assert_eq!(response.text, "検索します");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].arguments, json!({"query": "売上"}));
    assert_eq!(response.usage.output_tokens, 6);
}

#[tokio::test]
async fn test_non_success_status_keeps_raw_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("{\"error\":\"rate_limited\"}"),
        )
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("sk-test", server.uri());
    let err = provider.complete(request("gpt-4o")).await.unwrap_err();
    assert!(err.is_backend_rejected());
    let message = err.user_message();
    assert!(message.contains("HTTP 429"));
    assert!(message.contains("rate_limited"));
}

#[tokio::test]
async fn test_undecodable_payload_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("a-key", server.uri());
    let err = provider.complete(request("claude-sonnet-4")).await.unwrap_err();
    assert!(err.is_backend_rejected());
    assert!(err.user_message().contains("proxy error"));
}

#[tokio::test]
async fn test_backend_timeout_cancels_slow_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({"message": {"role": "assistant", "content": "遅い"}})),
        )
        .mount(&server)
        .await;

    let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::with_base_url(server.uri()));
    let backend =
        ModelBackend::new(provider, "llama3:latest").with_timeout(Duration::from_millis(100));
    let err = backend
        .complete(&[PromptMessage::user("質問")])
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}
