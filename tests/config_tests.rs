// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use bizdesk::config::Settings;
use bizdesk::error::BizdeskError;
use bizdesk::llm::provider::ProviderKind;
use bizdesk::store::InMemoryStore;
use tempfile::TempDir;

#[test]
fn test_settings_default_values() {
    let settings = Settings::default();

    assert_eq!(settings.defaults.model, "gpt-5-mini");
    assert!((settings.defaults.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(settings.defaults.max_tokens, 2000);
    assert_eq!(settings.engine.history_window, 10);
    assert_eq!(settings.engine.request_timeout_secs, 120);
    assert_eq!(settings.engine.content_tool, "format_meeting_note_content");
    assert_eq!(settings.engine.content_argument, "rawContent");
    assert!(settings.engine.native_tool_calls);
    assert_eq!(settings.providers.ollama.base_url, "http://localhost:11434");
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::load_from(&dir.path().join("settings.json")).unwrap();
    assert_eq!(settings.defaults.model, "gpt-5-mini");
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{
            "providers": {
                "anthropic": {"api_key": "a-key", "api_key_env": "BIZDESK_TEST_CFG_UNSET_ANTHROPIC"}
            },
            "defaults": {"model": "claude-sonnet-4"},
            "engine": {"history_window": 4}
        }"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.defaults.model, "claude-sonnet-4");
    assert_eq!(settings.defaults.max_tokens, 2000);
    assert_eq!(settings.engine.history_window, 4);
    assert_eq!(settings.engine.request_timeout_secs, 120);
    assert_eq!(
        settings.get_api_key(ProviderKind::Anthropic).as_deref(),
        Some("a-key")
    );
    assert_eq!(settings.providers.openai.api_key_env, "OPENAI_API_KEY");
}

#[test]
fn test_invalid_engine_values_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"engine": {"request_timeout_secs": 0}}"#).unwrap();

    match Settings::load_from(&path) {
        Err(BizdeskError::Config(message)) => assert!(message.contains("request_timeout_secs")),
        other => panic!("expected config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_malformed_json_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        Settings::load_from(&path),
        Err(BizdeskError::Json(_))
    ));
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    let mut settings = Settings::default();
    settings.defaults.model = "gemini-2.0-flash".to_string();
    settings.providers.gemini.base_url = Some("http://127.0.0.1:9000".to_string());
    settings.save_to(&path).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded.defaults.model, "gemini-2.0-flash");
    assert_eq!(
        loaded.get_base_url(ProviderKind::Gemini).as_deref(),
        Some("http://127.0.0.1:9000")
    );
    // Keys are never written when absent.
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("api_key\""));
}

#[tokio::test]
async fn test_store_fixture_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.json");
    std::fs::write(
        &path,
        r#"{
            "meetingNotes": [{
                "id": "m1",
                "title": "週次定例",
                "items": [{"id": "i1", "title": "議題1", "content": ""}]
            }]
        }"#,
    )
    .unwrap();

    let store = InMemoryStore::load(&path).unwrap();
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.meeting_notes.len(), 1);
    assert_eq!(snapshot.meeting_notes[0].items[0].id, "i1");
}
