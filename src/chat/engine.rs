// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Turn controller
//!
//! Drives one user turn end to end:
//!
//! 1. slot extraction against the session's page and sticky ids
//! 2. confirmation check (commit, item choice, or discard of a preview)
//! 3. retrieval context, backend call, directive parsing, tool execution
//! 4. grounding and organization re-ask calls when their triggers fire
//! 5. session update and replacement of the loading placeholder
//!
//! The controller is the only writer of [`Session`]. State changes are
//! applied after the turn's asynchronous work has resolved, and every
//! failure ends up as an assistant message in place of the placeholder.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::agents::Agent;
use crate::config::EngineConfig;
use crate::context::{append_sources, fetch_or_empty, RetrievalProvider};
use crate::error::{BizdeskError, Result};
use crate::llm::backend::BackendResolver;
use crate::llm::provider::{ModelSelection, ToolCall};
use crate::store::MeetingNoteStore;
use crate::tools::builtin::CREATE_ORGANIZATION;
use crate::tools::{
    ExecutedInvocation, ToolContext, ToolExecutor, ToolInvocation, ToolRegistry,
};

use super::confirmation::{
    classify, extract_previewed_content, item_question, restore_from_history, ConfirmationState,
    Decision, PendingCommit,
};
use super::directive::{excise_spans, parse_directives};
use super::grounding::{
    grounding_messages, needs_search_grounding, organization_reask, reask_messages,
};
use super::intent::{extract_slots, has_inline_content, Slots};
use super::prompt::{build_messages, build_system_prompt, PromptParts};
use super::render::{compose_reply, replace_spans};
use super::session::{Message, PageContext, Session, StickyIds};

/// Reply after a successful content save
pub const SAVED_MESSAGE: &str = "✅ 議事録の内容を更新しました。";
/// Reply when the previewed content cannot be recovered
pub const MISSING_PREVIEW_MESSAGE: &str =
    "❌ 前回の整形結果が見つかりませんでした。もう一度内容を送信してください。";

/// Collaborators of the turn controller
#[derive(Clone)]
pub struct EngineDeps {
    pub resolver: Arc<dyn BackendResolver>,
    pub registry: Arc<ToolRegistry>,
    pub retrieval: Arc<dyn RetrievalProvider>,
    pub meeting_notes: Arc<dyn MeetingNoteStore>,
    pub config: EngineConfig,
}

/// State produced by a turn, applied once it resolves
struct TurnOutcome {
    reply: String,
    confirmation: ConfirmationState,
    sticky: StickyIds,
}

impl TurnOutcome {
    fn new(reply: impl Into<String>, confirmation: ConfirmationState, sticky: StickyIds) -> Self {
        Self {
            reply: reply.into(),
            confirmation,
            sticky,
        }
    }
}

fn content_request(meeting_note_id: &str) -> String {
    format!(
        "議事録ID「{}」を確認しました。\n\n整形してほしい内容を教えてください。",
        meeting_note_id
    )
}

fn typed_invocation(call: ToolCall) -> Option<ToolInvocation> {
    match call.arguments {
        Value::Object(arguments) => Some(ToolInvocation::new(call.name, arguments)),
        Value::Null => Some(ToolInvocation::new(call.name, serde_json::Map::new())),
        other => {
            let warning = BizdeskError::MalformedDirective(format!(
                "{}: typed call arguments are not an object ({})",
                call.name, other
            ));
            tracing::warn!(target: "bizdesk.chat.directive", %warning, "typed call dropped");
            None
        }
    }
}

/// Sticky ids confirmed by the content tool's own result
fn sticky_from_results(mut sticky: StickyIds, executed: &[ExecutedInvocation], content_tool: &str) -> StickyIds {
    for item in executed
        .iter()
        .filter(|e| e.tool_name() == content_tool && e.result.success)
    {
        if let Some(id) = item.result.data["meetingNoteId"].as_str() {
            if sticky.meeting_note_id.as_deref() != Some(id) {
                sticky.item_id = None;
            }
            sticky.meeting_note_id = Some(id.to_string());
        }
        if let Some(id) = item.result.data["itemId"].as_str() {
            sticky.item_id = Some(id.to_string());
        }
    }
    sticky
}

/// Per-session driver exposed to the view layer
pub struct TurnController {
    deps: EngineDeps,
    session: Session,
    updates: watch::Sender<Vec<Message>>,
}

impl TurnController {
    pub fn new(deps: EngineDeps, model_selection: ModelSelection) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            deps,
            session: Session::new(model_selection),
            updates,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Read-only message list
    pub fn messages(&self) -> &[Message] {
        self.session.messages()
    }

    /// Observe the message list; a new value is published on every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.session.messages.clone());
    }

    pub fn set_page_context(&mut self, page: PageContext) {
        self.session.page = page;
    }

    /// Select an agent, or deselect with `None`.
    pub fn select_agent(&mut self, agent: Option<Agent>) {
        self.session.clear_agent_state();
        self.session.remove_announcements();
        self.session.model_selection = agent
            .as_ref()
            .and_then(|a| a.backend_preference.clone())
            .unwrap_or_else(|| self.session.default_selection.clone());
        match &agent {
            Some(agent) => {
                tracing::info!(target: "bizdesk.chat.engine", agent = %agent.id, "agent selected");
                self.session.push(Message::announcement(agent.announcement()));
            }
            None => tracing::info!(target: "bizdesk.chat.engine", "agent deselected"),
        }
        self.session.active_agent = agent;
        self.publish();
    }

    /// Restore a conversation captured earlier.
    ///
    /// A trailing preview becomes pending again; its content is recovered
    /// from the message text at commit time.
    pub fn resume(&mut self, messages: Vec<Message>) {
        self.session.messages = messages.into_iter().filter(|m| !m.is_loading()).collect();
        self.session.confirmation =
            restore_from_history(&self.session.messages, &self.deps.config.content_tool);
        if let Some(pending) = self.session.confirmation.pending() {
            if let Some(id) = pending.invocations.first().and_then(|i| i.str_arg("meetingNoteId")) {
                self.session.sticky.meeting_note_id = Some(id.to_string());
            }
            if let Some(id) = pending.invocations.first().and_then(|i| i.str_arg("itemId")) {
                self.session.sticky.item_id = Some(id.to_string());
            }
        }
        self.publish();
    }

    /// Drop the conversation and everything derived from it.
    pub fn close(&mut self) {
        self.session.messages.clear();
        self.session.clear_agent_state();
        self.session.active_agent = None;
        self.session.model_selection = self.session.default_selection.clone();
        self.publish();
        tracing::debug!(target: "bizdesk.chat.engine", session = %self.session.id, "session closed");
    }

    /// Process one utterance and return the assistant message it produced.
    ///
    /// Never fails: errors become the assistant message. Blank input is
    /// ignored and returns `None`.
    pub async fn send_utterance(&mut self, text: &str) -> Option<Message> {
        let utterance = text.trim();
        if utterance.is_empty() {
            return None;
        }
        let user_id = self.session.push(Message::user(utterance));
        let loading_id = self.session.push(Message::loading());
        self.publish();

        let slots = extract_slots(utterance, &self.session.page, &self.session.sticky);
        let sticky = slots.to_sticky(&self.session.sticky);

        let outcome = self
            .run_turn(utterance, user_id, loading_id, &slots, sticky.clone())
            .await;

        let reply = match outcome {
            Ok(outcome) => {
                self.session.sticky = outcome.sticky;
                self.session.confirmation = outcome.confirmation;
                outcome.reply
            }
            Err(err) => {
                tracing::warn!(target: "bizdesk.chat.engine", error = %err, "turn failed");
                self.session.sticky = sticky;
                self.session.confirmation = ConfirmationState::Idle;
                err.user_message()
            }
        };
        self.session.replace(loading_id, reply);
        self.publish();
        self.session
            .messages
            .iter()
            .find(|m| m.id == loading_id)
            .cloned()
    }

    fn executor(&self) -> ToolExecutor<'_> {
        ToolExecutor::new(
            &self.deps.registry,
            &self.deps.config.content_tool,
            &self.deps.config.content_argument,
        )
        .with_allowed(self.session.allowed_tools())
    }

    fn content_tool_available(&self) -> bool {
        let name = &self.deps.config.content_tool;
        self.deps.registry.get(name).is_some()
            && self
                .session
                .allowed_tools()
                .map_or(true, |allowed| allowed.iter().any(|a| a == name))
    }

    fn tool_context(&self, utterance: &str, slots: &Slots, sticky: &StickyIds) -> ToolContext {
        ToolContext::new(utterance, self.session.model_selection.clone())
            .with_organization(slots.organization_id().map(str::to_string))
            .with_sticky(sticky.clone())
    }

    async fn run_turn(
        &self,
        utterance: &str,
        user_id: Uuid,
        reply_id: Uuid,
        slots: &Slots,
        sticky: StickyIds,
    ) -> Result<TurnOutcome> {
        let config = &self.deps.config;

        match classify(&self.session.confirmation, utterance) {
            Decision::Commit(pending) => {
                return Ok(self.commit(pending, utterance, slots, sticky).await);
            }
            Decision::CommitWithItem {
                mut pending,
                item_id,
            } => {
                for invocation in pending
                    .invocations
                    .iter_mut()
                    .filter(|i| i.tool == config.content_tool)
                {
                    invocation
                        .arguments
                        .insert("itemId".to_string(), Value::String(item_id.clone()));
                }
                let mut sticky = sticky;
                sticky.item_id = Some(item_id);
                return Ok(self.commit(pending, utterance, slots, sticky).await);
            }
            Decision::Discard => {
                tracing::debug!(target: "bizdesk.chat.confirm", "pending preview discarded");
            }
            Decision::Proceed => {}
        }

        if let Some(meeting_note_id) = slots.mentioned_meeting_note_id() {
            if self.content_tool_available()
                && !has_inline_content(utterance, config.inline_content_min_chars)
            {
                tracing::debug!(target: "bizdesk.chat.engine", meeting_note_id, "waiting for content");
                return Ok(TurnOutcome::new(
                    content_request(meeting_note_id),
                    ConfirmationState::Idle,
                    sticky,
                ));
            }
        }

        let scope = slots.organization_id();
        let retrieval = fetch_or_empty(self.deps.retrieval.as_ref(), utterance, scope).await;

        let backend = self.deps.resolver.resolve(&self.session.model_selection)?;
        let tools = self.deps.registry.list_allowed(self.session.allowed_tools());
        let system = build_system_prompt(&PromptParts {
            agent: self.session.active_agent(),
            retrieval: &retrieval,
            tools: &tools,
            slots,
        });
        let history = self.session.history_window(user_id, config.history_window);
        let messages = build_messages(system, &history, utterance);

        let native_tools = if config.native_tool_calls {
            tools.clone()
        } else {
            Vec::new()
        };
        let reply = backend.complete_with_tools(&messages, native_tools).await?;

        let parsed = parse_directives(&reply.text);
        let mut invocations: Vec<ToolInvocation> = reply
            .tool_calls
            .into_iter()
            .filter_map(typed_invocation)
            .collect();
        invocations.extend(parsed.invocations.iter().cloned());

        let context = self.tool_context(utterance, slots, &sticky);
        let executor = self.executor();
        let mut executed = executor.execute_all(&invocations, &context).await;
        let mut body = replace_spans(&parsed.text, &executed);

        if needs_search_grounding(&executed) {
            let grounded = backend
                .complete(&grounding_messages(&messages, utterance, &executed))
                .await?;
            let parsed = parse_directives(&grounded);
            body = excise_spans(
                &parsed.text,
                parsed.invocations.iter().map(|i| i.raw_span.as_str()),
            )
            .trim()
            .to_string();
        }

        if let Some(target) = organization_reask(&executed, utterance) {
            let second = backend
                .complete(&reask_messages(
                    &messages,
                    utterance,
                    &target,
                    CREATE_ORGANIZATION,
                ))
                .await?;
            let parsed = parse_directives(&second);
            let more = executor.execute_all(&parsed.invocations, &context).await;
            let extra = replace_spans(&parsed.text, &more);
            if !extra.is_empty() {
                body = format!("{}\n\n{}", body, extra);
            }
            executed.extend(more);
        }

        let confirmation = match PendingCommit::from_executed(&executed, &config.content_tool) {
            Some(pending) => {
                tracing::debug!(
                    target: "bizdesk.chat.confirm",
                    previews = pending.invocations.len(),
                    "preview awaiting confirmation"
                );
                ConfirmationState::Previewed(pending.with_message(reply_id))
            }
            None => ConfirmationState::Idle,
        };

        let reply = compose_reply(
            &body,
            &executed,
            &self.deps.registry,
            !confirmation.is_idle(),
        );
        let reply = append_sources(&reply, &retrieval.sources);
        let sticky = sticky_from_results(sticky, &executed, &config.content_tool);
        Ok(TurnOutcome::new(reply, confirmation, sticky))
    }

    /// Text of the message that showed the preview
    fn preview_text(&self, pending: &PendingCommit) -> Option<&str> {
        pending
            .preview_message_id
            .and_then(|id| self.session.messages.iter().find(|m| m.id == id))
            .or_else(|| self.session.last_assistant())
            .map(|m| m.content.as_str())
    }

    /// Run a confirmed preview for real.
    async fn commit(
        &self,
        mut pending: PendingCommit,
        utterance: &str,
        slots: &Slots,
        mut sticky: StickyIds,
    ) -> TurnOutcome {
        let config = &self.deps.config;

        if let Some(index) = pending
            .invocations
            .iter()
            .position(|i| i.tool == config.content_tool)
        {
            let content = pending
                .previewed_content
                .clone()
                .or_else(|| self.preview_text(&pending).and_then(extract_previewed_content));
            let Some(content) = content else {
                tracing::warn!(target: "bizdesk.chat.confirm", "previewed content not found");
                return TurnOutcome::new(MISSING_PREVIEW_MESSAGE, ConfirmationState::Idle, sticky);
            };
            pending.previewed_content = Some(content.clone());

            let invocation = &mut pending.invocations[index];
            invocation
                .arguments
                .insert(config.content_argument.clone(), Value::String(content));

            let meeting_note_id = invocation
                .str_arg("meetingNoteId")
                .map(str::to_string)
                .or_else(|| sticky.meeting_note_id.clone());
            let item_id = invocation.str_arg("itemId").map(str::to_string).or_else(|| {
                sticky
                    .item_id
                    .clone()
                    .filter(|_| meeting_note_id == sticky.meeting_note_id)
            });
            if let Some(id) = &meeting_note_id {
                invocation
                    .arguments
                    .insert("meetingNoteId".to_string(), Value::String(id.clone()));
            }

            match (meeting_note_id, item_id) {
                (_, Some(item_id)) => {
                    invocation
                        .arguments
                        .insert("itemId".to_string(), Value::String(item_id));
                }
                (None, None) => {
                    return TurnOutcome::new(
                        "❌ 議事録IDが指定されていません。「議事録ID: xxx」の形式で指定してください。",
                        ConfirmationState::Previewed(pending),
                        sticky,
                    );
                }
                (Some(meeting_note_id), None) => {
                    return match self.deps.meeting_notes.item_candidates(&meeting_note_id).await {
                        Ok(candidates) if !candidates.is_empty() => {
                            tracing::debug!(
                                target: "bizdesk.chat.confirm",
                                candidates = candidates.len(),
                                "waiting for item choice"
                            );
                            TurnOutcome::new(
                                item_question(&candidates),
                                ConfirmationState::AwaitingItem {
                                    pending,
                                    candidates,
                                },
                                sticky,
                            )
                        }
                        Ok(_) => TurnOutcome::new(
                            format!(
                                "❌ 議事録「{}」に保存先のアイテムがありません。先にアイテムを作成してください。",
                                meeting_note_id
                            ),
                            ConfirmationState::Previewed(pending),
                            sticky,
                        ),
                        Err(err) => TurnOutcome::new(
                            err.user_message(),
                            ConfirmationState::Previewed(pending),
                            sticky,
                        ),
                    };
                }
            }
        }

        let context = self.tool_context(utterance, slots, &sticky);
        let executor = self.executor();
        let mut lines = Vec::new();
        for invocation in &pending.invocations {
            let done = executor.commit(invocation, &context).await;
            if let Some(err) = done.failure() {
                tracing::warn!(target: "bizdesk.chat.confirm", tool = done.tool_name(), error = %err, "commit failed");
                lines.push(self.commit_failure(&done, &err));
                return TurnOutcome::new(lines.join("\n"), ConfirmationState::Idle, sticky);
            }
            tracing::info!(target: "bizdesk.chat.confirm", tool = done.tool_name(), "committed");
            if done.tool_name() == config.content_tool {
                if let Some(id) = done.invocation.str_arg("meetingNoteId") {
                    sticky.meeting_note_id = Some(id.to_string());
                }
                if let Some(id) = done.invocation.str_arg("itemId") {
                    sticky.item_id = Some(id.to_string());
                }
                lines.push(SAVED_MESSAGE.to_string());
            } else if let Some(tool) = self.deps.registry.get(&done.invocation.tool) {
                lines.push(tool.render_result(&done.invocation, &done.result));
            }
        }
        TurnOutcome::new(lines.join("\n"), ConfirmationState::Idle, sticky)
    }

    fn commit_failure(&self, done: &ExecutedInvocation, err: &BizdeskError) -> String {
        if done.tool_name() != self.deps.config.content_tool {
            return err.user_message();
        }
        let detail = done.result.error.as_deref().unwrap_or("不明なエラー");
        format!(
            "❌ 議事録の保存に失敗しました。\n\n詳細: {}\n\n議事録ID: {}\nアイテムID: {}",
            detail,
            done.invocation.str_arg("meetingNoteId").unwrap_or("未指定"),
            done.invocation.str_arg("itemId").unwrap_or("未指定")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{find_builtin, MEETING_NOTE_AGENT};
    use crate::context::NoRetrieval;
    use crate::llm::backend::FixedBackendResolver;
    use crate::llm::mock_provider::{MockFailure, MockProvider, MockReply};
    use crate::store::InMemoryStore;
    use crate::tools::builtin::BuiltinServices;
    use std::time::Duration;

    fn controller(provider: Arc<MockProvider>, timeout: Duration) -> TurnController {
        let store = Arc::new(InMemoryStore::new());
        let resolver: Arc<dyn BackendResolver> =
            Arc::new(FixedBackendResolver::new(provider).with_timeout(timeout));
        let registry = ToolRegistry::with_builtins(&BuiltinServices {
            organizations: store.clone(),
            meeting_notes: store.clone(),
            knowledge: store.clone(),
            resolver: resolver.clone(),
        });
        TurnController::new(
            EngineDeps {
                resolver,
                registry: Arc::new(registry),
                retrieval: Arc::new(NoRetrieval),
                meeting_notes: store,
                config: EngineConfig::default(),
            },
            ModelSelection::for_model("gpt-5-mini"),
        )
    }

    #[tokio::test]
    async fn test_plain_reply_replaces_placeholder() {
        let provider = Arc::new(MockProvider::with_texts(["こんにちは"]));
        let mut controller = controller(provider.clone(), Duration::from_secs(5));
        let reply = controller.send_utterance("やあ").await.unwrap();
        assert_eq!(reply.content, "こんにちは");
        assert_eq!(controller.messages().len(), 2);
        assert!(controller.messages().iter().all(|m| !m.is_loading()));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let provider = Arc::new(MockProvider::new());
        let mut controller = controller(provider.clone(), Duration::from_secs(5));
        assert!(controller.send_utterance("   ").await.is_none());
        assert!(controller.messages().is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_resolves_placeholder() {
        let provider = Arc::new(
            MockProvider::with_texts(["遅い回答"]).with_delay(Duration::from_millis(200)),
        );
        let mut controller = controller(provider, Duration::from_millis(20));
        let reply = controller.send_utterance("長い質問").await.unwrap();
        assert!(reply.content.contains("タイムアウト"));
        assert!(!reply.is_loading());
    }

    #[tokio::test]
    async fn test_backend_rejection_keeps_session_usable() {
        let provider = Arc::new(MockProvider::with_replies(vec![
            MockReply::failure(MockFailure::Rejected {
                status: 500,
                payload: "{\"error\":\"overloaded\"}".to_string(),
            }),
            MockReply::text("復旧しました"),
        ]));
        let mut controller = controller(provider, Duration::from_secs(5));
        let first = controller.send_utterance("質問1").await.unwrap();
        assert!(first.content.contains("overloaded"));
        let second = controller.send_utterance("質問2").await.unwrap();
        assert_eq!(second.content, "復旧しました");
    }

    #[tokio::test]
    async fn test_select_agent_announces_and_clears_sticky() {
        let provider = Arc::new(MockProvider::new());
        let mut controller = controller(provider, Duration::from_secs(5));
        controller.send_utterance("議事録ID: m1 を整形して").await;
        assert_eq!(controller.session().sticky().meeting_note_id.as_deref(), Some("m1"));

        let mut rx = controller.subscribe();
        let agent = find_builtin(MEETING_NOTE_AGENT).unwrap();
        controller.select_agent(Some(agent.clone()));
        controller.select_agent(Some(agent));
        assert!(controller.session().sticky().is_empty());
        let announcements = controller
            .messages()
            .iter()
            .filter(|m| m.content.starts_with("🤖 **Agentが選択されました"))
            .count();
        assert_eq!(announcements, 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), controller.messages().len());

        controller.select_agent(None);
        assert!(controller.session().active_agent().is_none());
    }

    #[tokio::test]
    async fn test_close_clears_everything() {
        let provider = Arc::new(MockProvider::new());
        let mut controller = controller(provider, Duration::from_secs(5));
        controller.send_utterance("やあ").await;
        controller.close();
        assert!(controller.messages().is_empty());
        assert!(controller.session().confirmation().is_idle());
    }
}
