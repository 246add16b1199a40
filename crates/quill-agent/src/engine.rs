//! The stage loop.
//!
//! One call to [`StageEngine::run`] drives one invocation: the model is
//! prompted once per turn, its reply is parsed into a stage object, tool
//! requests are dispatched through the broker, and an [`AgentEvent`] is
//! pushed to the caller after every parsed turn.
//!
//! ```text
//!            ┌────────────── parse failure (corrective message) ──┐
//!            ▼                                                    │
//! prompt ──▶ LLM ──▶ parse ──▶ [toolUsed: dispatch + audit] ──▶ yield StageEvent
//!                                                                 │
//!                                          summary + next=done ──▶ done
//! ```

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use quill_context::DocumentLookup;
use quill_llm::{CompletionRequest, SharedBackend};
use quill_types::{ChatMessage, Conversation, SharedDocumentStore};

use crate::audit::{AuditTrail, ToolExecutionRecord};
use crate::broker::{SharedDispatcher, ToolOutcome};
use crate::catalog::ToolInvocation;
use crate::error::ParseError;
use crate::parse::{StageReply, parse_stage_reply};
use crate::prompt::{PromptFacts, build_prompt, corrective_message};
use crate::stage::{Stage, resolve_transition};

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// One parsed turn, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageEvent {
    pub stage: Stage,
    pub thought: String,
    pub content: String,
    pub next_stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_invocation: Option<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_outcome: Option<ToolOutcome>,
    /// Every dispatch so far, not just this turn's.
    pub tool_history: Vec<ToolExecutionRecord>,
}

/// Item of an [`AgentStream`].
///
/// A run ends with exactly one of: a `done` stage event, `Error`, or
/// `Stopped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentEvent {
    Stage(StageEvent),
    Error {
        message: String,
        #[serde(rename = "toolHistory")]
        tool_history: Vec<ToolExecutionRecord>,
    },
    Stopped,
}

impl AgentEvent {
    pub fn error(message: impl Into<String>, tool_history: Vec<ToolExecutionRecord>) -> Self {
        Self::Error {
            message: message.into(),
            tool_history,
        }
    }

    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        match self {
            AgentEvent::Stage(event) => event.stage == Stage::Done,
            AgentEvent::Error { .. } | AgentEvent::Stopped => true,
        }
    }
}

/// A boxed stream of agent events.
pub type AgentStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Limits and model settings for the loop.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub temperature: Option<f32>,
    /// Dispatches allowed per run before the loop is steered to summary.
    pub max_tool_calls: usize,
    /// Consecutive unparsable replies tolerated.
    pub max_parse_failures: usize,
    /// Model calls allowed per run.
    pub max_turns: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-pro".to_string(),
            temperature: None,
            max_tool_calls: 50,
            max_parse_failures: 3,
            max_turns: 100,
        }
    }
}

impl EngineConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Input for one run.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub document_id: String,
    pub instruction: String,
    /// Earlier messages the caller wants the model to see.
    pub history: Vec<ChatMessage>,
}

impl AgentRequest {
    pub fn new(document_id: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            instruction: instruction.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Drives the five-stage conversation for a document.
#[derive(Clone)]
pub struct StageEngine {
    backend: SharedBackend,
    tools: SharedDispatcher,
    documents: SharedDocumentStore,
    config: EngineConfig,
}

impl StageEngine {
    pub fn new(
        backend: SharedBackend,
        tools: SharedDispatcher,
        documents: SharedDocumentStore,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            tools,
            documents,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a run. Events are produced lazily as the stream is polled.
    ///
    /// Cancelling `cancel` ends the stream with a single
    /// [`AgentEvent::Stopped`], including while a model call is in flight.
    pub fn run(&self, request: AgentRequest, cancel: CancellationToken) -> AgentStream {
        let mut state = RunState::new(self.clone(), request);

        Box::pin(async_stream::stream! {
            if cancel.is_cancelled() {
                yield AgentEvent::Stopped;
                return;
            }

            let instructions = {
                let lookup = DocumentLookup::new(state.engine.documents.clone());
                PromptFacts::gather(&lookup, &state.document_id).await.render_instructions()
            };
            info!(
                run_id = %state.run_id,
                document_id = %state.document_id,
                backend = state.engine.backend.name(),
                "Starting agent run"
            );

            loop {
                if cancel.is_cancelled() {
                    info!(run_id = %state.run_id, "Agent run cancelled");
                    yield AgentEvent::Stopped;
                    return;
                }

                state.turns += 1;
                if state.turns > state.engine.config.max_turns {
                    warn!(run_id = %state.run_id, turns = state.turns - 1, "Turn limit reached");
                    yield AgentEvent::error(
                        format!(
                            "turn limit of {} reached without completing",
                            state.engine.config.max_turns
                        ),
                        state.audit.snapshot(),
                    );
                    return;
                }

                let current = state.current;
                let prompt = build_prompt(
                    &instructions,
                    &state.conversation,
                    &state.completed,
                    current,
                );
                let llm_request = CompletionRequest::new(
                    state.engine.config.model.clone(),
                    prompt,
                    current.token_budget(),
                )
                .with_optional_temperature(state.engine.config.temperature);
                debug!(
                    run_id = %state.run_id,
                    stage = %current,
                    turn = state.turns,
                    budget = current.token_budget(),
                    "Calling model"
                );

                let backend = state.engine.backend.clone();
                let response = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = backend.complete(llm_request) => Some(result),
                };

                let text = match response {
                    None => {
                        info!(
                            run_id = %state.run_id,
                            stage = %current,
                            "Agent run cancelled during model call"
                        );
                        yield AgentEvent::Stopped;
                        return;
                    }
                    Some(Err(e)) => {
                        warn!(
                            run_id = %state.run_id,
                            stage = %current,
                            error = %e,
                            "Model call failed"
                        );
                        yield AgentEvent::error(
                            format!("model call failed: {}", e),
                            state.audit.snapshot(),
                        );
                        return;
                    }
                    Some(Ok(response)) => response.text,
                };
                state.conversation.push_assistant(text.clone());

                let reply = match state.validate(parse_stage_reply(&text)) {
                    Ok(reply) => reply,
                    Err(e) => {
                        state.parse_failures += 1;
                        warn!(
                            run_id = %state.run_id,
                            stage = %current,
                            failures = state.parse_failures,
                            error = %e,
                            "Unparsable model reply"
                        );
                        if state.parse_failures >= state.engine.config.max_parse_failures {
                            yield AgentEvent::error(
                                format!(
                                    "giving up after {} unparsable replies: {}",
                                    state.parse_failures, e
                                ),
                                state.audit.snapshot(),
                            );
                            return;
                        }
                        state.conversation.push_user(corrective_message(&e, current));
                        continue;
                    }
                };
                state.parse_failures = 0;

                let event = state.apply(reply).await;
                let finished = event.stage == Stage::Summary && event.next_stage == Stage::Done;
                yield AgentEvent::Stage(event);

                if finished {
                    state.completed.push(Stage::Done);
                    info!(
                        run_id = %state.run_id,
                        turns = state.turns,
                        tool_calls = state.tool_calls,
                        "Agent run complete"
                    );
                    yield AgentEvent::Stage(state.done_event());
                    return;
                }
            }
        })
    }
}

impl std::fmt::Debug for StageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageEngine")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything owned by one in-flight run.
struct RunState {
    /// Correlates log lines of one run.
    run_id: Uuid,
    engine: StageEngine,
    document_id: String,
    conversation: Conversation,
    audit: AuditTrail,
    completed: Vec<Stage>,
    current: Stage,
    turns: usize,
    tool_calls: usize,
    parse_failures: usize,
}

impl RunState {
    fn new(engine: StageEngine, request: AgentRequest) -> Self {
        let mut conversation = Conversation::from_messages(request.history);
        conversation.push_user(request.instruction);
        Self {
            run_id: Uuid::new_v4(),
            engine,
            document_id: request.document_id,
            conversation,
            audit: AuditTrail::new(),
            completed: Vec::new(),
            current: Stage::Planning,
            turns: 0,
            tool_calls: 0,
            parse_failures: 0,
        }
    }

    /// Loop-level checks on top of the parser's.
    fn validate(&self, parsed: Result<StageReply, ParseError>) -> Result<StageReply, ParseError> {
        let reply = parsed?;
        if reply.stage != self.current {
            warn!(
                expected = %self.current,
                got = %reply.stage,
                "Model answered for a different stage"
            );
        }
        if self.current == Stage::ToolUsed && reply.tool_invocation.is_none() {
            return Err(ParseError::MissingToolInvocation);
        }
        Ok(reply)
    }

    /// Run the turn's side effects and advance to the next stage.
    async fn apply(&mut self, reply: StageReply) -> StageEvent {
        let stage = self.current;
        let mut next = reply.next_stage;

        let invocation = if stage == Stage::ToolUsed {
            reply.tool_invocation
        } else {
            None
        };

        let mut tool_outcome = None;
        if let Some(invocation) = &invocation {
            let outcome = self.engine.tools.dispatch(invocation, &self.document_id).await;
            self.tool_calls += 1;
            self.audit.record(invocation, &outcome);
            info!(
                run_id = %self.run_id,
                tool = %invocation.tool,
                success = outcome.success,
                tool_calls = self.tool_calls,
                "Tool dispatched"
            );
            self.conversation.push_user(outcome.feedback_message());
            if !outcome.success {
                next = Stage::ToolUsed;
            }
            tool_outcome = Some(outcome);
        }

        next = resolve_transition(stage, next);
        if self.tool_calls >= self.engine.config.max_tool_calls {
            let forced = if stage == Stage::Summary {
                Stage::Done
            } else {
                Stage::Summary
            };
            if forced != next {
                warn!(
                    run_id = %self.run_id,
                    tool_calls = self.tool_calls,
                    "Tool call limit reached, moving to summary"
                );
                self.conversation.push_user(
                    "The tool call limit has been reached. No more tools can be used. \
                     Summarize what was done for the user.",
                );
            }
            next = forced;
        }

        self.completed.push(stage);
        self.current = next;

        StageEvent {
            stage,
            thought: reply.thought,
            content: reply.content,
            next_stage: next,
            tool_invocation: invocation,
            tool_outcome,
            tool_history: self.audit.snapshot(),
        }
    }

    fn done_event(&self) -> StageEvent {
        StageEvent {
            stage: Stage::Done,
            thought: Stage::Done.as_str().to_string(),
            content: String::new(),
            next_stage: Stage::Done,
            tool_invocation: None,
            tool_outcome: None,
            tool_history: self.audit.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use quill_context::MemoryDocumentStore;
    use quill_llm::{MockBackend, MockResponse};
    use quill_types::{DocumentRecord, ProjectRecord, TemplateRecord};

    use crate::broker::{ToolBroker, ToolBrokerConfig, ToolDispatcher};
    use crate::catalog::ToolName;

    /// Scripted dispatcher; succeeds unless told otherwise.
    #[derive(Default)]
    struct ScriptedTools {
        failures: Mutex<Vec<bool>>,
        calls: Mutex<Vec<ToolInvocation>>,
    }

    impl ScriptedTools {
        fn failing_first(n: usize) -> Self {
            Self {
                failures: Mutex::new(vec![true; n]),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<ToolInvocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolDispatcher for ScriptedTools {
        async fn dispatch(&self, invocation: &ToolInvocation, _document_id: &str) -> ToolOutcome {
            self.calls.lock().unwrap().push(invocation.clone());
            let fail = {
                let mut failures = self.failures.lock().unwrap();
                if failures.is_empty() { false } else { failures.remove(0) }
            };
            if fail {
                ToolOutcome::failure(invocation.tool, "HTTP 500: boom")
            } else {
                ToolOutcome::success(invocation.tool, json!({"ok": true}))
            }
        }
    }

    fn reply(stage: &str, next: &str) -> String {
        json!({"stage": stage, "thought": "t", "content": format!("{stage} content"), "nextStage": next})
            .to_string()
    }

    fn tool_reply(next: &str) -> String {
        json!({
            "stage": "toolUsed",
            "thought": "t",
            "content": "reading",
            "nextStage": next,
            "toolInvocation": {"tool": "readDocumentContent", "args": {}, "description": "look"}
        })
        .to_string()
    }

    fn store() -> SharedDocumentStore {
        Arc::new(
            MemoryDocumentStore::new()
                .with_document(DocumentRecord {
                    id: "doc-1".to_string(),
                    title: "Guide".to_string(),
                    project_id: Some("p1".to_string()),
                    template_id: Some("t1".to_string()),
                    ..Default::default()
                })
                .with_project(ProjectRecord {
                    id: "p1".to_string(),
                    name: "Widgets".to_string(),
                    repo_link: Some("https://github.com/acme/widgets".to_string()),
                })
                .with_template(TemplateRecord {
                    id: "t1".to_string(),
                    title: "User Guide".to_string(),
                    instructions: "Write a guide".to_string(),
                }),
        )
    }

    fn engine(backend: Arc<MockBackend>, tools: SharedDispatcher, config: EngineConfig) -> StageEngine {
        StageEngine::new(backend, tools, store(), config)
    }

    async fn collect(engine: &StageEngine, cancel: CancellationToken) -> Vec<AgentEvent> {
        engine
            .run(AgentRequest::new("doc-1", "Add an introduction"), cancel)
            .collect()
            .await
    }

    fn stages(events: &[AgentEvent]) -> Vec<Stage> {
        events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Stage(s) => Some(s.stage),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_run_event_order() {
        let backend = Arc::new(MockBackend::with_texts([
            reply("planning", "reasoning"),
            reply("reasoning", "toolUsed"),
            tool_reply("reasoning"),
            reply("reasoning", "summary"),
            reply("summary", "done"),
        ]));
        let tools = Arc::new(ScriptedTools::default());
        let engine = engine(backend.clone(), tools.clone(), EngineConfig::default());

        let events = collect(&engine, CancellationToken::new()).await;

        assert_eq!(
            stages(&events),
            vec![
                Stage::Planning,
                Stage::Reasoning,
                Stage::ToolUsed,
                Stage::Reasoning,
                Stage::Summary,
                Stage::Done
            ]
        );
        assert!(events.last().unwrap().is_terminal());
        assert_eq!(tools.calls().len(), 1);
        assert_eq!(backend.request_count(), 5);

        let AgentEvent::Stage(tool_event) = &events[2] else {
            panic!("expected stage event");
        };
        assert!(tool_event.tool_outcome.as_ref().unwrap().success);
        assert_eq!(tool_event.tool_history.len(), 1);

        // Later events carry the whole trail.
        let AgentEvent::Stage(summary) = &events[4] else {
            panic!("expected stage event");
        };
        assert_eq!(summary.tool_history.len(), 1);
        assert!(summary.tool_outcome.is_none());
    }

    #[tokio::test]
    async fn test_premature_done_goes_through_summary() {
        let backend = Arc::new(MockBackend::with_texts([
            reply("planning", "done"),
            reply("summary", "done"),
        ]));
        let engine = engine(backend.clone(), Arc::new(ScriptedTools::default()), EngineConfig::default());

        let events = collect(&engine, CancellationToken::new()).await;
        assert_eq!(stages(&events), vec![Stage::Planning, Stage::Summary, Stage::Done]);

        let AgentEvent::Stage(first) = &events[0] else {
            panic!("expected stage event");
        };
        assert_eq!(first.next_stage, Stage::Summary);
        assert!(backend.requests()[1].prompt.contains("CURRENT STAGE TO EXECUTE: summary"));
    }

    #[tokio::test]
    async fn test_tool_cap_forces_summary() {
        let backend = Arc::new(
            MockBackend::with_texts([reply("planning", "toolUsed"), tool_reply("toolUsed"), tool_reply("toolUsed")])
                .with_fallback(reply("summary", "done")),
        );
        let tools = Arc::new(ScriptedTools::default());
        let config = EngineConfig {
            max_tool_calls: 2,
            ..Default::default()
        };
        let engine = engine(backend, tools.clone(), config);

        let events = collect(&engine, CancellationToken::new()).await;
        assert_eq!(
            stages(&events),
            vec![Stage::Planning, Stage::ToolUsed, Stage::ToolUsed, Stage::Summary, Stage::Done]
        );
        assert_eq!(tools.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_tool_forces_retry() {
        let backend = Arc::new(MockBackend::with_texts([
            reply("planning", "toolUsed"),
            tool_reply("summary"),
            tool_reply("summary"),
            reply("summary", "done"),
        ]));
        let tools = Arc::new(ScriptedTools::failing_first(1));
        let engine = engine(backend.clone(), tools.clone(), EngineConfig::default());

        let events = collect(&engine, CancellationToken::new()).await;
        assert_eq!(
            stages(&events),
            vec![Stage::Planning, Stage::ToolUsed, Stage::ToolUsed, Stage::Summary, Stage::Done]
        );

        let AgentEvent::Stage(failed) = &events[1] else {
            panic!("expected stage event");
        };
        assert_eq!(failed.next_stage, Stage::ToolUsed);
        assert!(backend.requests()[2].prompt.contains("MUST retry"));

        let AgentEvent::Stage(last_tool) = &events[2] else {
            panic!("expected stage event");
        };
        let successes: Vec<bool> = last_tool.tool_history.iter().map(|r| r.success).collect();
        assert_eq!(successes, vec![false, true]);
    }

    #[tokio::test]
    async fn test_parse_failures_exhaust() {
        let backend = Arc::new(MockBackend::repeating("I'd rather chat in prose."));
        let engine = engine(backend.clone(), Arc::new(ScriptedTools::default()), EngineConfig::default());

        let events = collect(&engine, CancellationToken::new()).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AgentEvent::Error { .. }));
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test]
    async fn test_parse_failure_recovers() {
        let backend = Arc::new(MockBackend::with_texts([
            "not json".to_string(),
            reply("planning", "summary"),
            reply("summary", "done"),
        ]));
        let engine = engine(backend.clone(), Arc::new(ScriptedTools::default()), EngineConfig::default());

        let events = collect(&engine, CancellationToken::new()).await;
        assert_eq!(stages(&events), vec![Stage::Planning, Stage::Summary, Stage::Done]);

        let retry_prompt = &backend.requests()[1].prompt;
        assert!(retry_prompt.contains("could not be parsed"));
        assert!(retry_prompt.contains("CURRENT STAGE TO EXECUTE: planning"));
        assert!(retry_prompt.contains("PREVIOUS STAGES COMPLETED: none"));
    }

    #[tokio::test]
    async fn test_tool_turn_without_invocation_lists_catalog() {
        let backend = Arc::new(MockBackend::with_texts([
            reply("planning", "toolUsed"),
            reply("toolUsed", "reasoning"),
            tool_reply("summary"),
            reply("summary", "done"),
        ]));
        let tools = Arc::new(ScriptedTools::default());
        let engine = engine(backend.clone(), tools.clone(), EngineConfig::default());

        let events = collect(&engine, CancellationToken::new()).await;
        assert_eq!(
            stages(&events),
            vec![Stage::Planning, Stage::ToolUsed, Stage::Summary, Stage::Done]
        );
        let corrective = &backend.requests()[2].prompt;
        assert!(corrective.contains("requires a toolInvocation"));
        assert!(corrective.contains("fetchRepositoryCommitHistory"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let backend = Arc::new(MockBackend::repeating(reply("planning", "reasoning")));
        let engine = engine(backend.clone(), Arc::new(ScriptedTools::default()), EngineConfig::default());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let events = collect(&engine, cancel).await;

        assert_eq!(events, vec![AgentEvent::Stopped]);
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_model_call() {
        let backend = Arc::new(MockBackend::new(vec![
            MockResponse::text(reply("planning", "reasoning")),
            MockResponse::Delayed(Duration::from_secs(30), reply("reasoning", "summary")),
        ]));
        let engine = engine(backend, Arc::new(ScriptedTools::default()), EngineConfig::default());

        let cancel = CancellationToken::new();
        let mut stream = engine.run(AgentRequest::new("doc-1", "go"), cancel.clone());

        let first = stream.next().await.unwrap();
        assert!(matches!(first, AgentEvent::Stage(ref s) if s.stage == Stage::Planning));

        cancel.cancel();
        let rest: Vec<AgentEvent> = tokio::time::timeout(Duration::from_secs(5), stream.collect())
            .await
            .unwrap();
        assert_eq!(rest, vec![AgentEvent::Stopped]);
    }

    #[tokio::test]
    async fn test_model_error_ends_run() {
        let backend = Arc::new(MockBackend::new(vec![
            MockResponse::text(reply("planning", "reasoning")),
            MockResponse::error("quota exceeded"),
        ]));
        let engine = engine(backend, Arc::new(ScriptedTools::default()), EngineConfig::default());

        let events = collect(&engine, CancellationToken::new()).await;
        assert_eq!(events.len(), 2);
        let AgentEvent::Error { message, .. } = &events[1] else {
            panic!("expected error event");
        };
        assert!(message.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_turn_limit() {
        let backend = Arc::new(MockBackend::repeating(reply("reasoning", "reasoning")));
        let config = EngineConfig {
            max_turns: 4,
            ..Default::default()
        };
        let engine = engine(backend.clone(), Arc::new(ScriptedTools::default()), config);

        let events = collect(&engine, CancellationToken::new()).await;
        assert_eq!(events.len(), 5);
        assert!(matches!(events[4], AgentEvent::Error { .. }));
        assert_eq!(backend.request_count(), 4);
    }

    #[tokio::test]
    async fn test_budgets_and_prompt_facts() {
        let backend = Arc::new(MockBackend::with_texts([
            reply("planning", "reasoning"),
            reply("reasoning", "toolUsed"),
            tool_reply("summary"),
            reply("summary", "done"),
        ]));
        let engine = engine(backend.clone(), Arc::new(ScriptedTools::default()), EngineConfig::default());
        collect(&engine, CancellationToken::new()).await;

        let requests = backend.requests();
        let budgets: Vec<u32> = requests.iter().map(|r| r.max_output_tokens()).collect();
        assert_eq!(budgets, vec![1024, 2048, 1024, 8192]);

        let first = &requests[0].prompt;
        assert!(first.contains("Document id: doc-1"));
        assert!(first.contains("https://github.com/acme/widgets"));
        assert!(first.contains("Template: User Guide"));
        assert!(first.contains("User: Add an introduction"));
        assert!(requests[3]
            .prompt
            .contains("PREVIOUS STAGES COMPLETED: planning, reasoning, toolUsed"));
    }

    #[tokio::test]
    async fn test_history_precedes_instruction() {
        let backend = Arc::new(MockBackend::with_texts([reply("planning", "done"), reply("summary", "done")]));
        let engine = engine(backend.clone(), Arc::new(ScriptedTools::default()), EngineConfig::default());

        let request = AgentRequest::new("doc-1", "Now shorten it")
            .with_history(vec![ChatMessage::user("Write an intro"), ChatMessage::assistant("Done.")]);
        let _: Vec<AgentEvent> = engine.run(request, CancellationToken::new()).collect().await;

        let prompt = &backend.requests()[0].prompt;
        let earlier = prompt.find("User: Write an intro").unwrap();
        let latest = prompt.find("User: Now shorten it").unwrap();
        assert!(earlier < latest);
    }

    #[tokio::test]
    async fn test_audit_matches_http_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tools"))
            .and(body_partial_json(json!({"tool": "readDocumentContent", "documentId": "doc-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"html": "<p>hi</p>"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tools"))
            .and(body_partial_json(json!({"tool": "appendDocumentContent"})))
            .respond_with(ResponseTemplate::new(500).set_body_string("storage offline"))
            .mount(&server)
            .await;

        let append = json!({
            "stage": "toolUsed",
            "content": "appending",
            "nextStage": "summary",
            "toolInvocation": {"tool": "appendDocumentContent", "args": {"html": "<p>intro</p>"}}
        })
        .to_string();
        let backend = Arc::new(MockBackend::with_texts([
            reply("planning", "toolUsed"),
            tool_reply("toolUsed"),
            append,
            tool_reply("summary"),
            reply("summary", "done"),
        ]));

        let broker = ToolBroker::new(ToolBrokerConfig::new(format!("{}/tools", server.uri()))).unwrap();
        let engine = engine(backend, Arc::new(broker), EngineConfig::default());

        let events = collect(&engine, CancellationToken::new()).await;
        let AgentEvent::Stage(last) = events.last().unwrap() else {
            panic!("expected stage event");
        };
        let trail: Vec<(ToolName, bool)> = last.tool_history.iter().map(|r| (r.tool, r.success)).collect();
        assert_eq!(
            trail,
            vec![
                (ToolName::ReadDocumentContent, true),
                (ToolName::AppendDocumentContent, false),
                (ToolName::ReadDocumentContent, true),
            ]
        );
        assert_eq!(last.tool_history[0].result, json!({"html": "<p>hi</p>"}));
    }

    #[test]
    fn test_event_json_shape() {
        let event = AgentEvent::Stage(StageEvent {
            stage: Stage::ToolUsed,
            thought: "t".to_string(),
            content: "c".to_string(),
            next_stage: Stage::Reasoning,
            tool_invocation: None,
            tool_outcome: None,
            tool_history: Vec::new(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "stage");
        assert_eq!(value["stage"], "toolUsed");
        assert_eq!(value["nextStage"], "reasoning");
        assert!(value.get("toolOutcome").is_none());

        let value = serde_json::to_value(AgentEvent::Stopped).unwrap();
        assert_eq!(value, json!({"type": "stopped"}));
    }
}
