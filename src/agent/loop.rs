//! Agent execution engine
//!
//! One turn is an explicit state machine:
//!
//! ```text
//! AwaitInput ──gate allows──> Reasoning ──calls──> ToolExecution
//!     │                          │   ^                  │
//!     │ gate refuses             │   └──────────────────┘
//!     v                          v no calls
//!    Done <──────────────────────┘
//! ```
//!
//! The turn works on a private copy of the session history. Only when it
//! reaches `Done` is the whole copy committed back to the session store, so
//! a failed or cancelled turn leaves the stored conversation untouched.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, WeaveError};
use crate::providers::LLMProvider;
use crate::session::{Message, Session, SessionManager};
use crate::tools::{validate_backends, ToolBackend, ToolContext, ToolRegistry};
use crate::utils::metrics::UsageMetrics;

use super::executor::ToolExecutor;
use super::gate::{gate_from_config, GateDecision, QuestionGate};
use super::reasoning::ReasoningStep;

/// States of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnState {
    AwaitInput,
    Reasoning,
    ToolExecution,
    Done,
}

impl TurnState {
    /// Transition after the current state's work is done.
    ///
    /// `last` is the newest message of the working history and `gate` the
    /// classification of this turn's question.
    pub fn next(self, last: Option<&Message>, gate: GateDecision) -> TurnState {
        match self {
            TurnState::AwaitInput => match gate {
                GateDecision::Allow => TurnState::Reasoning,
                GateDecision::Refuse => TurnState::Done,
            },
            TurnState::Reasoning => {
                if last.is_some_and(Message::has_tool_calls) {
                    TurnState::ToolExecution
                } else {
                    TurnState::Done
                }
            }
            TurnState::ToolExecution => TurnState::Reasoning,
            TurnState::Done => TurnState::Done,
        }
    }
}

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text of the final assistant message
    pub content: String,
    /// States visited, starting with `AwaitInput` and ending with `Done`
    pub states: Vec<TurnState>,
    /// Tool-execution rounds performed
    pub iterations: usize,
    /// Messages this turn appended to the conversation
    pub new_messages: Vec<Message>,
    /// Whether the gate refused the question
    pub refused: bool,
}

/// The engine: reasoning and tool execution over per-session history.
///
/// The tool registry is shared read-only; the session store is the only
/// mutable shared state, and turns for one session are serialized.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use toolweave::agent::AgentLoop;
/// use toolweave::config::Config;
/// use toolweave::providers::provider_from_config;
/// use toolweave::session::SessionManager;
/// use toolweave::tools::backends_from_config;
///
/// let config = Config::load()?;
/// let provider = Arc::new(provider_from_config(&config)?);
/// let backends = backends_from_config(&config.backends)?;
/// let agent = AgentLoop::from_backends(config, SessionManager::new_memory(), provider, backends).await?;
///
/// let answer = agent.submit_turn("cli:default", "Add 3 and 4").await?;
/// ```
pub struct AgentLoop {
    config: Config,
    sessions: SessionManager,
    reasoning: ReasoningStep,
    executor: ToolExecutor,
    gate: Option<Arc<dyn QuestionGate>>,
    refusal: String,
    metrics: Option<Arc<UsageMetrics>>,
    /// Per-session locks serializing turns for the same session.
    session_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AgentLoop {
    /// Create an engine over an already aggregated registry.
    ///
    /// The gate is built from `config.gate`.
    pub fn new(
        config: Config,
        sessions: SessionManager,
        provider: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let gate = gate_from_config(&config.gate, Arc::clone(&provider), &config.agent.model);
        Self {
            reasoning: ReasoningStep::from_config(provider, &config),
            executor: ToolExecutor::new(registry),
            gate,
            refusal: config.gate.refusal.clone(),
            metrics: None,
            session_locks: Arc::new(Mutex::new(HashMap::new())),
            sessions,
            config,
        }
    }

    /// Validate `backends`, aggregate their tools and create the engine.
    ///
    /// # Errors
    /// Fails with a configuration error when no backend survives validation
    /// or when the collision policy rejects the merged tool set. No
    /// reasoning call is made in either case.
    pub async fn from_backends(
        config: Config,
        sessions: SessionManager,
        provider: Arc<dyn LLMProvider>,
        backends: Vec<Arc<dyn ToolBackend>>,
    ) -> Result<Self> {
        let probe_timeout = Duration::from_secs(config.backends.probe_timeout_secs);
        let validated = validate_backends(backends, probe_timeout).await?;
        let registry = ToolRegistry::aggregate(validated, config.backends.collision)?;
        Ok(Self::new(config, sessions, provider, Arc::new(registry)))
    }

    /// Replace (or remove) the question gate.
    pub fn with_gate(mut self, gate: Option<Arc<dyn QuestionGate>>, refusal: &str) -> Self {
        self.gate = gate;
        self.refusal = refusal.to_string();
        self
    }

    /// Attach usage counters to the engine and its steps.
    pub fn with_metrics(mut self, metrics: Arc<UsageMetrics>) -> Self {
        self.reasoning = self.reasoning.with_metrics(Arc::clone(&metrics));
        self.executor = self.executor.with_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
        self
    }

    /// Run one turn and return the final assistant text.
    pub async fn submit_turn(&self, session_id: &str, user_text: &str) -> Result<String> {
        self.run_turn(session_id, user_text, None)
            .await
            .map(|outcome| outcome.content)
    }

    /// Like [`submit_turn`](Self::submit_turn), stopping early once `cancel`
    /// becomes `true`. A cancelled turn commits nothing.
    pub async fn submit_turn_with_cancel(
        &self,
        session_id: &str,
        user_text: &str,
        cancel: watch::Receiver<bool>,
    ) -> Result<String> {
        self.run_turn(session_id, user_text, Some(cancel))
            .await
            .map(|outcome| outcome.content)
    }

    /// Run one turn to completion and report how it went.
    ///
    /// # Errors
    /// - `InvalidMessage` for empty input
    /// - reasoning engine errors (the turn is discarded)
    /// - `LoopLimit` when the tool-round limit is exceeded (discarded)
    /// - `Cancelled` when `cancel` fires (discarded)
    /// - session store errors
    pub async fn run_turn(
        &self,
        session_id: &str,
        user_text: &str,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<TurnOutcome> {
        let turn_id = Uuid::new_v4();
        let span = info_span!("turn", session_id = %session_id, turn_id = %turn_id);

        async move {
            let started = Instant::now();
            let result = self.run_turn_locked(session_id, user_text, cancel).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(outcome) => {
                    if let Some(metrics) = self.metrics.as_ref() {
                        metrics.record_turn();
                        if outcome.refused {
                            metrics.record_refusal();
                        }
                    }
                    info!(
                        latency_ms,
                        iterations = outcome.iterations,
                        new_messages = outcome.new_messages.len(),
                        refused = outcome.refused,
                        "Turn completed"
                    );
                }
                Err(e) => {
                    if let Some(metrics) = self.metrics.as_ref() {
                        metrics.record_failure();
                    }
                    error!(latency_ms, error = %e, "Turn failed, nothing committed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_turn_locked(
        &self,
        session_id: &str,
        user_text: &str,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<TurnOutcome> {
        if user_text.trim().is_empty() {
            return Err(WeaveError::InvalidMessage("empty user message".into()));
        }

        // Acquire a per-session lock to serialize turns for the same session.
        // Different sessions can still proceed concurrently.
        let session_lock = {
            let mut locks = self.session_locks.lock().await;
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let result = {
            let _session_guard = session_lock.lock().await;
            self.run_turn_inner(session_id, user_text, cancel).await
        };

        // Drop the lock entry once no other turn holds or waits on it.
        let mut locks = self.session_locks.lock().await;
        if Arc::strong_count(&session_lock) == 2 {
            locks.remove(session_id);
        }
        result
    }

    async fn run_turn_inner(
        &self,
        session_id: &str,
        user_text: &str,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<TurnOutcome> {
        let mut working = self
            .sessions
            .get(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id));
        let committed_len = working.message_count();
        working.append(Message::user(user_text))?;

        let tools = self.executor.registry().definitions();
        let tool_ctx = ToolContext::new().with_session(session_id);
        let max_rounds = self.config.agent.max_tool_iterations;

        let mut state = TurnState::AwaitInput;
        let mut states = vec![state];
        let mut decision = GateDecision::Allow;
        let mut rounds = 0;
        let mut executed = HashSet::new();

        while state != TurnState::Done {
            match state {
                TurnState::AwaitInput => {
                    if let Some(gate) = self.gate.as_ref() {
                        decision = cancellable(&cancel, gate.classify(user_text)).await?;
                        debug!(gate = %gate.name(), ?decision, "Question classified");
                        if decision == GateDecision::Refuse {
                            working.append(Message::assistant(&self.refusal))?;
                        }
                    }
                }
                TurnState::Reasoning => {
                    let reply = cancellable(&cancel, self.reasoning.reason(&working.messages, &tools)).await?;
                    debug!(calls = reply.calls().len(), "Reasoning step finished");
                    working.append(reply)?;
                }
                TurnState::ToolExecution => {
                    if rounds >= max_rounds {
                        return Err(WeaveError::LoopLimit { iterations: rounds });
                    }
                    check_cancelled(&cancel)?;
                    rounds += 1;
                    let calls = working
                        .last_message()
                        .map(|m| m.calls().to_vec())
                        .unwrap_or_default();
                    debug!(round = rounds, of = max_rounds, calls = calls.len(), "Tool round");
                    let results = self
                        .executor
                        .execute_pending(&calls, &tool_ctx, &mut executed)
                        .await;
                    for result in results {
                        working.append(result)?;
                    }
                }
                TurnState::Done => {}
            }
            state = state.next(working.last_message(), decision);
            states.push(state);
        }

        let new_messages = working.messages[committed_len..].to_vec();
        let content = working
            .last_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.sessions.commit(session_id, working.messages).await?;

        Ok(TurnOutcome {
            content,
            states,
            iterations: rounds,
            new_messages,
            refused: decision == GateDecision::Refuse,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.executor.registry()
    }

    pub fn has_gate(&self) -> bool {
        self.gate.is_some()
    }

    pub fn metrics(&self) -> Option<&Arc<UsageMetrics>> {
        self.metrics.as_ref()
    }
}

fn check_cancelled(cancel: &Option<watch::Receiver<bool>>) -> Result<()> {
    match cancel {
        Some(rx) if *rx.borrow() => Err(WeaveError::Cancelled),
        _ => Ok(()),
    }
}

/// Await `fut` unless the cancel flag is (or becomes) set first.
async fn cancellable<T>(
    cancel: &Option<watch::Receiver<bool>>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(rx) = cancel else {
        return fut.await;
    };
    check_cancelled(cancel)?;

    let mut rx = rx.clone();
    let cancelled = async move {
        loop {
            if rx.changed().await.is_err() {
                // Sender gone: the flag can never be set any more.
                std::future::pending::<()>().await;
            }
            if *rx.borrow() {
                return;
            }
        }
    };

    tokio::select! {
        result = fut => result,
        _ = cancelled => Err(WeaveError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatOptions, LLMResponse, LLMToolCall, ToolDefinition};
    use crate::session::Role;
    use crate::tools::math::math_backend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted engine: returns responses in order, then a fixed answer.
    struct Scripted {
        responses: std::sync::Mutex<Vec<LLMResponse>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut responses: Vec<LLMResponse>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: std::sync::Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| LLMResponse::text("done")))
        }
        fn default_model(&self) -> &str {
            "scripted"
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Always asks for another tool call.
    struct Looping(AtomicUsize);

    #[async_trait]
    impl LLMProvider for Looping {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(LLMResponse::with_tools(
                "",
                vec![LLMToolCall::new(&format!("loop_{}", n), "add", r#"{"a":1,"b":1}"#)],
            ))
        }
        fn default_model(&self) -> &str {
            "looping"
        }
        fn name(&self) -> &str {
            "looping"
        }
    }

    async fn agent(provider: Arc<dyn LLMProvider>, config: Config) -> AgentLoop {
        AgentLoop::from_backends(
            config,
            SessionManager::new_memory(),
            provider,
            vec![Arc::new(math_backend())],
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_transitions() {
        let plain = Message::assistant("7");
        let calling = Message::assistant_with_tools(
            "",
            vec![crate::session::ToolCall::new("c1", "add", "{}")],
        );
        let allow = GateDecision::Allow;

        assert_eq!(TurnState::AwaitInput.next(None, allow), TurnState::Reasoning);
        assert_eq!(
            TurnState::AwaitInput.next(None, GateDecision::Refuse),
            TurnState::Done
        );
        assert_eq!(
            TurnState::Reasoning.next(Some(&calling), allow),
            TurnState::ToolExecution
        );
        assert_eq!(TurnState::Reasoning.next(Some(&plain), allow), TurnState::Done);
        assert_eq!(
            TurnState::ToolExecution.next(Some(&plain), allow),
            TurnState::Reasoning
        );
        assert_eq!(TurnState::Done.next(None, allow), TurnState::Done);
    }

    #[tokio::test]
    async fn test_plain_answer_commits_turn() {
        let provider = Scripted::new(vec![LLMResponse::text("Hello!")]);
        let agent = agent(provider, Config::default()).await;

        let outcome = agent.run_turn("s1", "Hi", None).await.unwrap();
        assert_eq!(outcome.content, "Hello!");
        assert_eq!(
            outcome.states,
            vec![TurnState::AwaitInput, TurnState::Reasoning, TurnState::Done]
        );
        assert_eq!(outcome.iterations, 0);

        let stored = agent.sessions().load("s1").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, Role::User);
        assert_eq!(stored, outcome.new_messages);
    }

    #[tokio::test]
    async fn test_loop_limit_discards_turn() {
        let mut config = Config::default();
        config.agent.max_tool_iterations = 3;
        let agent = agent(Arc::new(Looping(AtomicUsize::new(0))), config).await;

        let err = agent.run_turn("s1", "loop forever", None).await.unwrap_err();
        assert!(matches!(err, WeaveError::LoopLimit { iterations: 3 }));
        assert!(err.is_turn_failure());
        assert!(agent.sessions().load("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let agent = agent(Scripted::new(vec![]), Config::default()).await;
        assert!(matches!(
            agent.submit_turn("s1", "   ").await,
            Err(WeaveError::InvalidMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_turn_commits_nothing() {
        let provider = Scripted::new(vec![LLMResponse::text("never seen")]);
        let agent = agent(provider.clone(), Config::default()).await;

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let err = agent
            .submit_turn_with_cancel("s1", "Hi", rx)
            .await
            .unwrap_err();
        assert!(matches!(err, WeaveError::Cancelled));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(!agent.sessions().exists("s1").await);
    }

    /// Never answers.
    struct Hanging;

    #[async_trait]
    impl LLMProvider for Hanging {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            std::future::pending().await
        }
        fn default_model(&self) -> &str {
            "hanging"
        }
        fn name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test]
    async fn test_cancel_while_reasoning_keeps_history() {
        let agent = agent(Arc::new(Hanging), Config::default()).await;
        let earlier = vec![Message::user("Hi"), Message::assistant("Hello!")];
        agent.sessions().commit("s1", earlier.clone()).await.unwrap();

        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            agent.submit_turn_with_cancel("s1", "Add 3 and 4", rx),
        )
        .await
        .expect("cancel did not interrupt the reasoning call")
        .unwrap_err();
        assert!(matches!(err, WeaveError::Cancelled));
        assert_eq!(agent.sessions().load("s1").await.unwrap(), earlier);
    }

    #[tokio::test]
    async fn test_session_locks_are_released() {
        let agent = Arc::new(agent(Scripted::new(vec![]), Config::default()).await);

        let turns: Vec<_> = (0..8)
            .map(|i| {
                let agent = Arc::clone(&agent);
                tokio::spawn(async move {
                    let session = if i % 2 == 0 { "even" } else { "odd" };
                    agent.submit_turn(session, &format!("turn {}", i)).await
                })
            })
            .collect();
        for turn in turns {
            turn.await.unwrap().unwrap();
        }

        assert!(agent.session_locks.lock().await.is_empty());
        assert_eq!(agent.sessions().load("even").await.unwrap().len(), 8);
        assert_eq!(agent.sessions().load("odd").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let provider = Scripted::new(vec![
            LLMResponse::with_tools("", vec![LLMToolCall::new("c1", "add", r#"{"a":3,"b":4}"#)]),
            LLMResponse::text("7"),
        ]);
        let metrics = Arc::new(UsageMetrics::new());
        let agent = agent(provider, Config::default())
            .await
            .with_metrics(metrics.clone());

        agent.submit_turn("s1", "Add 3 and 4").await.unwrap();
        assert_eq!(metrics.turns(), 1);
        assert_eq!(metrics.reasoning_calls(), 2);
        assert_eq!(metrics.tool_stats("add").unwrap().calls, 1);
    }
}
