//! Session agent - the action state machine
//!
//! A `SessionAgent` owns one execution environment and one memory log for the
//! whole session. It starts the environment, walks the action order one action
//! per cycle until the continuation policy says stop, and stops the
//! environment on every way out.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use super::action::{Action, ActionCursor, Continuation, CycleReport, SessionState};
use super::config::SessionConfig;
use super::events::{EventSink, SessionEvent, TracingSink};
use crate::environment::{EnvironmentError, ExecutionEnvironment, ExecutionStatus};
use crate::executor::{CodeExecutor, ExecutorError, RuntimeRegistry};
use crate::extract::{CodeBlock, CodeExtractor, MarkdownCodeExtractor};
use crate::generator::{CodeGenerator, GeneratorError};
use crate::message::{Memory, Message, Role};
use crate::metrics::{CLEANUP_FAILURES, CYCLES, SESSIONS};
use crate::ollama::CompletionClient;

/// Error type for session operations
#[derive(Debug)]
pub enum AgentError {
    /// Invalid session setup or misuse
    Configuration(String),
    /// No runtime is registered for the selected language
    UnsupportedLanguage(String),
    /// The execution environment could not be started
    EnvironmentStart(EnvironmentError),
    /// An action needed at least one code block and found none
    NoCodeBlock { action: Action },
    /// Code generation failed (completion call or strict parse)
    Generation(GeneratorError),
    /// The cycle budget ran out before the continuation policy said stop
    StopConditionNotMet { reason: String },
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AgentError::UnsupportedLanguage(lang) => write!(f, "Unsupported language: {}", lang),
            AgentError::EnvironmentStart(e) => {
                write!(f, "Failed to start execution environment: {}", e)
            }
            AgentError::NoCodeBlock { action } => {
                write!(f, "No code block found for {}", action)
            }
            AgentError::Generation(e) => write!(f, "Code generation failed: {}", e),
            AgentError::StopConditionNotMet { reason } => {
                write!(f, "Session stopped without reaching a result: {}", reason)
            }
        }
    }
}

impl std::error::Error for AgentError {}

impl From<GeneratorError> for AgentError {
    fn from(e: GeneratorError) -> Self {
        AgentError::Generation(e)
    }
}

impl From<ExecutorError> for AgentError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::UnsupportedLanguage(lang) => AgentError::UnsupportedLanguage(lang),
            ExecutorError::EmptyInput => AgentError::NoCodeBlock {
                action: Action::ExecuteCode,
            },
        }
    }
}

/// Output of one action
struct StepOutput {
    message: Message,
    reason: String,
    execution: Option<ExecutionStatus>,
}

/// The session's environment, shared with a cancellation cleanup task
type SharedEnvironment = Arc<tokio::sync::Mutex<Box<dyn ExecutionEnvironment>>>;

/// Stop the environment and report the outcome; failures are logged, never propagated
async fn stop_environment(
    environment: &SharedEnvironment,
    environment_id: &str,
    session_id: &str,
    sink: &dyn EventSink,
) {
    let result = environment.lock().await.stop().await;
    match result {
        Ok(()) => sink.emit(session_id, &SessionEvent::EnvironmentStopped),
        Err(e) => {
            warn!(session_id, error = %e, "Ignoring environment stop failure");
            CLEANUP_FAILURES.with_label_values(&[environment_id]).inc();
            sink.emit(
                session_id,
                &SessionEvent::EnvironmentStopFailed {
                    error: e.to_string(),
                },
            );
        }
    }
}

/// Stops the environment when a `run` future is dropped before its cleanup ran
struct CleanupGuard {
    armed: bool,
    environment: SharedEnvironment,
    environment_id: String,
    session_id: String,
    sink: Arc<dyn EventSink>,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CleanupGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(session_id = %self.session_id, "Session cancelled outside a runtime, environment left running");
            return;
        };

        warn!(session_id = %self.session_id, "Session cancelled, stopping environment");
        SESSIONS.with_label_values(&["cancelled"]).inc();

        let environment = self.environment.clone();
        let environment_id = self.environment_id.clone();
        let session_id = self.session_id.clone();
        let sink = self.sink.clone();
        let task = runtime.spawn(async move {
            stop_environment(&environment, &environment_id, &session_id, sink.as_ref()).await;
        });

        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(task);
        }
    }
}

/// Orchestrates one session from instruction to result
pub struct SessionAgent {
    id: String,
    config: SessionConfig,
    environment: SharedEnvironment,
    environment_id: String,
    generator: CodeGenerator,
    executor: CodeExecutor,
    extractor: Arc<dyn CodeExtractor>,
    sink: Arc<dyn EventSink>,
    memory: Memory,
    state: SessionState,
    cursor: ActionCursor,
    reason: String,
    /// Stop task spawned when a run was cancelled
    pending_cleanup: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionAgent {
    /// Create a session agent
    ///
    /// # Arguments
    /// * `config` - Fixed session configuration
    /// * `environment` - Execution environment, owned by this session only
    /// * `completion` - Completion collaborator used by the code generator
    pub fn new(
        config: SessionConfig,
        environment: Box<dyn ExecutionEnvironment>,
        completion: Arc<dyn CompletionClient>,
    ) -> Result<Self, AgentError> {
        if config.max_cycles == 0 {
            return Err(AgentError::Configuration(
                "max_cycles must be at least 1".to_string(),
            ));
        }
        if config.execution_timeout.is_zero() {
            return Err(AgentError::Configuration(
                "execution_timeout must be non-zero".to_string(),
            ));
        }

        let generator = CodeGenerator::new(completion, config.parse_policy);
        let executor = CodeExecutor::new(
            Self::registry(&config, RuntimeRegistry::with_kernel(&config.kernel_name)),
            config.execution_timeout,
        );

        Ok(Self {
            id: Uuid::now_v7().to_string(),
            config,
            environment_id: environment.id().to_string(),
            environment: Arc::new(tokio::sync::Mutex::new(environment)),
            generator,
            executor,
            extractor: Arc::new(MarkdownCodeExtractor::new()),
            sink: Arc::new(TracingSink),
            memory: Memory::new(),
            state: SessionState::Pending,
            cursor: ActionCursor::default(),
            reason: "no cycle completed".to_string(),
            pending_cleanup: Arc::new(Mutex::new(None)),
        })
    }

    /// Replace the code extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn CodeExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the observability sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the runtime registry
    ///
    /// The configured `runtimes` restriction still applies.
    pub fn with_runtimes(mut self, registry: RuntimeRegistry) -> Self {
        let registry = Self::registry(&self.config, registry);
        self.executor = CodeExecutor::new(registry, self.config.execution_timeout);
        self
    }

    fn registry(config: &SessionConfig, mut registry: RuntimeRegistry) -> RuntimeRegistry {
        if let Some(names) = &config.runtimes {
            registry.retain(names);
        }
        registry
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Summary of the last completed cycle
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Run the session for one inbound message
    ///
    /// The environment is started once before the first cycle and stopped once
    /// afterwards, whether the session succeeds, fails or panics. If this future
    /// is dropped mid-run, the stop is spawned onto the runtime instead; await
    /// it with [`SessionAgent::wait_for_cleanup`].
    pub async fn run(&mut self, message: Message) -> Result<Message, AgentError> {
        if self.state != SessionState::Pending {
            return Err(AgentError::Configuration(format!(
                "session {} already ran (state: {})",
                self.id, self.state
            )));
        }

        let span = info_span!(
            "session",
            session_id = %self.id,
            environment = %self.environment_id,
            otel.name = "session"
        );

        async move {
            let mut guard = self.cleanup_guard();

            let outcome = AssertUnwindSafe(self.start_and_react(message))
                .catch_unwind()
                .await;

            self.cleanup().await;
            guard.disarm();

            match outcome {
                Ok(result) => {
                    self.finish(&result);
                    result
                }
                Err(panic) => {
                    self.set_state(SessionState::Failed);
                    SESSIONS.with_label_values(&["panicked"]).inc();
                    std::panic::resume_unwind(panic)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Wait for the stop spawned by a cancelled `run`
    ///
    /// Returns at once when no run was cancelled. Marks a cancelled session
    /// as failed.
    pub async fn wait_for_cleanup(&mut self) {
        let task = self.pending_cleanup.lock().ok().and_then(|mut p| p.take());
        let Some(task) = task else {
            return;
        };
        if let Err(e) = task.await {
            warn!(session_id = %self.id, error = %e, "Environment cleanup task failed");
        }
        self.set_state(SessionState::Failed);
        self.emit(SessionEvent::Finished { state: self.state });
    }

    fn cleanup_guard(&self) -> CleanupGuard {
        CleanupGuard {
            armed: true,
            environment: self.environment.clone(),
            environment_id: self.environment_id.clone(),
            session_id: self.id.clone(),
            sink: self.sink.clone(),
            pending: self.pending_cleanup.clone(),
        }
    }

    async fn start_and_react(&mut self, message: Message) -> Result<Message, AgentError> {
        self.emit(SessionEvent::EnvironmentStarting {
            environment: self.environment_id.clone(),
        });

        let started = self.environment.lock().await.start().await;
        if let Err(e) = started {
            self.emit(SessionEvent::EnvironmentStartFailed {
                error: e.to_string(),
            });
            return Err(AgentError::EnvironmentStart(e));
        }

        self.react(message).await
    }

    /// The reaction loop
    async fn react(&mut self, message: Message) -> Result<Message, AgentError> {
        self.memory.append(message);

        for cycle in 1..=self.config.max_cycles {
            let action = self.cursor.current();
            self.set_state(match action {
                Action::GenerateCode => SessionState::Generating,
                Action::ExecuteCode => SessionState::Executing,
            });
            self.emit(SessionEvent::CycleStarted { cycle, action });

            let step = match action {
                Action::GenerateCode => self.generate_code().await,
                Action::ExecuteCode => self.execute_code().await,
            };

            let step = match step {
                Ok(step) => step,
                Err(e) => {
                    CYCLES.with_label_values(&[action.as_str(), "error"]).inc();
                    self.emit(SessionEvent::CycleFailed {
                        cycle,
                        action,
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };
            CYCLES.with_label_values(&[action.as_str(), "ok"]).inc();

            self.memory.append(step.message.clone());
            self.reason = step.reason;

            let report = CycleReport {
                cycle,
                action,
                reason: self.reason.clone(),
                execution: step.execution,
            };
            let continuation = self.config.continuation.decide(&report);
            self.emit(SessionEvent::CycleFinished {
                cycle,
                action,
                reason: report.reason,
                continuation,
            });

            match continuation {
                Continuation::Stop => return Ok(step.message),
                Continuation::Continue => self.cursor.advance(),
                Continuation::Retry => {}
            }
        }

        Err(AgentError::StopConditionNotMet {
            reason: self.reason.clone(),
        })
    }

    /// Language of the first block; the only tie-break between blocks
    fn target_language(blocks: &[CodeBlock], action: Action) -> Result<String, AgentError> {
        blocks
            .first()
            .map(|b| b.language.clone())
            .ok_or(AgentError::NoCodeBlock { action })
    }

    /// GenerateCode: answer the latest message only
    async fn generate_code(&mut self) -> Result<StepOutput, AgentError> {
        let action = Action::GenerateCode;
        let latest = self
            .memory
            .latest()
            .cloned()
            .ok_or(AgentError::NoCodeBlock { action })?;

        let blocks = self.extractor.extract(std::slice::from_ref(&latest));
        let language = Self::target_language(&blocks, action)?;

        let code = self.generator.generate(latest.content(), &language).await?;
        let reason = format!("generated {} chars of {} code", code.len(), language);

        Ok(StepOutput {
            message: Message::code(code, language, self.role(), action),
            reason,
            execution: None,
        })
    }

    /// ExecuteCode: run every block in the whole memory
    async fn execute_code(&mut self) -> Result<StepOutput, AgentError> {
        let action = Action::ExecuteCode;
        let blocks = self.extractor.extract(self.memory.all());
        let language = Self::target_language(&blocks, action)?;

        let result = {
            let mut environment = self.environment.lock().await;
            self.executor
                .execute(&mut **environment, &blocks, &language)
                .await?
        };

        let reason = format!(
            "executed {} code block(s) as {}: {}",
            blocks.len(),
            language,
            result.status
        );

        Ok(StepOutput {
            message: Message::from_action(result.output, self.role(), action),
            reason,
            execution: Some(result.status),
        })
    }

    async fn cleanup(&mut self) {
        stop_environment(
            &self.environment,
            &self.environment_id,
            &self.id,
            self.sink.as_ref(),
        )
        .await;
    }

    fn finish(&mut self, result: &Result<Message, AgentError>) {
        let outcome = match result {
            Ok(_) => {
                self.set_state(SessionState::Done);
                "done"
            }
            Err(AgentError::EnvironmentStart(_)) => {
                self.set_state(SessionState::Failed);
                "start_failed"
            }
            Err(_) => {
                self.set_state(SessionState::Failed);
                "failed"
            }
        };
        SESSIONS.with_label_values(&[outcome]).inc();
        self.emit(SessionEvent::Finished { state: self.state });
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            self.state = state;
            self.emit(SessionEvent::StateChanged { state });
        }
    }

    fn role(&self) -> Role {
        Role::Agent(self.config.profile.clone())
    }

    fn emit(&self, event: SessionEvent) {
        self.sink.emit(&self.id, &event);
    }
}

impl std::fmt::Debug for SessionAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAgent")
            .field("id", &self.id)
            .field("environment", &self.environment_id)
            .field("state", &self.state)
            .field("memory_len", &self.memory.len())
            .field("reason", &self.reason)
            .finish()
    }
}
