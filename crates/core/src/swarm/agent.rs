//! # Agent
//!
//! One workflow instance. A run moves through five phases:
//!
//! 1. **Plan** - pick the kind's template (or the generic fallback)
//! 2. **Clarify** - optional; wait for answers, maybe regenerate the plan
//! 3. **Approve** - wait for approval, bounded by a timeout
//! 4. **Execute** - run every step in order through the [`StepExecutor`]
//! 5. **Synthesize** - turn the history into a [`Deliverable`]
//!
//! Every transition is published on the agent's own event channel. Waits
//! are oneshot receivers raced against a timeout and the stop signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex, Notify};

use crate::gateway::{ChatMessage, CompletionGateway, CompletionRequest, GatewayError};
use crate::models::LlmProvider;
use crate::prompts;

use super::error::LifecycleError;
use super::events::AgentEvent;
use super::executor::{StepExecutor, StepResult, ToolSet};
use super::plan::{generate_plan, AgentKind, Plan, WorkPlanStep};
use super::reply::truncate_chars;

/// Capacity of the per-agent event channel
pub const AGENT_EVENT_BUFFER: usize = 256;

const CHAT_FALLBACK: &str = "I could not reach the model just now. Please try again in a moment.";

/// What the caller supplies to create an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub name: String,
    pub goal: String,
    #[serde(default)]
    pub kind: AgentKind,
    /// Plan steps for [`AgentKind::Custom`]
    #[serde(default)]
    pub steps: Vec<WorkPlanStep>,
    /// Ask the kind's clarifying questions before approval
    #[serde(default)]
    pub require_clarification: bool,
    /// Extra material prepended to every step's context (e.g. parsed documents)
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub provider: Option<LlmProvider>,
    #[serde(default)]
    pub model: Option<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, goal: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            name: name.into(),
            goal: goal.into(),
            kind,
            steps: Vec::new(),
            require_clarification: false,
            context: None,
            provider: None,
            model: None,
        }
    }

    pub fn with_steps(mut self, steps: Vec<WorkPlanStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_clarification(mut self) -> Self {
        self.require_clarification = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Queued,
    Planning,
    AwaitingClarification,
    AwaitingApproval,
    Running,
    Paused,
    Completed,
    Error,
}

impl AgentStatus {
    /// Completed and error accept nothing further
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Error)
    }

    pub fn phase(&self) -> Option<AgentPhase> {
        match self {
            AgentStatus::Planning => Some(AgentPhase::Plan),
            AgentStatus::AwaitingClarification => Some(AgentPhase::Clarify),
            AgentStatus::AwaitingApproval => Some(AgentPhase::Approve),
            AgentStatus::Running => Some(AgentPhase::Execute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Plan,
    Clarify,
    Approve,
    Execute,
    Synthesize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Idle,
    Running,
    Completed,
    Error,
}

/// Progress of the current run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    pub current_step_index: usize,
    pub results: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecutionState {
    fn started() -> Self {
        Self {
            status: ExecutionStatus::Running,
            current_step_index: 0,
            results: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}

/// Final output of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    pub agent_id: String,
    pub agent_name: String,
    pub title: String,
    pub content: String,
    pub data_points: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalDecision {
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationAnswers {
    pub answers: Vec<String>,
    #[serde(default)]
    pub regenerate_plan: bool,
}

/// Upper bounds on the two human-in-the-loop waits
#[derive(Debug, Clone, Copy)]
pub struct AgentTimeouts {
    pub approval: Duration,
    pub clarification: Duration,
}

impl Default for AgentTimeouts {
    fn default() -> Self {
        Self {
            approval: Duration::from_secs(600),
            clarification: Duration::from_secs(600),
        }
    }
}

/// Read-only view of an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    pub id: String,
    pub name: String,
    pub goal: String,
    pub kind: AgentKind,
    pub status: AgentStatus,
    #[serde(default)]
    pub phase: Option<AgentPhase>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub pending_questions: Vec<String>,
    #[serde(default)]
    pub execution: Option<ExecutionState>,
    #[serde(default)]
    pub deliverable: Option<Deliverable>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct AgentState {
    status: AgentStatus,
    phase: Option<AgentPhase>,
    plan: Option<Plan>,
    execution: Option<ExecutionState>,
    deliverable: Option<Deliverable>,
    history: Vec<ChatMessage>,
    base_context: Vec<String>,
    pending_questions: Vec<String>,
    approval_tx: Option<oneshot::Sender<ApprovalDecision>>,
    clarification_tx: Option<oneshot::Sender<ClarificationAnswers>>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Receives each finished deliverable before the agent reports completion
#[async_trait]
pub trait DeliverableHandoff: Send + Sync {
    async fn hand_off(&self, deliverable: Deliverable);
}

/// Why a run stopped before completing
enum Halt {
    Paused,
    Failed(String),
}

impl From<GatewayError> for Halt {
    fn from(e: GatewayError) -> Self {
        Halt::Failed(e.to_string())
    }
}

enum WaitOutcome<T> {
    Received(T),
    TimedOut,
    Stopped,
}

pub struct Agent {
    id: String,
    config: AgentConfig,
    gateway: Arc<dyn CompletionGateway>,
    executor: StepExecutor,
    timeouts: AgentTimeouts,
    state: Mutex<AgentState>,
    cancelled: AtomicBool,
    wake: Notify,
    events: mpsc::Sender<AgentEvent>,
    handoff: Option<Arc<dyn DeliverableHandoff>>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        config: AgentConfig,
        gateway: Arc<dyn CompletionGateway>,
        tools: ToolSet,
        timeouts: AgentTimeouts,
        events: mpsc::Sender<AgentEvent>,
    ) -> Self {
        let now = Utc::now();
        let base_context = config.context.iter().cloned().collect();
        Self {
            id: id.into(),
            executor: StepExecutor::new(Arc::clone(&gateway), tools, config.name.clone()),
            config,
            gateway,
            timeouts,
            state: Mutex::new(AgentState {
                status: AgentStatus::Queued,
                phase: None,
                plan: None,
                execution: None,
                deliverable: None,
                history: Vec::new(),
                base_context,
                pending_questions: Vec::new(),
                approval_tx: None,
                clarification_tx: None,
                error: None,
                created_at: now,
                updated_at: now,
            }),
            cancelled: AtomicBool::new(false),
            wake: Notify::new(),
            events,
            handoff: None,
        }
    }

    pub fn with_handoff(mut self, handoff: Arc<dyn DeliverableHandoff>) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub async fn status(&self) -> AgentStatus {
        self.state.lock().await.status
    }

    pub async fn snapshot(&self) -> AgentSnapshot {
        let state = self.state.lock().await;
        AgentSnapshot {
            id: self.id.clone(),
            name: self.config.name.clone(),
            goal: self.config.goal.clone(),
            kind: self.config.kind,
            status: state.status,
            phase: state.phase,
            plan: state.plan.clone(),
            pending_questions: state.pending_questions.clone(),
            execution: state.execution.clone(),
            deliverable: state.deliverable.clone(),
            error: state.error.clone(),
            created_at: state.created_at,
            updated_at: state.updated_at,
        }
    }

    /// Claim the queued agent for a run. The caller then spawns [`Agent::run`].
    pub async fn mark_started(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().await;
        if state.status != AgentStatus::Queued {
            return Err(LifecycleError::AlreadyStarted(self.id.clone()));
        }
        state.status = AgentStatus::Planning;
        state.phase = Some(AgentPhase::Plan);
        state.updated_at = Utc::now();
        Ok(())
    }

    /// Drive the run to a terminal or paused state
    #[tracing::instrument(skip(self), fields(agent = %self.id, kind = ?self.config.kind))]
    pub async fn run(self: Arc<Self>) {
        self.emit(AgentEvent::Started).await;
        self.emit(AgentEvent::PhaseChanged {
            status: AgentStatus::Planning,
            phase: Some(AgentPhase::Plan),
        })
        .await;

        match self.drive().await {
            Ok(()) => tracing::info!("agent {} completed", self.config.name),
            Err(Halt::Paused) => {
                let completed_steps = {
                    let mut state = self.state.lock().await;
                    state.status = AgentStatus::Paused;
                    state.phase = None;
                    state.updated_at = Utc::now();
                    state.pending_questions.clear();
                    state.approval_tx = None;
                    state.clarification_tx = None;
                    match state.execution.as_mut() {
                        Some(execution) => {
                            execution.status = ExecutionStatus::Idle;
                            execution.results.len()
                        }
                        None => 0,
                    }
                };
                tracing::info!("agent {} paused after {} step(s)", self.config.name, completed_steps);
                self.emit(AgentEvent::Paused { completed_steps }).await;
            }
            Err(Halt::Failed(message)) => {
                tracing::warn!("agent {} failed: {}", self.config.name, message);
                {
                    let mut state = self.state.lock().await;
                    state.status = AgentStatus::Error;
                    state.phase = None;
                    state.error = Some(message.clone());
                    state.updated_at = Utc::now();
                    state.approval_tx = None;
                    state.clarification_tx = None;
                    if let Some(execution) = state.execution.as_mut() {
                        execution.status = ExecutionStatus::Error;
                        execution.error = Some(message.clone());
                    }
                }
                self.emit(AgentEvent::Error { message }).await;
            }
        }
    }

    async fn drive(&self) -> Result<(), Halt> {
        // === Plan ===
        let mut plan = generate_plan(self.config.kind, &self.config.goal, &self.config.steps, &[]);
        self.state.lock().await.plan = Some(plan.clone());
        self.emit(AgentEvent::PlanGenerated {
            plan: plan.clone(),
            regenerated: false,
        })
        .await;

        // === Clarify ===
        if self.config.require_clarification {
            plan = self.clarify_phase(plan).await?;
        }

        // === Approve ===
        plan = self.approval_phase(plan).await?;

        // === Execute ===
        let results = self.execute_phase(&plan).await?;

        // === Synthesize ===
        self.check_cancelled()?;
        {
            let mut state = self.state.lock().await;
            state.phase = Some(AgentPhase::Synthesize);
            state.updated_at = Utc::now();
        }
        self.emit(AgentEvent::PhaseChanged {
            status: AgentStatus::Running,
            phase: Some(AgentPhase::Synthesize),
        })
        .await;
        let deliverable = self.synthesize(&results).await?;

        // Observers must never see `completed` before the receiver has it
        if let Some(handoff) = &self.handoff {
            handoff.hand_off(deliverable.clone()).await;
        }
        {
            let mut state = self.state.lock().await;
            state.deliverable = Some(deliverable.clone());
            state.status = AgentStatus::Completed;
            state.phase = None;
            state.updated_at = Utc::now();
            if let Some(execution) = state.execution.as_mut() {
                execution.status = ExecutionStatus::Completed;
                execution.completed_at = Some(Utc::now());
            }
        }
        self.emit(AgentEvent::Completed { deliverable }).await;
        Ok(())
    }

    async fn clarify_phase(&self, plan: Plan) -> Result<Plan, Halt> {
        self.check_cancelled()?;
        let questions = self.config.kind.clarifying_questions();
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().await;
            state.clarification_tx = Some(tx);
            state.pending_questions = questions.clone();
        }
        self.transition(AgentStatus::AwaitingClarification).await;
        self.emit(AgentEvent::AwaitingClarification { questions }).await;

        let outcome = self.wait_for(rx, self.timeouts.clarification).await;
        {
            let mut state = self.state.lock().await;
            state.clarification_tx = None;
            state.pending_questions.clear();
        }

        let plan = match outcome {
            WaitOutcome::Stopped => return Err(Halt::Paused),
            WaitOutcome::TimedOut => {
                tracing::info!("clarification timed out, continuing without answers");
                self.emit(AgentEvent::Clarified {
                    answers: Vec::new(),
                    timed_out: true,
                })
                .await;
                plan
            }
            WaitOutcome::Received(reply) => {
                let answers: Vec<String> = reply
                    .answers
                    .iter()
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
                if !answers.is_empty() {
                    self.state
                        .lock()
                        .await
                        .base_context
                        .push(format!("Clarifications: {}", answers.join("; ")));
                }
                self.emit(AgentEvent::Clarified {
                    answers: answers.clone(),
                    timed_out: false,
                })
                .await;

                if reply.regenerate_plan {
                    let plan = generate_plan(
                        self.config.kind,
                        &self.config.goal,
                        &self.config.steps,
                        &answers,
                    );
                    self.state.lock().await.plan = Some(plan.clone());
                    self.emit(AgentEvent::PlanGenerated {
                        plan: plan.clone(),
                        regenerated: true,
                    })
                    .await;
                    plan
                } else {
                    plan
                }
            }
        };
        Ok(plan)
    }

    async fn approval_phase(&self, mut plan: Plan) -> Result<Plan, Halt> {
        self.check_cancelled()?;
        let (tx, rx) = oneshot::channel();
        self.state.lock().await.approval_tx = Some(tx);
        self.transition(AgentStatus::AwaitingApproval).await;
        self.emit(AgentEvent::AwaitingApproval { plan: plan.clone() }).await;

        let outcome = self.wait_for(rx, self.timeouts.approval).await;
        self.state.lock().await.approval_tx = None;

        match outcome {
            WaitOutcome::Stopped => return Err(Halt::Paused),
            WaitOutcome::TimedOut => {
                tracing::info!(
                    "no approval within {}s, proceeding with the plan as generated",
                    self.timeouts.approval.as_secs()
                );
                self.emit(AgentEvent::Approved {
                    feedback: None,
                    auto: true,
                })
                .await;
            }
            WaitOutcome::Received(decision) => {
                if let Some(feedback) = &decision.feedback {
                    plan.apply_feedback(feedback);
                    self.state.lock().await.plan = Some(plan.clone());
                }
                self.emit(AgentEvent::Approved {
                    feedback: decision.feedback,
                    auto: false,
                })
                .await;
            }
        }
        Ok(plan)
    }

    async fn execute_phase(&self, plan: &Plan) -> Result<Vec<StepResult>, Halt> {
        {
            let mut state = self.state.lock().await;
            state.execution = Some(ExecutionState::started());
            let brief = format!("Goal: {}\n\nThe plan has {} steps.", self.config.goal, plan.len());
            state.history.push(ChatMessage::user(brief));
        }
        self.transition(AgentStatus::Running).await;

        let total = plan.len();
        let mut results: Vec<StepResult> = Vec::with_capacity(total);

        for (index, step) in plan.steps.iter().enumerate() {
            self.check_cancelled()?;

            let base_context = {
                let mut state = self.state.lock().await;
                if let Some(execution) = state.execution.as_mut() {
                    execution.current_step_index = index;
                }
                state.base_context.clone()
            };
            self.emit(AgentEvent::StepStarted {
                index,
                title: step.title.clone(),
            })
            .await;

            let result = self.executor
                .execute(index, step, &base_context, &results)
                .await?;

            {
                let mut state = self.state.lock().await;
                let entry = match &result.error {
                    Some(error) => format!("Step {} ({}) failed: {}", index + 1, step.title, error),
                    None => format!(
                        "Step {} ({}): {}\n\n{}",
                        index + 1,
                        step.title,
                        result.summary,
                        result.details
                    ),
                };
                state.history.push(ChatMessage::assistant(entry));
                if let Some(execution) = state.execution.as_mut() {
                    execution.results.push(result.clone());
                }
                state.updated_at = Utc::now();
            }
            results.push(result.clone());

            if result.is_error() {
                self.emit(AgentEvent::StepFailed { result }).await;
            } else {
                self.emit(AgentEvent::StepCompleted { result }).await;
            }
            self.emit(AgentEvent::Progress {
                completed: results.len(),
                total,
            })
            .await;
        }

        if let Some(execution) = self.state.lock().await.execution.as_mut() {
            execution.current_step_index = total;
        }
        Ok(results)
    }

    /// Ask the gateway for the executive summary. Transient failures fall
    /// back to the step summaries.
    async fn synthesize(&self, results: &[StepResult]) -> Result<Deliverable, Halt> {
        let mut messages = self.state.lock().await.history.clone();
        messages.push(ChatMessage::user(
            "All steps are done. Write the executive summary now.",
        ));
        let system = prompts::render(
            prompts::DELIVERABLE,
            &[("agent_name", &self.config.name), ("goal", &self.config.goal)],
        );
        let request = CompletionRequest::new(system, messages).with_max_tokens(1024);

        let content = match self.gateway.chat(request).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("empty executive summary, using step summaries");
                fallback_summary(results)
            }
            Err(e) if e.is_permanent() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("executive summary failed ({}), using step summaries", e);
                fallback_summary(results)
            }
        };

        Ok(Deliverable {
            agent_id: self.id.clone(),
            agent_name: self.config.name.clone(),
            title: format!("{}: {}", self.config.name, truncate_chars(&self.config.goal, 80)),
            data_points: bullet_points(&content),
            content,
            generated_at: Utc::now(),
        })
    }

    /// Deliver an approval to an agent waiting on one
    pub async fn approve(&self, feedback: Option<String>) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().await;
        if state.status != AgentStatus::AwaitingApproval {
            return Err(LifecycleError::NotAwaitingApproval(self.id.clone()));
        }
        let tx = state
            .approval_tx
            .take()
            .ok_or_else(|| LifecycleError::NotAwaitingApproval(self.id.clone()))?;
        tx.send(ApprovalDecision { feedback })
            .map_err(|_| LifecycleError::NotAwaitingApproval(self.id.clone()))
    }

    /// Deliver clarification answers to an agent waiting on them
    pub async fn clarify(&self, answers: ClarificationAnswers) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().await;
        if state.status != AgentStatus::AwaitingClarification {
            return Err(LifecycleError::NotAwaitingClarification(self.id.clone()));
        }
        let tx = state
            .clarification_tx
            .take()
            .ok_or_else(|| LifecycleError::NotAwaitingClarification(self.id.clone()))?;
        tx.send(answers)
            .map_err(|_| LifecycleError::NotAwaitingClarification(self.id.clone()))
    }

    /// One conversational turn. Plan and execution state are untouched.
    pub async fn chat(&self, message: &str) -> Result<String, LifecycleError> {
        let messages = {
            let mut state = self.state.lock().await;
            if state.status.is_terminal() {
                return Err(LifecycleError::TerminalState(self.id.clone()));
            }
            state.history.push(ChatMessage::user(message));
            state.history.clone()
        };

        let system = prompts::render(
            prompts::AGENT_CHAT,
            &[("agent_name", &self.config.name), ("goal", &self.config.goal)],
        );
        let response = match self
            .gateway
            .chat(CompletionRequest::new(system, messages).with_max_tokens(1024))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("chat with {} failed: {}", self.config.name, e);
                CHAT_FALLBACK.to_string()
            }
        };

        self.state
            .lock()
            .await
            .history
            .push(ChatMessage::assistant(response.clone()));
        self.emit(AgentEvent::ChatResponse {
            message: message.to_string(),
            response: response.clone(),
        })
        .await;
        Ok(response)
    }

    /// Request a cooperative stop. A queued agent pauses immediately; a
    /// running one pauses at the next step boundary or wait.
    pub async fn stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_one();

        let paused_now = {
            let mut state = self.state.lock().await;
            if state.status == AgentStatus::Queued {
                state.status = AgentStatus::Paused;
                state.updated_at = Utc::now();
                true
            } else {
                false
            }
        };
        if paused_now {
            self.emit(AgentEvent::Paused { completed_steps: 0 }).await;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check_cancelled(&self) -> Result<(), Halt> {
        if self.is_cancelled() {
            Err(Halt::Paused)
        } else {
            Ok(())
        }
    }

    async fn wait_for<T>(&self, rx: oneshot::Receiver<T>, limit: Duration) -> WaitOutcome<T> {
        if self.is_cancelled() {
            return WaitOutcome::Stopped;
        }
        tokio::select! {
            _ = self.wake.notified() => WaitOutcome::Stopped,
            received = tokio::time::timeout(limit, rx) => match received {
                Ok(Ok(value)) => WaitOutcome::Received(value),
                // Sender dropped without a value: nobody can answer any more
                Ok(Err(_)) | Err(_) => WaitOutcome::TimedOut,
            },
        }
    }

    async fn transition(&self, status: AgentStatus) {
        {
            let mut state = self.state.lock().await;
            state.status = status;
            state.phase = status.phase();
            state.updated_at = Utc::now();
        }
        self.emit(AgentEvent::PhaseChanged {
            status,
            phase: status.phase(),
        })
        .await;
    }

    async fn emit(&self, event: AgentEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("event relay for {} is gone", self.id);
        }
    }
}

/// Lines of the summary that are list items, markers stripped
pub fn bullet_points(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| {
            let rest = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| line.strip_prefix("• "))
                .or_else(|| {
                    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
                    if digits == 0 {
                        return None;
                    }
                    line[digits..]
                        .strip_prefix(". ")
                        .or_else(|| line[digits..].strip_prefix(") "))
                })?;
            let rest = rest.trim();
            (!rest.is_empty()).then(|| rest.to_string())
        })
        .collect()
}

fn fallback_summary(results: &[StepResult]) -> String {
    results
        .iter()
        .filter(|r| !r.is_error())
        .map(|r| format!("- {}", r.summary))
        .collect::<Vec<_>>()
        .join("\n")
}
