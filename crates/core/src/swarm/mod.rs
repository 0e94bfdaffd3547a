//! # Swarm
//!
//! Agents, the coordinator that owns them, and the orchestrator that
//! combines their deliverables.
//!
//! ## Event Flow
//!
//! ```text
//! Agent ──hand-off──▶ Orchestrator (before `completed`)
//!   │
//!   └──mpsc──▶ relay task ──broadcast──▶ observers (SSE, CLI)
//! ```

pub mod agent;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod executor;
pub mod hypothesis;
pub mod orchestrator;
pub mod plan;
mod reply;

pub use agent::{
    Agent, AgentConfig, AgentPhase, AgentSnapshot, AgentStatus, AgentTimeouts, ApprovalDecision,
    ClarificationAnswers, Deliverable, DeliverableHandoff, ExecutionState, ExecutionStatus,
};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::LifecycleError;
pub use events::{AgentEvent, SwarmEvent, SwarmEventKind};
pub use executor::{StepExecutor, StepResult, ToolSet};
pub use hypothesis::{Hypothesis, HypothesisStatus};
pub use orchestrator::{
    DeliveryOutcome, Orchestrator, OrchestratorConfig, OrchestratorError, OrchestratorSnapshot,
    Synthesis,
};
pub use plan::{AgentKind, Plan, WorkPlanStep};
