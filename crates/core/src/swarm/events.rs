//! # Swarm Events
//!
//! Agents publish [`AgentEvent`]s on their own channel; the coordinator
//! relays them onto the broadcast bus as [`SwarmEvent`]s, the JSON-shaped
//! form observers receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::agent::{AgentPhase, AgentStatus, Deliverable};
use super::executor::StepResult;
use super::plan::Plan;

/// Kind of swarm event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SwarmEventKind {
    /// Agent registered with the coordinator
    Created,
    /// Agent run started
    Started,
    /// Agent moved to another lifecycle state
    PhaseChanged,
    /// Plan produced (or regenerated)
    PlanGenerated,
    /// Agent is waiting for clarification answers
    AwaitingClarification,
    /// Clarification answers applied (or timed out)
    Clarified,
    /// Agent is waiting for plan approval
    AwaitingApproval,
    /// Plan approved, explicitly or by timeout
    Approved,
    StepStarted,
    StepCompleted,
    StepFailed,
    Progress,
    /// Stop observed; accumulated results retained
    Paused,
    /// Deliverable produced and handed to the orchestrator
    Completed,
    /// Run abandoned
    Error,
    ChatResponse,
    /// Agent removed from the registry
    Deleted,
    // === Orchestrator events ===
    InsightReported,
    OrchestratorUpdate,
    HypothesisUpdated,
}

/// An event on the broadcast bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmEvent {
    /// Unique event ID
    pub id: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Kind of event
    pub kind: SwarmEventKind,
    /// Agent id, or "orchestrator"
    pub agent: String,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl SwarmEvent {
    /// Create a new event
    pub fn new(kind: SwarmEventKind, agent: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            agent: agent.to_string(),
            data: None,
        }
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Lifecycle event produced by one agent, in state-machine order
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Started,
    PhaseChanged {
        status: AgentStatus,
        phase: Option<AgentPhase>,
    },
    PlanGenerated {
        plan: Plan,
        regenerated: bool,
    },
    AwaitingClarification {
        questions: Vec<String>,
    },
    Clarified {
        answers: Vec<String>,
        timed_out: bool,
    },
    AwaitingApproval {
        plan: Plan,
    },
    Approved {
        feedback: Option<String>,
        auto: bool,
    },
    StepStarted {
        index: usize,
        title: String,
    },
    StepCompleted {
        result: StepResult,
    },
    StepFailed {
        result: StepResult,
    },
    Progress {
        completed: usize,
        total: usize,
    },
    Paused {
        completed_steps: usize,
    },
    Completed {
        deliverable: Deliverable,
    },
    Error {
        message: String,
    },
    ChatResponse {
        message: String,
        response: String,
    },
}

impl AgentEvent {
    pub fn kind(&self) -> SwarmEventKind {
        match self {
            AgentEvent::Started => SwarmEventKind::Started,
            AgentEvent::PhaseChanged { .. } => SwarmEventKind::PhaseChanged,
            AgentEvent::PlanGenerated { .. } => SwarmEventKind::PlanGenerated,
            AgentEvent::AwaitingClarification { .. } => SwarmEventKind::AwaitingClarification,
            AgentEvent::Clarified { .. } => SwarmEventKind::Clarified,
            AgentEvent::AwaitingApproval { .. } => SwarmEventKind::AwaitingApproval,
            AgentEvent::Approved { .. } => SwarmEventKind::Approved,
            AgentEvent::StepStarted { .. } => SwarmEventKind::StepStarted,
            AgentEvent::StepCompleted { .. } => SwarmEventKind::StepCompleted,
            AgentEvent::StepFailed { .. } => SwarmEventKind::StepFailed,
            AgentEvent::Progress { .. } => SwarmEventKind::Progress,
            AgentEvent::Paused { .. } => SwarmEventKind::Paused,
            AgentEvent::Completed { .. } => SwarmEventKind::Completed,
            AgentEvent::Error { .. } => SwarmEventKind::Error,
            AgentEvent::ChatResponse { .. } => SwarmEventKind::ChatResponse,
        }
    }

    /// Convert into the bus representation
    pub fn into_swarm_event(self, agent_id: &str) -> SwarmEvent {
        let event = SwarmEvent::new(self.kind(), agent_id);
        let data = match self {
            AgentEvent::Started => return event,
            AgentEvent::PhaseChanged { status, phase } => {
                json!({ "status": status, "phase": phase })
            }
            AgentEvent::PlanGenerated { plan, regenerated } => {
                json!({ "plan": plan, "regenerated": regenerated })
            }
            AgentEvent::AwaitingClarification { questions } => json!({ "questions": questions }),
            AgentEvent::Clarified { answers, timed_out } => {
                json!({ "answers": answers, "timedOut": timed_out })
            }
            AgentEvent::AwaitingApproval { plan } => json!({ "plan": plan }),
            AgentEvent::Approved { feedback, auto } => json!({ "feedback": feedback, "auto": auto }),
            AgentEvent::StepStarted { index, title } => json!({ "stepIndex": index, "title": title }),
            AgentEvent::StepCompleted { result } | AgentEvent::StepFailed { result } => {
                json!({ "result": result })
            }
            AgentEvent::Progress { completed, total } => json!({
                "completed": completed,
                "total": total,
                "percent": if total == 0 { 100 } else { completed * 100 / total },
            }),
            AgentEvent::Paused { completed_steps } => json!({ "completedSteps": completed_steps }),
            AgentEvent::Completed { deliverable } => json!({ "deliverable": deliverable }),
            AgentEvent::Error { message } => json!({ "message": message }),
            AgentEvent::ChatResponse { message, response } => {
                json!({ "message": message, "response": response })
            }
        };
        event.with_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = SwarmEvent::new(SwarmEventKind::StepStarted, "agent-1")
            .with_data(json!({"stepIndex": 0}));

        assert_eq!(event.agent, "agent-1");
        assert_eq!(event.data.unwrap()["stepIndex"], 0);
    }

    #[test]
    fn test_kind_uses_camel_case_names() {
        let json = serde_json::to_string(&SwarmEventKind::PlanGenerated).unwrap();
        assert_eq!(json, "\"planGenerated\"");
        let json = serde_json::to_string(&SwarmEventKind::HypothesisUpdated).unwrap();
        assert_eq!(json, "\"hypothesisUpdated\"");
    }

    #[test]
    fn test_progress_payload_has_percent() {
        let event = AgentEvent::Progress {
            completed: 3,
            total: 4,
        }
        .into_swarm_event("agent-7");
        assert_eq!(event.kind, SwarmEventKind::Progress);
        assert_eq!(event.data.unwrap()["percent"], 75);
    }

    #[test]
    fn test_started_has_no_payload() {
        let event = AgentEvent::Started.into_swarm_event("agent-2");
        assert!(event.data.is_none());
    }
}
