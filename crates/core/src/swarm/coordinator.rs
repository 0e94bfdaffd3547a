//! # Swarm Coordinator
//!
//! Registry of live agents. Each agent gets one relay task that forwards its
//! events, in order, onto the broadcast bus. Each agent hands its deliverable
//! to the orchestrator before it flips to `completed`, so neither a snapshot
//! nor the bus can report completion ahead of the orchestrator.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::gateway::GatewayFactory;
use crate::models::{LlmProvider, ModelConfig};
use crate::state::SnapshotSink;
use crate::tools::{CsvBundleWriter, SearxngSearch};

use super::agent::{
    Agent, AgentConfig, AgentSnapshot, AgentTimeouts, ClarificationAnswers, DeliverableHandoff,
    AGENT_EVENT_BUFFER,
};
use super::error::LifecycleError;
use super::events::{AgentEvent, SwarmEvent, SwarmEventKind};
use super::executor::ToolSet;
use super::orchestrator::{Orchestrator, OrchestratorConfig};

/// Configuration for the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Global LLM provider (default: Anthropic)
    pub global_provider: LlmProvider,
    /// Global model to use for all agents
    pub global_model: Option<String>,
    /// Base URL override for LLM API (for OpenAI-compatible endpoints)
    pub base_url: Option<String>,
    /// Per-agent model overrides, keyed by agent name or kind id
    pub per_agent_models: HashMap<String, String>,
    /// Per-agent provider overrides, keyed by agent name or kind id
    pub per_agent_providers: HashMap<String, LlmProvider>,
    /// Per-agent base URL overrides (OpenAI only)
    pub per_agent_base_urls: HashMap<String, String>,
    /// Seconds an agent waits for plan approval before proceeding
    pub approval_timeout_secs: u64,
    /// Seconds an agent waits for clarification answers
    pub clarification_timeout_secs: u64,
    /// Deliverables needed before synthesis runs automatically
    pub synthesis_threshold: usize,
    /// Insights included in synthesis and hypothesis prompts
    pub insight_prompt_limit: usize,
    /// Custom SearXNG instance URL (overrides auto-discovery)
    pub searxng_url: Option<String>,
    pub enable_search: bool,
    pub enable_spreadsheets: bool,
    /// Where generated spreadsheets are written
    pub output_dir: PathBuf,
    /// Capacity of the broadcast bus
    pub event_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            global_provider: LlmProvider::Anthropic,
            global_model: None,
            base_url: None,
            per_agent_models: HashMap::new(),
            per_agent_providers: HashMap::new(),
            per_agent_base_urls: HashMap::new(),
            approval_timeout_secs: 600,
            clarification_timeout_secs: 600,
            synthesis_threshold: 2,
            insight_prompt_limit: 50,
            searxng_url: None,
            enable_search: true,
            enable_spreadsheets: true,
            output_dir: PathBuf::from(".quorum/files"),
            event_buffer: 1024,
        }
    }
}

impl CoordinatorConfig {
    pub fn timeouts(&self) -> AgentTimeouts {
        AgentTimeouts {
            approval: Duration::from_secs(self.approval_timeout_secs),
            clarification: Duration::from_secs(self.clarification_timeout_secs),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            synthesis_threshold: self.synthesis_threshold,
            insight_prompt_limit: self.insight_prompt_limit,
        }
    }

    /// Collaborators enabled by this configuration
    pub fn tool_set(&self) -> ToolSet {
        let mut tools = ToolSet::none();
        if self.enable_search {
            tools = tools.with_search(Arc::new(SearxngSearch::new(self.searxng_url.as_deref())));
        }
        if self.enable_spreadsheets {
            tools = tools.with_spreadsheet(Arc::new(CsvBundleWriter::new(&self.output_dir)));
        }
        tools
    }

    /// Resolve the model for an agent: the agent's own choice, then a
    /// per-agent override (by name, then kind), then the global setting.
    pub fn model_config(&self, agent: &AgentConfig) -> ModelConfig {
        let keys = [agent.name.as_str(), agent.kind.id()];
        let lookup = |map: &HashMap<String, String>| -> Option<String> {
            keys.iter().find_map(|k| map.get(*k).cloned())
        };

        let provider = agent
            .provider
            .or_else(|| keys.iter().find_map(|k| self.per_agent_providers.get(*k).copied()))
            .unwrap_or(self.global_provider);

        let model = agent
            .model
            .clone()
            .or_else(|| lookup(&self.per_agent_models))
            .or_else(|| self.global_model.clone())
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = if provider.supports_base_url() {
            lookup(&self.per_agent_base_urls).or_else(|| self.base_url.clone())
        } else {
            None
        };

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }

    /// Model used by the orchestrator
    pub fn global_model_config(&self) -> ModelConfig {
        let provider = self.global_provider;
        ModelConfig {
            provider,
            model: self
                .global_model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            base_url: self.base_url.clone().filter(|_| provider.supports_base_url()),
        }
    }
}

struct AgentEntry {
    agent: Arc<Agent>,
    relay: JoinHandle<()>,
}

/// The swarm coordinator
pub struct Coordinator {
    config: CoordinatorConfig,
    gateways: Arc<dyn GatewayFactory>,
    tools: ToolSet,
    timeouts: AgentTimeouts,
    agents: RwLock<HashMap<String, AgentEntry>>,
    orchestrator: Arc<Orchestrator>,
    bus: broadcast::Sender<SwarmEvent>,
    sink: Option<Arc<dyn SnapshotSink>>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, gateways: Arc<dyn GatewayFactory>) -> Self {
        let (bus, _) = broadcast::channel(config.event_buffer.max(16));
        let orchestrator = Self::build_orchestrator(&config, gateways.as_ref(), &bus, None);
        Self {
            tools: config.tool_set(),
            timeouts: config.timeouts(),
            config,
            gateways,
            agents: RwLock::new(HashMap::new()),
            orchestrator,
            bus,
            sink: None,
        }
    }

    fn build_orchestrator(
        config: &CoordinatorConfig,
        gateways: &dyn GatewayFactory,
        bus: &broadcast::Sender<SwarmEvent>,
        sink: Option<Arc<dyn SnapshotSink>>,
    ) -> Arc<Orchestrator> {
        let gateway = gateways.create(&config.global_model_config());
        let mut orchestrator =
            Orchestrator::new(config.orchestrator_config(), Some(gateway), bus.clone());
        if let Some(sink) = sink {
            orchestrator = orchestrator.with_sink(sink);
        }
        Arc::new(orchestrator)
    }

    /// Replace the collaborators derived from the configuration
    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_timeouts(mut self, timeouts: AgentTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Persist snapshots through `sink`. Call before any agent is created.
    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.orchestrator = Self::build_orchestrator(
            &self.config,
            self.gateways.as_ref(),
            &self.bus,
            Some(Arc::clone(&sink)),
        );
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.bus.subscribe()
    }

    pub fn get_model_config(&self, agent: &AgentConfig) -> ModelConfig {
        self.config.model_config(agent)
    }

    /// Register a new queued agent
    pub async fn create(&self, config: AgentConfig) -> AgentSnapshot {
        let id = uuid::Uuid::new_v4().to_string();
        let model = self.get_model_config(&config);
        let gateway = self.gateways.create(&model);
        let (tx, rx) = mpsc::channel(AGENT_EVENT_BUFFER);

        let handoff: Arc<dyn DeliverableHandoff> = self.orchestrator.clone();
        let agent = Arc::new(
            Agent::new(id.clone(), config, gateway, self.tools.clone(), self.timeouts, tx)
                .with_handoff(handoff),
        );
        let relay = tokio::spawn(relay_events(
            id.clone(),
            Arc::downgrade(&agent),
            rx,
            self.bus.clone(),
            self.sink.clone(),
        ));

        let snapshot = agent.snapshot().await;
        self.agents
            .write()
            .await
            .insert(id.clone(), AgentEntry { agent, relay });

        tracing::info!(
            "created agent {} ({}) on {} / {}",
            snapshot.name,
            id,
            model.provider.display_name(),
            model.model
        );
        self.persist(&snapshot);
        self.broadcast(
            SwarmEvent::new(SwarmEventKind::Created, &id)
                .with_data(json!({ "agent": snapshot, "model": model })),
        );
        snapshot
    }

    async fn agent(&self, id: &str) -> Result<Arc<Agent>, LifecycleError> {
        self.agents
            .read()
            .await
            .get(id)
            .map(|entry| Arc::clone(&entry.agent))
            .ok_or_else(|| LifecycleError::AgentNotFound(id.to_string()))
    }

    /// Begin the agent's run on its own task
    pub async fn start(&self, id: &str) -> Result<(), LifecycleError> {
        let agent = self.agent(id).await?;
        agent.mark_started().await?;
        tokio::spawn(agent.run());
        Ok(())
    }

    pub async fn stop(&self, id: &str) -> Result<(), LifecycleError> {
        self.agent(id).await?.stop().await;
        Ok(())
    }

    /// Stop and deregister. Unknown ids are a no-op; returns whether one was removed.
    pub async fn delete(&self, id: &str) -> bool {
        let Some(entry) = self.agents.write().await.remove(id) else {
            return false;
        };
        entry.agent.stop().await;
        entry.relay.abort();

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.delete_agent(id) {
                tracing::warn!("failed to delete persisted agent {}: {:#}", id, e);
            }
        }
        self.broadcast(SwarmEvent::new(SwarmEventKind::Deleted, id));
        true
    }

    pub async fn chat(&self, id: &str, message: &str) -> Result<String, LifecycleError> {
        self.agent(id).await?.chat(message).await
    }

    pub async fn submit_approval(
        &self,
        id: &str,
        feedback: Option<String>,
    ) -> Result<(), LifecycleError> {
        self.agent(id).await?.approve(feedback).await
    }

    pub async fn submit_clarification(
        &self,
        id: &str,
        answers: ClarificationAnswers,
    ) -> Result<(), LifecycleError> {
        self.agent(id).await?.clarify(answers).await
    }

    pub async fn get(&self, id: &str) -> Result<AgentSnapshot, LifecycleError> {
        Ok(self.agent(id).await?.snapshot().await)
    }

    /// Every registered agent, oldest first
    pub async fn list_all(&self) -> Vec<AgentSnapshot> {
        let agents: Vec<Arc<Agent>> = self
            .agents
            .read()
            .await
            .values()
            .map(|entry| Arc::clone(&entry.agent))
            .collect();

        let mut snapshots = Vec::with_capacity(agents.len());
        for agent in agents {
            snapshots.push(agent.snapshot().await);
        }
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        snapshots
    }

    fn persist(&self, snapshot: &AgentSnapshot) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.save_agent(snapshot) {
                tracing::warn!("failed to persist agent {}: {:#}", snapshot.id, e);
            }
        }
    }

    fn broadcast(&self, event: SwarmEvent) {
        // Nobody listening is fine
        let _ = self.bus.send(event);
    }
}

/// Forward one agent's events to the bus, preserving their order
async fn relay_events(
    agent_id: String,
    agent: Weak<Agent>,
    mut events: mpsc::Receiver<AgentEvent>,
    bus: broadcast::Sender<SwarmEvent>,
    sink: Option<Arc<dyn SnapshotSink>>,
) {
    while let Some(event) = events.recv().await {
        let persist = matches!(
            event,
            AgentEvent::PhaseChanged { .. }
                | AgentEvent::PlanGenerated { .. }
                | AgentEvent::StepCompleted { .. }
                | AgentEvent::StepFailed { .. }
                | AgentEvent::Paused { .. }
                | AgentEvent::Completed { .. }
                | AgentEvent::Error { .. }
        );
        if persist {
            if let (Some(sink), Some(agent)) = (&sink, agent.upgrade()) {
                let snapshot = agent.snapshot().await;
                if let Err(e) = sink.save_agent(&snapshot) {
                    tracing::warn!("failed to persist agent {}: {:#}", agent_id, e);
                }
            }
        }

        let _ = bus.send(event.into_swarm_event(&agent_id));
    }
    tracing::debug!("event relay for {} finished", agent_id);
}
