//! # Orchestrator
//!
//! Collects deliverables from every agent, feeds their bullet points into the
//! insight store, and synthesizes across agents once enough deliverables
//! have arrived. Also owns the hypothesis set.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, Mutex};

use crate::gateway::{ChatMessage, CompletionGateway, CompletionRequest, GatewayError};
use crate::prompts;
use crate::state::insights::{Insight, InsightMeta, InsightStore, DEFAULT_SYNTHESIS_LIMIT};
use crate::state::SnapshotSink;

use super::agent::{Deliverable, DeliverableHandoff};
use super::events::{SwarmEvent, SwarmEventKind};
use super::hypothesis::{heuristic_evaluate, parse_evaluation, Evaluation, Hypothesis};
use super::reply::parse_json_reply;

/// Agent id and name used for events and insights the orchestrator produces
pub const ORCHESTRATOR_ID: &str = "orchestrator";
const ORCHESTRATOR_NAME: &str = "Orchestrator";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Deliverable count that triggers automatic synthesis; 0 disables it
    pub synthesis_threshold: usize,
    /// Insights included in synthesis and hypothesis prompts
    pub insight_prompt_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            synthesis_threshold: 2,
            insight_prompt_limit: DEFAULT_SYNTHESIS_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub executive_summary: String,
    pub contradictions: Vec<String>,
    pub key_findings: Vec<String>,
    /// Deliverables the synthesis covered
    pub deliverable_count: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisReply {
    #[serde(default)]
    executive_summary: String,
    #[serde(default)]
    contradictions: Vec<String>,
    #[serde(default)]
    key_findings: Vec<String>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum OrchestratorError {
    #[error("no deliverables to synthesize")]
    NoDeliverables,
    #[error("no completion gateway configured")]
    NoGateway,
    #[error("synthesis request failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("synthesis reply was empty")]
    EmptyReply,
    #[error("hypothesis not found: {0}")]
    HypothesisNotFound(String),
}

/// What happened when a deliverable was received
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub deliverable_count: usize,
    pub admitted: Vec<Insight>,
    /// Set when this deliverable crossed the threshold
    pub synthesis: Option<Result<Synthesis, OrchestratorError>>,
}

/// Serializable view for observers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorSnapshot {
    pub deliverables: Vec<Deliverable>,
    pub synthesis: Option<Synthesis>,
    pub insight_count: usize,
    pub hypothesis_count: usize,
    pub synthesis_threshold: usize,
}

#[derive(Default)]
struct Aggregate {
    deliverables: Vec<Deliverable>,
    synthesis: Option<Synthesis>,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    gateway: Option<Arc<dyn CompletionGateway>>,
    insights: Arc<InsightStore>,
    aggregate: Mutex<Aggregate>,
    hypotheses: Mutex<Vec<Hypothesis>>,
    /// Serializes synthesis runs
    synthesis_lock: Mutex<()>,
    bus: broadcast::Sender<SwarmEvent>,
    sink: Option<Arc<dyn SnapshotSink>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        gateway: Option<Arc<dyn CompletionGateway>>,
        bus: broadcast::Sender<SwarmEvent>,
    ) -> Self {
        Self {
            config,
            gateway,
            insights: Arc::new(InsightStore::new()),
            aggregate: Mutex::new(Aggregate::default()),
            hypotheses: Mutex::new(Vec::new()),
            synthesis_lock: Mutex::new(()),
            bus,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn insights(&self) -> &Arc<InsightStore> {
        &self.insights
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Accept one agent's deliverable. Synthesis runs inline when the count
    /// reaches the threshold, so it fires once per crossing.
    pub async fn receive_deliverable(&self, deliverable: Deliverable) -> DeliveryOutcome {
        let count = {
            let mut aggregate = self.aggregate.lock().await;
            aggregate.deliverables.push(deliverable.clone());
            aggregate.deliverables.len()
        };
        tracing::info!(
            "deliverable {} received from {}",
            count,
            deliverable.agent_name
        );

        let admitted = self
            .report_insights(
                &deliverable.agent_id,
                &deliverable.agent_name,
                &deliverable.data_points,
                InsightMeta::phase("deliverable"),
            )
            .await;
        self.emit(
            SwarmEventKind::OrchestratorUpdate,
            json!({ "deliverableCount": count, "from": deliverable.agent_id }),
        );

        let synthesis = if self.config.synthesis_threshold > 0 && count == self.config.synthesis_threshold {
            tracing::info!("synthesis threshold of {} reached", count);
            let result = self.synthesize().await;
            if let Err(e) = &result {
                tracing::warn!("automatic synthesis failed: {}", e);
            }
            Some(result)
        } else {
            None
        };

        DeliveryOutcome {
            deliverable_count: count,
            admitted,
            synthesis,
        }
    }

    /// Synthesize across every deliverable received so far.
    ///
    /// On failure the previous synthesis stays in place and observers get an
    /// `orchestratorUpdate` carrying `synthesisError`.
    pub async fn synthesize(&self) -> Result<Synthesis, OrchestratorError> {
        let result = self.run_synthesis().await;
        if let Err(e) = &result {
            self.emit(
                SwarmEventKind::OrchestratorUpdate,
                json!({ "synthesisError": e.to_string() }),
            );
        }
        result
    }

    #[tracing::instrument(skip(self))]
    async fn run_synthesis(&self) -> Result<Synthesis, OrchestratorError> {
        let _running = self.synthesis_lock.lock().await;

        let deliverables = self.aggregate.lock().await.deliverables.clone();
        if deliverables.is_empty() {
            return Err(OrchestratorError::NoDeliverables);
        }
        let gateway = self.gateway.as_ref().ok_or(OrchestratorError::NoGateway)?;

        let mut prompt = String::from("# Deliverables\n");
        for d in &deliverables {
            prompt.push_str(&format!("\n## {} ({})\n\n{}\n", d.agent_name, d.title, d.content));
        }
        let known = self.insights.for_synthesis(self.config.insight_prompt_limit).await;
        if !known.is_empty() {
            prompt.push_str("\n# Insights reported so far\n\n");
            for insight in &known {
                prompt.push_str(&format!("- {} ({})\n", insight.text, insight.agent_name));
            }
        }

        let request = CompletionRequest::new(prompts::SYNTHESIS, vec![ChatMessage::user(prompt)])
            .with_temperature(0.3);
        let text = gateway.chat(request).await?;

        let reply = match parse_json_reply::<SynthesisReply>(&text) {
            Some(reply) if !reply.executive_summary.trim().is_empty() => reply,
            _ if !text.trim().is_empty() => {
                tracing::debug!("synthesis reply was not JSON, keeping it as the summary");
                SynthesisReply {
                    executive_summary: text.trim().to_string(),
                    ..Default::default()
                }
            }
            _ => return Err(OrchestratorError::EmptyReply),
        };

        let synthesis = Synthesis {
            executive_summary: reply.executive_summary,
            contradictions: reply.contradictions,
            key_findings: reply.key_findings,
            deliverable_count: deliverables.len(),
            generated_at: Utc::now(),
        };
        self.aggregate.lock().await.synthesis = Some(synthesis.clone());

        self.report_insights(
            ORCHESTRATOR_ID,
            ORCHESTRATOR_NAME,
            &synthesis.key_findings,
            InsightMeta::phase("synthesis"),
        )
        .await;
        self.emit(
            SwarmEventKind::OrchestratorUpdate,
            json!({ "synthesis": synthesis }),
        );
        Ok(synthesis)
    }

    /// Report candidates to the insight store; emits only for admitted ones
    pub async fn report_insights(
        &self,
        agent_id: &str,
        agent_name: &str,
        candidates: &[String],
        meta: InsightMeta,
    ) -> Vec<Insight> {
        let admitted = self.insights.report(agent_id, agent_name, candidates, meta).await;
        if !admitted.is_empty() {
            if let Some(sink) = &self.sink {
                if let Err(e) = sink.save_insights(&admitted) {
                    tracing::warn!("failed to persist insights: {:#}", e);
                }
            }
            self.emit(
                SwarmEventKind::InsightReported,
                json!({ "insights": admitted }),
            );
        }
        admitted
    }

    pub async fn delete_insight(&self, id: &str) -> bool {
        let removed = self.insights.delete(id).await;
        if removed {
            if let Some(sink) = &self.sink {
                if let Err(e) = sink.delete_insight(id) {
                    tracing::warn!("failed to delete persisted insight {}: {:#}", id, e);
                }
            }
        }
        removed
    }

    /// Create and evaluate a new hypothesis
    pub async fn evaluate_hypothesis(&self, text: &str) -> Hypothesis {
        let mut hypothesis = Hypothesis::new(text.trim());
        hypothesis.apply(self.evaluate(&hypothesis.text).await);
        self.hypotheses.lock().await.push(hypothesis.clone());
        self.hypothesis_updated(&hypothesis);
        hypothesis
    }

    /// Evaluate an existing hypothesis again against the current insights
    pub async fn reevaluate_hypothesis(&self, id: &str) -> Result<Hypothesis, OrchestratorError> {
        let text = {
            let hypotheses = self.hypotheses.lock().await;
            hypotheses
                .iter()
                .find(|h| h.id == id)
                .map(|h| h.text.clone())
                .ok_or_else(|| OrchestratorError::HypothesisNotFound(id.to_string()))?
        };

        let evaluation = self.evaluate(&text).await;

        let updated = {
            let mut hypotheses = self.hypotheses.lock().await;
            let hypothesis = hypotheses
                .iter_mut()
                .find(|h| h.id == id)
                .ok_or_else(|| OrchestratorError::HypothesisNotFound(id.to_string()))?;
            hypothesis.apply(evaluation);
            hypothesis.clone()
        };
        self.hypothesis_updated(&updated);
        Ok(updated)
    }

    pub async fn hypotheses(&self) -> Vec<Hypothesis> {
        self.hypotheses.lock().await.clone()
    }

    async fn evaluate(&self, text: &str) -> Evaluation {
        let insights: Vec<String> = self
            .insights
            .for_synthesis(self.config.insight_prompt_limit)
            .await
            .into_iter()
            .map(|i| i.text)
            .collect();

        let Some(gateway) = &self.gateway else {
            return heuristic_evaluate(text, &insights);
        };
        if insights.is_empty() {
            return heuristic_evaluate(text, &insights);
        }

        let listing: Vec<String> = insights.iter().map(|i| format!("- {}", i)).collect();
        let prompt = format!("Hypothesis: {}\n\nInsights:\n{}", text, listing.join("\n"));
        let request = CompletionRequest::new(prompts::HYPOTHESIS, vec![ChatMessage::user(prompt)])
            .with_temperature(0.2)
            .with_max_tokens(1024);

        match gateway.chat(request).await {
            Ok(reply) => parse_evaluation(&reply).unwrap_or_else(|| {
                tracing::warn!("hypothesis verdict was not JSON, using keyword heuristic");
                heuristic_evaluate(text, &insights)
            }),
            Err(e) => {
                tracing::warn!("hypothesis evaluation failed ({}), using keyword heuristic", e);
                heuristic_evaluate(text, &insights)
            }
        }
    }

    fn hypothesis_updated(&self, hypothesis: &Hypothesis) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.save_hypothesis(hypothesis) {
                tracing::warn!("failed to persist hypothesis: {:#}", e);
            }
        }
        self.emit(
            SwarmEventKind::HypothesisUpdated,
            json!({ "hypothesis": hypothesis }),
        );
    }

    /// Clear deliverables and synthesis. Insights and hypotheses stay.
    pub async fn reset(&self) {
        {
            let mut aggregate = self.aggregate.lock().await;
            aggregate.deliverables.clear();
            aggregate.synthesis = None;
        }
        self.emit(SwarmEventKind::OrchestratorUpdate, json!({ "reset": true }));
    }

    pub async fn synthesis(&self) -> Option<Synthesis> {
        self.aggregate.lock().await.synthesis.clone()
    }

    pub async fn deliverables(&self) -> Vec<Deliverable> {
        self.aggregate.lock().await.deliverables.clone()
    }

    pub async fn snapshot(&self) -> OrchestratorSnapshot {
        let (deliverables, synthesis) = {
            let aggregate = self.aggregate.lock().await;
            (aggregate.deliverables.clone(), aggregate.synthesis.clone())
        };
        OrchestratorSnapshot {
            deliverables,
            synthesis,
            insight_count: self.insights.len().await,
            hypothesis_count: self.hypotheses.lock().await.len(),
            synthesis_threshold: self.config.synthesis_threshold,
        }
    }

    /// Combined markdown report over the current synthesis and deliverables
    pub async fn report(&self) -> String {
        let (deliverables, synthesis) = {
            let aggregate = self.aggregate.lock().await;
            (aggregate.deliverables.clone(), aggregate.synthesis.clone())
        };

        let mut out = String::from("# Combined Report\n\n");
        out.push_str("## Executive Summary\n\n");
        match &synthesis {
            Some(s) => out.push_str(&format!("{}\n\n", s.executive_summary)),
            None => out.push_str("_No synthesis has been run yet._\n\n"),
        }

        if let Some(s) = &synthesis {
            if !s.key_findings.is_empty() {
                out.push_str("## Key Findings\n\n");
                for finding in &s.key_findings {
                    out.push_str(&format!("- {}\n", finding));
                }
                out.push('\n');
            }
            if !s.contradictions.is_empty() {
                out.push_str("## Contradictions\n\n");
                for contradiction in &s.contradictions {
                    out.push_str(&format!("- {}\n", contradiction));
                }
                out.push('\n');
            }
        }

        out.push_str("## Agent Deliverables\n\n");
        if deliverables.is_empty() {
            out.push_str("_No deliverables yet._\n");
        }
        for d in &deliverables {
            out.push_str(&format!(
                "### {}\n\n_{} · {}_\n\n{}\n\n",
                d.title,
                d.agent_name,
                d.generated_at.format("%Y-%m-%d %H:%M UTC"),
                d.content.trim()
            ));
        }
        out
    }

    fn emit(&self, kind: SwarmEventKind, data: serde_json::Value) {
        // No subscribers is fine
        let _ = self
            .bus
            .send(SwarmEvent::new(kind, ORCHESTRATOR_ID).with_data(data));
    }
}

#[async_trait]
impl DeliverableHandoff for Orchestrator {
    async fn hand_off(&self, deliverable: Deliverable) {
        self.receive_deliverable(deliverable).await;
    }
}
