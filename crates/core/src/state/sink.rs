//! Write-only persistence boundary for swarm state.

use std::sync::Arc;

use anyhow::Result;

use super::db::QuorumDb;
use super::insights::Insight;
use crate::swarm::agent::AgentSnapshot;
use crate::swarm::hypothesis::Hypothesis;

/// Receives snapshots as the swarm changes. Failures are logged by callers
/// and never interrupt a run.
pub trait SnapshotSink: Send + Sync {
    fn save_agent(&self, snapshot: &AgentSnapshot) -> Result<()>;
    fn delete_agent(&self, id: &str) -> Result<()>;
    fn save_insights(&self, insights: &[Insight]) -> Result<()>;
    fn delete_insight(&self, id: &str) -> Result<()>;
    fn save_hypothesis(&self, hypothesis: &Hypothesis) -> Result<()>;
}

/// [`SnapshotSink`] backed by [`QuorumDb`]
#[derive(Clone)]
pub struct SqliteSink {
    db: Arc<QuorumDb>,
}

impl SqliteSink {
    pub fn new(db: Arc<QuorumDb>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<QuorumDb> {
        &self.db
    }
}

impl SnapshotSink for SqliteSink {
    fn save_agent(&self, snapshot: &AgentSnapshot) -> Result<()> {
        self.db.upsert_agent(snapshot)
    }

    fn delete_agent(&self, id: &str) -> Result<()> {
        self.db.delete_agent(id)
    }

    fn save_insights(&self, insights: &[Insight]) -> Result<()> {
        self.db.insert_insights(insights)
    }

    fn delete_insight(&self, id: &str) -> Result<()> {
        self.db.delete_insight(id)
    }

    fn save_hypothesis(&self, hypothesis: &Hypothesis) -> Result<()> {
        self.db.upsert_hypothesis(hypothesis)
    }
}
