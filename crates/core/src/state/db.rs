//! # Quorum Database
//!
//! Single SQLite database holding agent snapshots, insights and hypotheses.
//! Written as the swarm runs; only read back for inspection, never to drive
//! a live run.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::state::insights::Insight;
use crate::swarm::agent::AgentSnapshot;
use crate::swarm::hypothesis::Hypothesis;

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Default database location, relative to the working directory
pub const DEFAULT_DB_PATH: &str = ".quorum/quorum.db";

pub struct QuorumDb {
    conn: Arc<Mutex<Connection>>,
}

impl QuorumDb {
    /// Open or create the database at `.quorum/quorum.db`
    pub fn open() -> Result<Self> {
        Self::open_at(DEFAULT_DB_PATH)
    }

    /// Open database at a specific path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open quorum database at {}", path.as_ref().display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [1],
            )?;
        }

        Ok(())
    }

    fn migrate_v1(conn: &Connection) -> Result<()> {
        // Latest snapshot per agent, full JSON in `data`
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS insights (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                text TEXT NOT NULL,
                source_step_index INTEGER,
                phase TEXT NOT NULL DEFAULT '',
                reported_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS hypotheses (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                last_evaluated_at TEXT
            )
            "#,
            [],
        )?;

        Ok(())
    }

    pub fn upsert_agent(&self, snapshot: &AgentSnapshot) -> Result<()> {
        let conn = self.lock()?;
        let data = serde_json::to_string(snapshot)?;
        conn.execute(
            "INSERT OR REPLACE INTO agents (id, name, kind, status, data, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.id,
                snapshot.name,
                enum_label(&snapshot.kind)?,
                enum_label(&snapshot.status)?,
                data,
                snapshot.updated_at.to_rfc3339(),
            ],
        )
        .context("Failed to save agent snapshot")?;
        Ok(())
    }

    pub fn delete_agent(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM agents WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn get_agent(&self, id: &str) -> Result<Option<AgentSnapshot>> {
        let conn = self.lock()?;
        let data: Option<String> = conn
            .query_row("SELECT data FROM agents WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        data.map(|d| serde_json::from_str(&d).context("Corrupt agent snapshot"))
            .transpose()
    }

    pub fn list_agents(&self) -> Result<Vec<AgentSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT data FROM agents ORDER BY updated_at")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut agents: Vec<AgentSnapshot> = Vec::new();
        for row in rows {
            agents.push(serde_json::from_str(&row?).context("Corrupt agent snapshot")?);
        }
        Ok(agents)
    }

    pub fn insert_insights(&self, insights: &[Insight]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for insight in insights {
            tx.execute(
                "INSERT OR REPLACE INTO insights
                 (id, agent_id, agent_name, text, source_step_index, phase, reported_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    insight.id,
                    insight.agent_id,
                    insight.agent_name,
                    insight.text,
                    insight.source_step_index.map(|i| i as i64),
                    insight.phase,
                    insight.reported_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit().context("Failed to save insights")?;
        Ok(())
    }

    pub fn delete_insight(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM insights WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Insight texts, oldest first
    pub fn list_insight_texts(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT text FROM insights ORDER BY reported_at, rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut texts = Vec::new();
        for row in rows {
            texts.push(row?);
        }
        Ok(texts)
    }

    pub fn upsert_hypothesis(&self, hypothesis: &Hypothesis) -> Result<()> {
        let conn = self.lock()?;
        let data = serde_json::to_string(hypothesis)?;
        conn.execute(
            "INSERT OR REPLACE INTO hypotheses (id, text, status, data, last_evaluated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                hypothesis.id,
                hypothesis.text,
                enum_label(&hypothesis.status)?,
                data,
                hypothesis.last_evaluated_at.map(|t| t.to_rfc3339()),
            ],
        )
        .context("Failed to save hypothesis")?;
        Ok(())
    }

    pub fn list_hypotheses(&self) -> Result<Vec<Hypothesis>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT data FROM hypotheses ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut hypotheses: Vec<Hypothesis> = Vec::new();
        for row in rows {
            hypotheses.push(serde_json::from_str(&row?).context("Corrupt hypothesis")?);
        }
        Ok(hypotheses)
    }
}

/// Serialized name of a unit enum variant, e.g. `awaiting_approval`
fn enum_label<T: serde::Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::agent::AgentStatus;
    use crate::swarm::hypothesis::HypothesisStatus;
    use crate::swarm::plan::AgentKind;
    use chrono::Utc;
    use tempfile::TempDir;

    fn snapshot(id: &str, status: AgentStatus) -> AgentSnapshot {
        AgentSnapshot {
            id: id.to_string(),
            name: "Scout".to_string(),
            goal: "EV chargers".to_string(),
            kind: AgentKind::MarketAnalysis,
            status,
            phase: None,
            plan: None,
            pending_questions: Vec::new(),
            execution: None,
            deliverable: None,
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_creates_tables() {
        let dir = TempDir::new().unwrap();
        let db = QuorumDb::open_at(dir.path().join("nested/quorum.db")).unwrap();
        let conn = db.lock().unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"agents".to_string()));
        assert!(tables.contains(&"insights".to_string()));
        assert!(tables.contains(&"hypotheses".to_string()));
    }

    #[test]
    fn test_schema_version_tracking() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quorum.db");

        // Open twice - should not fail on second open
        drop(QuorumDb::open_at(&path).unwrap());
        let db = QuorumDb::open_at(&path).unwrap();
        let conn = db.lock().unwrap();

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_agent_upsert_replaces_previous_snapshot() {
        let db = QuorumDb::open_in_memory().unwrap();
        db.upsert_agent(&snapshot("a1", AgentStatus::Queued)).unwrap();
        db.upsert_agent(&snapshot("a1", AgentStatus::Running)).unwrap();

        let agents = db.list_agents().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].status, AgentStatus::Running);

        let status: String = db
            .lock()
            .unwrap()
            .query_row("SELECT status FROM agents WHERE id = 'a1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "running");

        db.delete_agent("a1").unwrap();
        assert!(db.get_agent("a1").unwrap().is_none());
    }

    #[test]
    fn test_insights_and_hypotheses_round_trip() {
        let db = QuorumDb::open_in_memory().unwrap();
        let insight = Insight {
            id: "i1".into(),
            agent_id: "a1".into(),
            agent_name: "Scout".into(),
            text: "Demand grew".into(),
            source_step_index: Some(2),
            phase: "deliverable".into(),
            reported_at: Utc::now(),
        };
        db.insert_insights(&[insight]).unwrap();
        assert_eq!(db.list_insight_texts().unwrap(), vec!["Demand grew".to_string()]);
        db.delete_insight("i1").unwrap();
        assert!(db.list_insight_texts().unwrap().is_empty());

        let mut hypothesis = Hypothesis::new("Demand rises");
        db.upsert_hypothesis(&hypothesis).unwrap();
        hypothesis.status = HypothesisStatus::Supported;
        db.upsert_hypothesis(&hypothesis).unwrap();

        let stored = db.list_hypotheses().unwrap();
        assert_eq!(stored, vec![hypothesis]);
    }
}
