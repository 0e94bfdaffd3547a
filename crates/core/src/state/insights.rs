//! # Insight Store
//!
//! Deduplicated set of findings reported by agents and by synthesis.
//! Two insights never share the same normalized text.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Default cap on insights fed into a synthesis or evaluation prompt
pub const DEFAULT_SYNTHESIS_LIMIT: usize = 50;

/// One atomic finding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub text: String,
    #[serde(default)]
    pub source_step_index: Option<usize>,
    pub phase: String,
    pub reported_at: DateTime<Utc>,
}

/// Where a batch of candidates came from
#[derive(Debug, Clone, Default)]
pub struct InsightMeta {
    pub source_step_index: Option<usize>,
    pub phase: String,
}

impl InsightMeta {
    pub fn phase(phase: impl Into<String>) -> Self {
        Self {
            source_step_index: None,
            phase: phase.into(),
        }
    }
}

/// Trim, casefold and collapse internal whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Default)]
struct Inner {
    /// Insertion order is report order
    insights: Vec<Insight>,
    normalized: HashSet<String>,
}

#[derive(Default)]
pub struct InsightStore {
    inner: Mutex<Inner>,
}

impl InsightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit the candidates whose normalized text is new, returning only those.
    ///
    /// Blank candidates and repeats within the same batch are dropped too.
    pub async fn report(
        &self,
        agent_id: &str,
        agent_name: &str,
        candidates: &[String],
        meta: InsightMeta,
    ) -> Vec<Insight> {
        let mut inner = self.inner.lock().await;
        let mut admitted = Vec::new();

        for candidate in candidates {
            let key = normalize(candidate);
            if key.is_empty() || !inner.normalized.insert(key) {
                continue;
            }
            let insight = Insight {
                id: uuid::Uuid::new_v4().to_string(),
                agent_id: agent_id.to_string(),
                agent_name: agent_name.to_string(),
                text: candidate.trim().to_string(),
                source_step_index: meta.source_step_index,
                phase: meta.phase.clone(),
                reported_at: Utc::now(),
            };
            inner.insights.push(insight.clone());
            admitted.push(insight);
        }

        if admitted.len() < candidates.len() {
            tracing::debug!(
                "insight store dropped {} duplicate(s) from {}",
                candidates.len() - admitted.len(),
                agent_name
            );
        }
        admitted
    }

    /// Remove an insight; returns whether it existed
    pub async fn delete(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(pos) = inner.insights.iter().position(|i| i.id == id) else {
            return false;
        };
        let removed = inner.insights.remove(pos);
        inner.normalized.remove(&normalize(&removed.text));
        true
    }

    pub async fn get_all(&self) -> Vec<Insight> {
        self.inner.lock().await.insights.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.insights.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Oldest-first, capped at `limit`
    pub async fn for_synthesis(&self, limit: usize) -> Vec<Insight> {
        let inner = self.inner.lock().await;
        inner.insights.iter().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Revenue   GREW\t10% "), "revenue grew 10%");
        assert_eq!(normalize("   "), "");
    }

    #[tokio::test]
    async fn test_case_and_whitespace_variants_are_duplicates() {
        let store = InsightStore::new();
        let first = store
            .report("a1", "Scout", &texts(&["Revenue grew 10%"]), InsightMeta::phase("deliverable"))
            .await;
        assert_eq!(first.len(), 1);

        let second = store
            .report("a2", "Ledger", &texts(&["revenue grew 10%  "]), InsightMeta::phase("deliverable"))
            .await;
        assert!(second.is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_reporting_a_batch_twice_is_idempotent() {
        let store = InsightStore::new();
        let batch = texts(&["Margins fell", "Churn is rising", "EU leads adoption"]);

        store.report("a", "A", &batch, InsightMeta::default()).await;
        let after_once = store.get_all().await;
        let again = store.report("a", "A", &batch, InsightMeta::default()).await;

        assert!(again.is_empty());
        let after_twice = store.get_all().await;
        assert_eq!(after_once, after_twice);
    }

    #[tokio::test]
    async fn test_duplicates_within_one_batch() {
        let store = InsightStore::new();
        let admitted = store
            .report("a", "A", &texts(&["Same", "same ", "", "Other"]), InsightMeta::default())
            .await;
        assert_eq!(admitted.len(), 2);
        assert_eq!(admitted[0].text, "Same");
        assert_eq!(admitted[1].text, "Other");
    }

    #[tokio::test]
    async fn test_delete_frees_the_text() {
        let store = InsightStore::new();
        let admitted = store.report("a", "A", &texts(&["Prices up"]), InsightMeta::default()).await;

        assert!(store.delete(&admitted[0].id).await);
        assert!(!store.delete(&admitted[0].id).await);
        assert!(store.is_empty().await);

        let readmitted = store.report("b", "B", &texts(&["prices up"]), InsightMeta::default()).await;
        assert_eq!(readmitted.len(), 1);
    }

    #[tokio::test]
    async fn test_for_synthesis_is_oldest_first_and_capped() {
        let store = InsightStore::new();
        store
            .report("a", "A", &texts(&["one", "two", "three"]), InsightMeta::default())
            .await;
        let picked = store.for_synthesis(2).await;
        assert_eq!(
            picked.iter().map(|i| i.text.as_str()).collect::<Vec<_>>(),
            vec!["one", "two"]
        );
    }
}
