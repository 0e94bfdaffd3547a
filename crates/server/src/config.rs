//! Persisted server configuration
//!
//! A sparse overlay read from `.quorum/config.json`. Fields the file leaves
//! out fall through to [`CoordinatorConfig::default`].

use quorum_core::models::LlmProvider;
use quorum_core::swarm::CoordinatorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH: &str = ".quorum/config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PersistedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis_threshold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight_prompt_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searxng_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_search: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_spreadsheets: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_providers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_models: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_base_urls: HashMap<String, String>,
}

impl PersistedConfig {
    /// Missing or unreadable files yield an empty overlay
    pub async fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH)).await
    }

    pub async fn load_from(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Overlay onto the coordinator defaults
    pub fn into_coordinator_config(self) -> CoordinatorConfig {
        let mut config = CoordinatorConfig::default();

        if let Some(provider) = self.global_provider.as_deref() {
            match LlmProvider::from_id(provider) {
                Some(p) => config.global_provider = p,
                None => tracing::warn!("Unknown provider '{}', keeping default", provider),
            }
        }
        config.global_model = self.global_model.or(config.global_model);
        config.base_url = self.base_url.or(config.base_url);
        config.searxng_url = self.searxng_url.or(config.searxng_url);
        if let Some(secs) = self.approval_timeout_secs {
            config.approval_timeout_secs = secs;
        }
        if let Some(secs) = self.clarification_timeout_secs {
            config.clarification_timeout_secs = secs;
        }
        if let Some(threshold) = self.synthesis_threshold {
            config.synthesis_threshold = threshold;
        }
        if let Some(limit) = self.insight_prompt_limit {
            config.insight_prompt_limit = limit;
        }
        if let Some(enabled) = self.enable_search {
            config.enable_search = enabled;
        }
        if let Some(enabled) = self.enable_spreadsheets {
            config.enable_spreadsheets = enabled;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }

        for (agent, provider) in self.per_agent_providers {
            match LlmProvider::from_id(&provider) {
                Some(p) => {
                    config.per_agent_providers.insert(agent, p);
                }
                None => tracing::warn!("Unknown provider '{}' for agent '{}'", provider, agent),
            }
        }
        config.per_agent_models.extend(self.per_agent_models);
        config.per_agent_base_urls.extend(self.per_agent_base_urls);
        config
    }
}
