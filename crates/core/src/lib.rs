//! # Quorum Core
//!
//! Runs several independent analyst agents, each planning and executing a
//! multi-step workflow against a text-generation service, and combines their
//! deliverables into one report.
//!
//! ## Architecture
//!
//! - `gateway/` - completion gateway contract and the HTTP client
//! - `models` - LLM provider configuration
//! - `tools/` - web search and spreadsheet collaborators
//! - `swarm/` - agent state machine, step executor, coordinator, orchestrator
//! - `state/` - insight store and SQLite persistence sink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quorum_core::gateway::HttpGatewayFactory;
//! use quorum_core::swarm::{AgentConfig, AgentKind, Coordinator, CoordinatorConfig};
//!
//! let coordinator = Coordinator::new(CoordinatorConfig::default(), Arc::new(HttpGatewayFactory));
//! let agent = coordinator
//!     .create(AgentConfig::new("Scout", "EV charging in Europe", AgentKind::MarketAnalysis))
//!     .await;
//! coordinator.start(&agent.id).await?;
//! coordinator.submit_approval(&agent.id, None).await?;
//! ```

pub mod gateway;
pub mod models;
pub mod prompts;
pub mod state;
pub mod swarm;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;
