//! Quorum Server
//!
//! Axum server exposing the agent coordinator over HTTP, plus a headless
//! `run` mode for a single agent from the command line.

mod api;
mod config;

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use quorum_core::gateway::HttpGatewayFactory;
use quorum_core::state::{QuorumDb, SqliteSink};
use quorum_core::swarm::{
    AgentConfig, AgentKind, AgentStatus, AgentTimeouts, Coordinator, CoordinatorConfig,
    SwarmEventKind,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::PersistedConfig;

#[derive(Parser)]
#[command(name = "quorum", version, about = "Parallel analyst agents with cross-agent synthesis")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one agent to completion without the server, approving its plan automatically
    Run {
        /// Agent kind (research, market_analysis, competitive_intel, ...)
        #[arg(short, long, default_value = "research", value_parser = parse_kind)]
        kind: AgentKind,
        /// What the agent should investigate
        #[arg(short, long)]
        goal: String,
        #[arg(short, long, default_value = "Analyst")]
        name: String,
    },
}

fn parse_kind(id: &str) -> Result<AgentKind, String> {
    AgentKind::from_id(id).ok_or_else(|| {
        let known: Vec<&str> = AgentKind::all().iter().map(|k| k.id()).collect();
        format!("unknown agent kind '{}' (expected one of: {})", id, known.join(", "))
    })
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quorum_core=info,quorum_server=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// API keys from `.env` and `.quorum/.env`; neither file is required
fn load_env() {
    dotenvy::dotenv().ok();
    dotenvy::from_path(".quorum/.env").ok();
}

fn build_coordinator(config: CoordinatorConfig) -> anyhow::Result<Coordinator> {
    let db = QuorumDb::open().context("Failed to open quorum database")?;
    let sink = Arc::new(SqliteSink::new(Arc::new(db)));
    Ok(Coordinator::new(config, Arc::new(HttpGatewayFactory)).with_sink(sink))
}

// === Server Entry ===

async fn run_server(port: u16) -> anyhow::Result<()> {
    let config = PersistedConfig::load().await.into_coordinator_config();
    let coordinator = Arc::new(build_coordinator(config)?);
    let state = AppState::new(Arc::clone(&coordinator));

    let app = Router::new()
        .nest("/api/v1", api::routes())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Quorum server running at http://{}", addr);
    tracing::info!("   Agents:       /api/v1/agents");
    tracing::info!("   Orchestrator: /api/v1/orchestrator, /insights, /hypotheses");
    tracing::info!("   Events:       /api/v1/events (SSE)");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

// === Headless Run ===

async fn run_headless(kind: AgentKind, goal: String, name: String) -> anyhow::Result<()> {
    let config = PersistedConfig::load().await.into_coordinator_config();
    let timeouts = AgentTimeouts {
        approval: Duration::ZERO,
        ..config.timeouts()
    };
    let coordinator = build_coordinator(config)?.with_timeouts(timeouts);

    let mut events = coordinator.subscribe();
    let agent = coordinator.create(AgentConfig::new(name, goal, kind)).await;
    println!("Running {} agent '{}' on: {}", kind.id(), agent.name, agent.goal);
    coordinator.start(&agent.id).await?;

    loop {
        match events.recv().await {
            Ok(event) if event.agent == agent.id => match event.kind {
                SwarmEventKind::StepCompleted | SwarmEventKind::StepFailed => {
                    let title = event
                        .data
                        .as_ref()
                        .and_then(|d| d.pointer("/result/title"))
                        .and_then(|t| t.as_str())
                        .unwrap_or("step");
                    println!("  - {:?}: {}", event.kind, title);
                }
                SwarmEventKind::Completed | SwarmEventKind::Error | SwarmEventKind::Paused => {
                    break
                }
                _ => {}
            },
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("missed {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    let snapshot = coordinator.get(&agent.id).await?;
    match (snapshot.status, snapshot.deliverable) {
        (AgentStatus::Completed, Some(deliverable)) => {
            println!("\n# {}\n\n{}", deliverable.title, deliverable.content);
            println!("\n{}", coordinator.orchestrator().report().await);
        }
        (status, _) => {
            let reason = snapshot.error.unwrap_or_else(|| "no deliverable".to_string());
            anyhow::bail!("agent ended as {:?}: {}", status, reason);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_logging();

    let args = Args::parse();
    match args.command {
        Some(CliCommand::Run { kind, goal, name }) => run_headless(kind, goal, name).await,
        Some(CliCommand::Serve { port }) => run_server(port).await,
        None => run_server(8080).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind_accepts_known_ids() {
        assert_eq!(parse_kind("market_analysis"), Ok(AgentKind::MarketAnalysis));
        assert_eq!(parse_kind("competitive_intel"), Ok(AgentKind::CompetitiveIntel));
        assert!(parse_kind("astrology").unwrap_err().contains("research"));
    }

    #[test]
    fn test_run_requires_goal() {
        assert!(Args::try_parse_from(["quorum", "run"]).is_err());
        let args = Args::try_parse_from(["quorum", "run", "--goal", "EV chargers"]).unwrap();
        assert!(matches!(
            args.command,
            Some(CliCommand::Run { kind: AgentKind::Research, .. })
        ));
    }
}
