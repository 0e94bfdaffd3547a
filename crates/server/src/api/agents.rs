//! # Agent API
//!
//! Create, drive and inspect agents.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use quorum_core::swarm::{
    AgentConfig, AgentKind, AgentSnapshot, ApprovalDecision, ClarificationAnswers,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

pub fn agent_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agents).post(create_agent))
        .route("/:id", get(get_agent).delete(delete_agent))
        .route("/:id/start", post(start_agent))
        .route("/:id/stop", post(stop_agent))
        .route("/:id/chat", post(chat))
        .route("/:id/approve", post(approve))
        .route("/:id/clarify", post(clarify))
}

async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentSnapshot>> {
    Json(state.coordinator.list_all().await)
}

async fn create_agent(
    State(state): State<AppState>,
    Json(config): Json<AgentConfig>,
) -> Result<(StatusCode, Json<AgentSnapshot>), ApiError> {
    if config.name.trim().is_empty() || config.goal.trim().is_empty() {
        return Err(ApiError::BadRequest("name and goal are required".into()));
    }
    if config.kind == AgentKind::Custom && config.steps.is_empty() {
        return Err(ApiError::BadRequest(
            "custom agents need at least one step".into(),
        ));
    }
    let snapshot = state.coordinator.create(config).await;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_agent(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<AgentSnapshot> {
    Ok(Json(state.coordinator.get(&id).await?))
}

/// Idempotent; an unknown id is already deleted
async fn delete_agent(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if !state.coordinator.delete(&id).await {
        tracing::debug!("delete of unknown agent {}", id);
    }
    StatusCode::NO_CONTENT
}

async fn start_agent(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<AgentSnapshot> {
    state.coordinator.start(&id).await?;
    Ok(Json(state.coordinator.get(&id).await?))
}

async fn stop_agent(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<AgentSnapshot> {
    state.coordinator.stop(&id).await?;
    Ok(Json(state.coordinator.get(&id).await?))
}

async fn chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".into()));
    }
    let reply = state.coordinator.chat(&id, &req.message).await?;
    Ok(Json(ChatResponse { reply }))
}

/// Body is optional; an empty POST approves without feedback
async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    decision: Option<Json<ApprovalDecision>>,
) -> ApiResult<AgentSnapshot> {
    let feedback = decision.and_then(|Json(d)| d.feedback);
    state.coordinator.submit_approval(&id, feedback).await?;
    Ok(Json(state.coordinator.get(&id).await?))
}

async fn clarify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(answers): Json<ClarificationAnswers>,
) -> ApiResult<AgentSnapshot> {
    state.coordinator.submit_clarification(&id, answers).await?;
    Ok(Json(state.coordinator.get(&id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::state;
    use quorum_core::swarm::AgentStatus;

    fn scout() -> AgentConfig {
        AgentConfig::new("Scout", "EV charging in Europe", AgentKind::MarketAnalysis)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let state = state();
        let (status, Json(created)) = create_agent(State(state.clone()), Json(scout()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.status, AgentStatus::Queued);

        let Json(all) = list_agents(State(state.clone())).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, created.id);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_goal() {
        let config = AgentConfig::new("Scout", "  ", AgentKind::Research);
        let err = create_agent(State(state()), Json(config)).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_unknown_agent_is_not_found() {
        let err = get_agent(State(state()), Path("missing".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Lifecycle(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let state = state();
        let (_, Json(created)) = create_agent(State(state.clone()), Json(scout()))
            .await
            .unwrap();

        let first = delete_agent(State(state.clone()), Path(created.id.clone())).await;
        assert_eq!(first, StatusCode::NO_CONTENT);
        let again = delete_agent(State(state.clone()), Path(created.id)).await;
        assert_eq!(again, StatusCode::NO_CONTENT);
        let unknown = delete_agent(State(state), Path("missing".into())).await;
        assert_eq!(unknown, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_approve_before_start_conflicts() {
        let state = state();
        let (_, Json(created)) = create_agent(State(state.clone()), Json(scout()))
            .await
            .unwrap();

        let err = approve(State(state.clone()), Path(created.id.clone()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Lifecycle(ref e) if !e.is_not_found()));
    }

    #[tokio::test]
    async fn test_start_twice_conflicts() {
        let state = state();
        let (_, Json(created)) = create_agent(State(state.clone()), Json(scout()))
            .await
            .unwrap();

        start_agent(State(state.clone()), Path(created.id.clone()))
            .await
            .unwrap();
        let err = start_agent(State(state.clone()), Path(created.id.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Lifecycle(_)));

        let status = delete_agent(State(state.clone()), Path(created.id)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
