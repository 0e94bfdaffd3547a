//! # HTTP API
//!
//! Routes nested under `/api/v1`. Handlers are thin: they call the
//! coordinator and map its errors onto status codes.

pub mod agents;
pub mod events;
pub mod insights;

#[cfg(test)]
pub(crate) mod testing;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use quorum_core::swarm::{Coordinator, LifecycleError, OrchestratorError};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/agents", agents::agent_routes())
        .merge(insights::insight_routes())
        .route("/events", axum::routing::get(events::events))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum ApiError {
    Lifecycle(LifecycleError),
    Orchestrator(OrchestratorError),
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Lifecycle(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Lifecycle(_) => StatusCode::CONFLICT,
            ApiError::Orchestrator(OrchestratorError::HypothesisNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Orchestrator(OrchestratorError::NoDeliverables) => StatusCode::CONFLICT,
            ApiError::Orchestrator(OrchestratorError::NoGateway) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Orchestrator(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Lifecycle(e) => e.to_string(),
            ApiError::Orchestrator(e) => e.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        ApiError::Lifecycle(e)
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        ApiError::Orchestrator(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("API error: {}", self.message());
        }
        (status, Json(ErrorBody { error: self.message() })).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors_map_to_404_and_409() {
        let missing = ApiError::from(LifecycleError::AgentNotFound("a1".into()));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let conflict = ApiError::from(LifecycleError::NotAwaitingApproval("a1".into()));
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let started = ApiError::from(LifecycleError::AlreadyStarted("a1".into()));
        assert_eq!(started.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_orchestrator_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(OrchestratorError::HypothesisNotFound("h".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(OrchestratorError::NoDeliverables).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(OrchestratorError::EmptyReply).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
