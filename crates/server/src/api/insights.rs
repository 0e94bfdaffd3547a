//! # Orchestrator API
//!
//! Insights, synthesis, the combined report and hypotheses.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use quorum_core::state::Insight;
use quorum_core::swarm::{Hypothesis, OrchestratorSnapshot, Synthesis};
use serde::Deserialize;

use super::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct HypothesisRequest {
    pub text: String,
}

pub fn insight_routes() -> Router<AppState> {
    Router::new()
        .route("/insights", get(list_insights))
        .route("/insights/:id", delete(delete_insight))
        .route("/orchestrator", get(get_orchestrator))
        .route("/orchestrator/synthesize", post(synthesize))
        .route("/orchestrator/reset", post(reset))
        .route("/orchestrator/report", get(report))
        .route("/hypotheses", get(list_hypotheses).post(create_hypothesis))
        .route("/hypotheses/:id/evaluate", post(evaluate_hypothesis))
}

async fn list_insights(State(state): State<AppState>) -> Json<Vec<Insight>> {
    Json(state.coordinator.orchestrator().insights().get_all().await)
}

async fn delete_insight(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.coordinator.orchestrator().delete_insight(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn get_orchestrator(State(state): State<AppState>) -> Json<OrchestratorSnapshot> {
    Json(state.coordinator.orchestrator().snapshot().await)
}

async fn synthesize(State(state): State<AppState>) -> ApiResult<Synthesis> {
    Ok(Json(state.coordinator.orchestrator().synthesize().await?))
}

async fn reset(State(state): State<AppState>) -> Json<OrchestratorSnapshot> {
    let orchestrator = state.coordinator.orchestrator();
    orchestrator.reset().await;
    Json(orchestrator.snapshot().await)
}

async fn report(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.coordinator.orchestrator().report().await;
    ([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], body)
}

async fn list_hypotheses(State(state): State<AppState>) -> Json<Vec<Hypothesis>> {
    Json(state.coordinator.orchestrator().hypotheses().await)
}

async fn create_hypothesis(
    State(state): State<AppState>,
    Json(req): Json<HypothesisRequest>,
) -> Result<(StatusCode, Json<Hypothesis>), ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("hypothesis text is required".into()));
    }
    let hypothesis = state
        .coordinator
        .orchestrator()
        .evaluate_hypothesis(&req.text)
        .await;
    Ok((StatusCode::CREATED, Json(hypothesis)))
}

async fn evaluate_hypothesis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Hypothesis> {
    Ok(Json(
        state
            .coordinator
            .orchestrator()
            .reevaluate_hypothesis(&id)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::state;
    use quorum_core::state::InsightMeta;
    use quorum_core::swarm::OrchestratorError;

    #[tokio::test]
    async fn test_synthesize_without_deliverables_conflicts() {
        let err = synthesize(State(state())).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Orchestrator(OrchestratorError::NoDeliverables)
        ));
    }

    #[tokio::test]
    async fn test_insights_listed_and_deleted() {
        let state = state();
        let admitted = state
            .coordinator
            .orchestrator()
            .report_insights(
                "a1",
                "Scout",
                &["Demand grew".to_string(), "demand  grew".to_string()],
                InsightMeta::phase("deliverable"),
            )
            .await;
        assert_eq!(admitted.len(), 1);

        let Json(listed) = list_insights(State(state.clone())).await;
        assert_eq!(listed.len(), 1);

        let id = listed[0].id.clone();
        assert_eq!(
            delete_insight(State(state.clone()), Path(id.clone())).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            delete_insight(State(state.clone()), Path(id)).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_hypothesis_create_and_reevaluate() {
        let state = state();
        let (status, Json(created)) = create_hypothesis(
            State(state.clone()),
            Json(HypothesisRequest {
                text: "Demand is rising".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(again) = evaluate_hypothesis(State(state.clone()), Path(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(again.id, created.id);

        let Json(all) = list_hypotheses(State(state.clone())).await;
        assert_eq!(all.len(), 1);

        let err = evaluate_hypothesis(State(state), Path("missing".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Orchestrator(OrchestratorError::HypothesisNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_snapshot() {
        let state = state();
        let Json(snapshot) = reset(State(state)).await;
        assert!(snapshot.deliverables.is_empty());
        assert!(snapshot.synthesis.is_none());
    }
}
