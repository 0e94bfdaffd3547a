//! Handler test fixtures

use async_trait::async_trait;
use quorum_core::gateway::{
    CompletionGateway, CompletionReply, CompletionRequest, GatewayError, SharedGateway,
};
use quorum_core::swarm::{Coordinator, CoordinatorConfig};
use std::sync::Arc;

use super::AppState;

/// Answers every request with the same short analysis
pub struct CannedGateway;

#[async_trait]
impl CompletionGateway for CannedGateway {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionReply, GatewayError> {
        Ok(CompletionReply::text(
            r#"{"summary":"Demand is rising","details":"- Demand grew 40% year over year","nextSteps":[]}"#,
        ))
    }
}

pub fn state() -> AppState {
    let config = CoordinatorConfig {
        enable_search: false,
        enable_spreadsheets: false,
        ..Default::default()
    };
    let coordinator = Coordinator::new(config, Arc::new(SharedGateway(Arc::new(CannedGateway))));
    AppState::new(Arc::new(coordinator))
}
