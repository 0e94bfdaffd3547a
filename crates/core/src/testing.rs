//! Scripted collaborators for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::gateway::{CompletionGateway, CompletionReply, CompletionRequest, GatewayError};
use crate::tools::{SearchResponse, SearchResult, Sheet, SpreadsheetGenerator, SpreadsheetOutput, WebSearch};

type Responder = dyn Fn(&CompletionRequest) -> Result<CompletionReply, GatewayError> + Send + Sync;

/// Gateway whose replies are computed from each request
pub struct ScriptedGateway {
    responder: Box<Responder>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGateway {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&CompletionRequest) -> Result<CompletionReply, GatewayError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn always(text: impl Into<String>) -> Arc<Self> {
        let text = text.into();
        Self::new(move |_| Ok(CompletionReply::text(text.clone())))
    }

    /// Answers every prompt the crate sends with a plausible reply
    pub fn analyst() -> Arc<Self> {
        Self::new(analyst_reply)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(&request)
    }
}

/// Text of the last message in a request
pub fn last_message(request: &CompletionRequest) -> String {
    request
        .messages
        .last()
        .map(|m| m.text().to_string())
        .unwrap_or_default()
}

pub fn is_step_request(request: &CompletionRequest) -> bool {
    request.system_prompt.contains("one step of an approved work plan")
}

pub fn analyst_reply(request: &CompletionRequest) -> Result<CompletionReply, GatewayError> {
    let system = &request.system_prompt;
    let text = if is_step_request(request) {
        let heading = last_message(request)
            .lines()
            .find(|l| l.starts_with("## Current step"))
            .unwrap_or("step")
            .to_string();
        json!({
            "summary": format!("Finished {}", heading.trim_start_matches("## ")),
            "details": "Details.",
            "nextSteps": [],
            "artifacts": []
        })
        .to_string()
    } else if system.contains("bullet points") {
        "- Demand grew 12% year over year\n- Two vendors hold most of the market\n- Prices are falling".to_string()
    } else if system.contains("orchestrator of several") {
        json!({
            "executiveSummary": "Agents agree demand is growing.",
            "contradictions": [],
            "keyFindings": ["Demand is growing across regions"]
        })
        .to_string()
    } else if system.contains("evaluate a user's hypothesis") {
        json!({
            "status": "supported",
            "reasoning": "Insights report growth.",
            "evidence": ["Demand grew 12% year over year"],
            "confidence": 0.8
        })
        .to_string()
    } else {
        format!("You said: {}", last_message(request))
    };
    Ok(CompletionReply::text(text))
}

/// Search client returning canned results, or failing
pub struct FakeSearch {
    results: usize,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeSearch {
    pub fn with_results(results: usize) -> Arc<Self> {
        Arc::new(Self {
            results,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            results: 0,
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &str) -> anyhow::Result<SearchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("search backend unreachable");
        }
        Ok(SearchResponse {
            query: query.to_string(),
            source: "fake".to_string(),
            results: (1..=self.results)
                .map(|i| SearchResult {
                    title: format!("Result {}", i),
                    url: format!("https://example.com/{}", i),
                    text: "s".repeat(400),
                })
                .collect(),
        })
    }
}

/// Spreadsheet generator that only counts calls
pub struct FakeSpreadsheet {
    generated: AtomicUsize,
}

impl FakeSpreadsheet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            generated: AtomicUsize::new(0),
        })
    }

    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpreadsheetGenerator for FakeSpreadsheet {
    async fn generate(&self, sheets: Vec<Sheet>) -> anyhow::Result<SpreadsheetOutput> {
        anyhow::ensure!(!sheets.is_empty(), "no sheets");
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(SpreadsheetOutput {
            success: true,
            download_url: "/files/fake-workbook".to_string(),
            filename: "fake-workbook".to_string(),
        })
    }
}
