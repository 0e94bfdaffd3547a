//! # Step Executor
//!
//! Runs one work-plan step against the completion gateway. Depending on the
//! step's `required_tools` the instruction is augmented with search results,
//! or the step is driven through a spreadsheet tool-call loop. A
//! `document_parse` step reads from the base context; when that is empty the
//! model is told no documents were supplied.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::gateway::{
    ChatMessage, CompletionGateway, CompletionRequest, GatewayError, ToolCall,
};
use crate::prompts;
use crate::tools::spreadsheet::{self, Sheet, GENERATE_SPREADSHEET};
use crate::tools::{
    SearchResponse, SpreadsheetGenerator, WebSearch, DOCUMENT_PARSE, SPREADSHEET, WEB_SEARCH,
};

use super::plan::WorkPlanStep;
use super::reply::{parse_json_reply, truncate_chars};

/// Search results appended to a step instruction
const SEARCH_RESULT_LIMIT: usize = 5;
const SNIPPET_CHARS: usize = 300;
/// Upper bound on assistant/tool exchanges in the spreadsheet loop
pub const MAX_TOOL_ROUNDS: usize = 6;
/// Raw reply prefix kept when the JSON contract is not honoured
const FALLBACK_DETAIL_CHARS: usize = 500;
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";
const NO_DOCUMENTS_NOTE: &str = "\n\nNo documents were supplied for this step. Say so plainly and work only from the context above; do not invent document contents.";

/// Outcome of one step. Step-local failures carry `error` instead of aborting the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_index: usize,
    pub title: String,
    pub summary: String,
    pub details: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StepResult {
    fn from_output(index: usize, step: &WorkPlanStep, output: StepOutput) -> Self {
        Self {
            step_index: index,
            title: step.title.clone(),
            summary: output.summary,
            details: output.details,
            next_steps: output.next_steps,
            artifacts: output.artifacts,
            error: None,
            timestamp: Utc::now(),
        }
    }

    fn failed(index: usize, step: &WorkPlanStep, error: impl Into<String>) -> Self {
        Self {
            step_index: index,
            title: step.title.clone(),
            summary: format!("Failed: {}", step.title),
            details: String::new(),
            next_steps: Vec::new(),
            artifacts: Vec::new(),
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON contract requested from the model for a plain step
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutput {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl StepOutput {
    /// Minimal output used when the reply is not a usable JSON object
    fn fallback(step: &WorkPlanStep, raw: &str) -> Self {
        Self {
            summary: format!("Completed: {}", step.title),
            details: truncate_chars(raw.trim(), FALLBACK_DETAIL_CHARS),
            next_steps: Vec::new(),
            artifacts: Vec::new(),
        }
    }
}

/// Collaborators enabled for a run. A tool that is `None` is skipped even
/// when a step declares it.
#[derive(Clone, Default)]
pub struct ToolSet {
    pub search: Option<Arc<dyn WebSearch>>,
    pub spreadsheet: Option<Arc<dyn SpreadsheetGenerator>>,
}

impl ToolSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_spreadsheet(mut self, generator: Arc<dyn SpreadsheetGenerator>) -> Self {
        self.spreadsheet = Some(generator);
        self
    }
}

/// Join the base context and prior step summaries
pub fn build_context(base_context: &[String], results: &[StepResult]) -> String {
    let mut parts: Vec<String> = base_context
        .iter()
        .filter(|c| !c.trim().is_empty())
        .cloned()
        .collect();
    parts.extend(results.iter().map(|r| match &r.error {
        Some(error) => format!("Step {} ({}) failed: {}", r.step_index + 1, r.title, error),
        None => format!("Step {} ({}): {}", r.step_index + 1, r.title, r.summary),
    }));
    parts.join(CONTEXT_SEPARATOR)
}

fn format_search_results(response: &SearchResponse) -> String {
    let mut out = format!("\n\n## Web search results for \"{}\"\n", response.query);
    for (i, result) in response.results.iter().take(SEARCH_RESULT_LIMIT).enumerate() {
        out.push_str(&format!(
            "\n{}. {}\n   {}\n   {}\n",
            i + 1,
            result.title,
            result.url,
            truncate_chars(&result.text, SNIPPET_CHARS)
        ));
    }
    out
}

fn search_query(step: &WorkPlanStep) -> String {
    let first_line = step.description.lines().next().unwrap_or_default();
    truncate_chars(&format!("{} {}", step.title, first_line), 200)
}

#[derive(Deserialize)]
struct SpreadsheetArgs {
    sheets: Vec<Sheet>,
}

fn spreadsheet_args(call: &ToolCall) -> Result<Vec<Sheet>, String> {
    let parsed = match &call.arguments {
        serde_json::Value::String(raw) => serde_json::from_str::<SpreadsheetArgs>(raw),
        other => serde_json::from_value::<SpreadsheetArgs>(other.clone()),
    };
    parsed
        .map(|args| args.sheets)
        .map_err(|e| format!("invalid arguments: {}", e))
}

#[derive(Clone)]
pub struct StepExecutor {
    gateway: Arc<dyn CompletionGateway>,
    tools: ToolSet,
    agent_name: String,
}

impl StepExecutor {
    pub fn new(gateway: Arc<dyn CompletionGateway>, tools: ToolSet, agent_name: impl Into<String>) -> Self {
        Self {
            gateway,
            tools,
            agent_name: agent_name.into(),
        }
    }

    /// Execute one step.
    ///
    /// Only a permanent gateway failure is returned as `Err`; anything
    /// transient becomes a `StepResult` with `error` set.
    pub async fn execute(
        &self,
        index: usize,
        step: &WorkPlanStep,
        base_context: &[String],
        results: &[StepResult],
    ) -> Result<StepResult, GatewayError> {
        let mut instruction = format!(
            "## Current step ({}): {}\n\n{}",
            index + 1,
            step.title,
            step.description
        );

        if step.requires(WEB_SEARCH) {
            if let Some(search) = &self.tools.search {
                let query = search_query(step);
                match search.search(&query).await {
                    Ok(response) if !response.results.is_empty() => {
                        instruction.push_str(&format_search_results(&response));
                    }
                    Ok(_) => tracing::debug!("search for step {} returned nothing", index + 1),
                    Err(e) => tracing::warn!("search failed for step {}: {}", index + 1, e),
                }
            }
        }

        if step.requires(DOCUMENT_PARSE) && base_context.iter().all(|c| c.trim().is_empty()) {
            tracing::warn!(
                "step {} ({}) reads documents but no base context was supplied",
                index + 1,
                step.title
            );
            instruction.push_str(NO_DOCUMENTS_NOTE);
        }

        let context = build_context(base_context, results);
        let prompt = if context.trim().is_empty() {
            instruction
        } else {
            format!("## Context from earlier work\n\n{}\n\n{}", context, instruction)
        };

        let outcome = match (&self.tools.spreadsheet, step.requires(SPREADSHEET)) {
            (Some(generator), true) => self.run_spreadsheet_loop(index, step, prompt, generator).await,
            _ => self.run_json_step(index, step, prompt).await,
        };

        match outcome {
            Ok(result) => Ok(result),
            Err(e) if e.is_permanent() => Err(e),
            Err(e) => {
                tracing::warn!("step {} ({}) failed: {}", index + 1, step.title, e);
                Ok(StepResult::failed(index, step, e.to_string()))
            }
        }
    }

    async fn run_json_step(
        &self,
        index: usize,
        step: &WorkPlanStep,
        prompt: String,
    ) -> Result<StepResult, GatewayError> {
        let system = prompts::render(prompts::STEP_EXECUTOR, &[("agent_name", &self.agent_name)]);
        let request = CompletionRequest::new(system, vec![ChatMessage::user(prompt)]);
        let text = self.gateway.chat(request).await?;

        let output = match parse_json_reply::<StepOutput>(&text) {
            Some(output) if !output.summary.trim().is_empty() => output,
            _ => {
                tracing::debug!("step {} reply was not the JSON contract, using fallback", index + 1);
                StepOutput::fallback(step, &text)
            }
        };
        Ok(StepResult::from_output(index, step, output))
    }

    async fn run_spreadsheet_loop(
        &self,
        index: usize,
        step: &WorkPlanStep,
        prompt: String,
        generator: &Arc<dyn SpreadsheetGenerator>,
    ) -> Result<StepResult, GatewayError> {
        let system = prompts::render(prompts::SPREADSHEET_STEP, &[("agent_name", &self.agent_name)]);
        let mut messages = vec![ChatMessage::user(prompt)];
        let mut artifacts = Vec::new();

        for _ in 0..MAX_TOOL_ROUNDS {
            let request = CompletionRequest::new(system.clone(), messages.clone())
                .with_tools(vec![spreadsheet::tool_definition()]);
            let reply = self.gateway.complete(request).await?;

            if !reply.has_tool_calls() {
                let text = reply.content.unwrap_or_default();
                let summary = match text.lines().find(|l| !l.trim().is_empty()) {
                    Some(line) => truncate_chars(line.trim(), 200),
                    None => format!("Completed: {}", step.title),
                };
                return Ok(StepResult::from_output(
                    index,
                    step,
                    StepOutput {
                        summary,
                        details: text,
                        next_steps: Vec::new(),
                        artifacts,
                    },
                ));
            }

            messages.push(ChatMessage::assistant_tool_calls(reply.tool_calls.clone()));
            for call in &reply.tool_calls {
                let payload = self.call_spreadsheet_tool(call, generator, &mut artifacts).await;
                messages.push(ChatMessage::tool_result(call.id.clone(), payload));
            }
        }

        tracing::warn!(
            "step {} hit the {} round tool-call limit",
            index + 1,
            MAX_TOOL_ROUNDS
        );
        Ok(StepResult::from_output(
            index,
            step,
            StepOutput {
                summary: format!("Completed: {}", step.title),
                details: "Tool-call round limit reached before a final answer.".to_string(),
                next_steps: Vec::new(),
                artifacts,
            },
        ))
    }

    /// Run one tool call and return the JSON payload fed back to the model
    async fn call_spreadsheet_tool(
        &self,
        call: &ToolCall,
        generator: &Arc<dyn SpreadsheetGenerator>,
        artifacts: &mut Vec<String>,
    ) -> String {
        if call.name != GENERATE_SPREADSHEET {
            return json!({"success": false, "error": format!("unknown tool: {}", call.name)}).to_string();
        }

        let sheets = match spreadsheet_args(call) {
            Ok(sheets) => sheets,
            Err(e) => return json!({"success": false, "error": e}).to_string(),
        };

        match generator.generate(sheets).await {
            Ok(output) => {
                artifacts.push(output.download_url.clone());
                serde_json::to_string(&output)
                    .unwrap_or_else(|_| json!({"success": true}).to_string())
            }
            Err(e) => {
                tracing::warn!("spreadsheet generation failed: {}", e);
                json!({"success": false, "error": e.to_string()}).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CompletionReply;
    use crate::testing::{FakeSearch, FakeSpreadsheet, ScriptedGateway};

    fn step(tools: &[&str]) -> WorkPlanStep {
        WorkPlanStep::new("Size the market", "Estimate the market for EV chargers.", "30m", tools)
    }

    #[tokio::test]
    async fn test_json_reply_is_parsed() {
        let gateway = ScriptedGateway::always(
            "```json\n{\"summary\":\"Market is $4B\",\"details\":\"...\",\"nextSteps\":[\"check EU\"],\"artifacts\":[]}\n```",
        );
        let executor = StepExecutor::new(gateway, ToolSet::none(), "Scout");

        let result = executor.execute(0, &step(&[]), &[], &[]).await.unwrap();
        assert_eq!(result.summary, "Market is $4B");
        assert_eq!(result.next_steps, vec!["check EU".to_string()]);
        assert!(!result.is_error());
    }

    #[tokio::test]
    async fn test_malformed_reply_falls_back() {
        let long = "x".repeat(800);
        let executor = StepExecutor::new(ScriptedGateway::always(&long), ToolSet::none(), "Scout");

        let result = executor.execute(2, &step(&[]), &[], &[]).await.unwrap();
        assert_eq!(result.summary, "Completed: Size the market");
        assert_eq!(result.details.chars().count(), 500);
        assert_eq!(result.step_index, 2);
    }

    #[tokio::test]
    async fn test_transient_error_becomes_error_result() {
        let gateway = ScriptedGateway::new(|_| Err(GatewayError::Transient("HTTP 503".into())));
        let executor = StepExecutor::new(gateway, ToolSet::none(), "Scout");

        let result = executor.execute(1, &step(&[]), &[], &[]).await.unwrap();
        assert!(result.error.as_deref().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_permanent_error_propagates() {
        let gateway = ScriptedGateway::new(|_| Err(GatewayError::Unavailable("no key".into())));
        let executor = StepExecutor::new(gateway, ToolSet::none(), "Scout");

        let err = executor.execute(0, &step(&[]), &[], &[]).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_search_results_are_appended() {
        let gateway = ScriptedGateway::always("{\"summary\":\"ok\"}");
        let search = FakeSearch::with_results(8);
        let executor = StepExecutor::new(
            gateway.clone(),
            ToolSet::none().with_search(search.clone()),
            "Scout",
        );

        executor.execute(0, &step(&[WEB_SEARCH]), &[], &[]).await.unwrap();

        assert_eq!(search.calls(), 1);
        let prompt = gateway.requests()[0].messages[0].text().to_string();
        assert!(prompt.contains("5. Result 5"));
        assert!(!prompt.contains("6. Result 6"));
        assert!(!prompt.contains(&"s".repeat(301)));
    }

    #[tokio::test]
    async fn test_search_failure_does_not_fail_the_step() {
        let gateway = ScriptedGateway::always("{\"summary\":\"ok\"}");
        let executor = StepExecutor::new(
            gateway,
            ToolSet::none().with_search(FakeSearch::failing()),
            "Scout",
        );

        let result = executor.execute(0, &step(&[WEB_SEARCH]), &[], &[]).await.unwrap();
        assert_eq!(result.summary, "ok");
    }

    #[tokio::test]
    async fn test_search_skipped_when_not_declared() {
        let search = FakeSearch::with_results(3);
        let executor = StepExecutor::new(
            ScriptedGateway::always("{\"summary\":\"ok\"}"),
            ToolSet::none().with_search(search.clone()),
            "Scout",
        );
        executor.execute(0, &step(&[]), &[], &[]).await.unwrap();
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn test_spreadsheet_loop_collects_download_url() {
        let gateway = ScriptedGateway::new(|req| {
            if req.messages.iter().any(|m| m.tool_call_id.is_some()) {
                Ok(CompletionReply::text("Workbook with one sheet of market sizes."))
            } else {
                Ok(CompletionReply::with_tool_calls(vec![ToolCall {
                    id: "call_1".into(),
                    name: GENERATE_SPREADSHEET.into(),
                    arguments: json!({"sheets": [{"name": "Sizes", "headers": ["year"], "rows": [[2024]]}]}),
                }]))
            }
        });
        let sheets = FakeSpreadsheet::new();
        let executor = StepExecutor::new(
            gateway.clone(),
            ToolSet::none().with_spreadsheet(sheets.clone()),
            "Scout",
        );

        let result = executor.execute(5, &step(&[SPREADSHEET]), &[], &[]).await.unwrap();

        assert_eq!(result.artifacts, vec!["/files/fake-workbook".to_string()]);
        assert_eq!(result.summary, "Workbook with one sheet of market sizes.");
        assert_eq!(sheets.generated(), 1);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_spreadsheet_loop_is_bounded() {
        let gateway = ScriptedGateway::new(|_| {
            Ok(CompletionReply::with_tool_calls(vec![ToolCall {
                id: "loop".into(),
                name: GENERATE_SPREADSHEET.into(),
                arguments: json!("not json"),
            }]))
        });
        let executor = StepExecutor::new(
            gateway.clone(),
            ToolSet::none().with_spreadsheet(FakeSpreadsheet::new()),
            "Scout",
        );

        let result = executor.execute(0, &step(&[SPREADSHEET]), &[], &[]).await.unwrap();
        assert_eq!(gateway.calls(), MAX_TOOL_ROUNDS);
        assert_eq!(result.summary, "Completed: Size the market");
        assert!(result.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_document_step_without_documents_is_flagged() {
        let gateway = ScriptedGateway::always("{\"summary\":\"ok\"}");
        let executor = StepExecutor::new(gateway.clone(), ToolSet::none(), "Scout");
        let prior = vec![StepResult::failed(0, &step(&[]), "timeout")];

        executor
            .execute(1, &step(&[DOCUMENT_PARSE]), &["  ".to_string()], &prior)
            .await
            .unwrap();
        executor
            .execute(1, &step(&[DOCUMENT_PARSE]), &["Annual report 2023: revenue 4.1bn".to_string()], &prior)
            .await
            .unwrap();
        executor.execute(1, &step(&[]), &[], &prior).await.unwrap();

        let prompts: Vec<String> = gateway
            .requests()
            .iter()
            .map(|r| r.messages[0].text().to_string())
            .collect();
        assert!(prompts[0].contains("No documents were supplied"));
        assert!(prompts[0].contains("failed: timeout"));
        assert!(!prompts[1].contains("No documents were supplied"));
        assert!(prompts[1].contains("Annual report 2023"));
        assert!(!prompts[2].contains("No documents were supplied"));
    }

    #[test]
    fn test_build_context_joins_with_separator() {
        let s = step(&[]);
        let results = vec![
            StepResult::from_output(0, &s, StepOutput { summary: "first".into(), ..Default::default() }),
            StepResult::failed(1, &s, "timeout"),
        ];
        let context = build_context(&["Clarifications: EU only".to_string()], &results);
        let parts: Vec<&str> = context.split("\n\n---\n\n").collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "Clarifications: EU only");
        assert!(parts[1].ends_with(": first"));
        assert!(parts[2].contains("failed: timeout"));
    }
}
