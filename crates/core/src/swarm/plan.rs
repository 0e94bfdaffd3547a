//! # Work Plans
//!
//! Type-specific plan templates. Every kind has a fixed step count (4-9);
//! a template that cannot be used falls back to the generic six-step plan,
//! so planning itself never fails.

use serde::{Deserialize, Serialize};

use crate::tools::{DOCUMENT_PARSE, SPREADSHEET, WEB_SEARCH};

/// Upper bound on plan length
pub const MAX_PLAN_STEPS: usize = 9;

/// Kind of agent, selecting its plan template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    #[default]
    Research,
    MarketAnalysis,
    CompetitiveIntel,
    FinancialAnalysis,
    DataAnalysis,
    /// Steps supplied by the caller in the agent config
    Custom,
}

impl AgentKind {
    pub fn all() -> Vec<AgentKind> {
        vec![
            AgentKind::Research,
            AgentKind::MarketAnalysis,
            AgentKind::CompetitiveIntel,
            AgentKind::FinancialAnalysis,
            AgentKind::DataAnalysis,
            AgentKind::Custom,
        ]
    }

    /// Stable identifier, matching the serialized form
    pub fn id(&self) -> &'static str {
        match self {
            AgentKind::Research => "research",
            AgentKind::MarketAnalysis => "market_analysis",
            AgentKind::CompetitiveIntel => "competitive_intel",
            AgentKind::FinancialAnalysis => "financial_analysis",
            AgentKind::DataAnalysis => "data_analysis",
            AgentKind::Custom => "custom",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.id() == id)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::Research => "Research",
            AgentKind::MarketAnalysis => "Market Analysis",
            AgentKind::CompetitiveIntel => "Competitive Intelligence",
            AgentKind::FinancialAnalysis => "Financial Analysis",
            AgentKind::DataAnalysis => "Data Analysis",
            AgentKind::Custom => "Custom",
        }
    }

    /// Questions asked during the clarify phase
    pub fn clarifying_questions(&self) -> Vec<String> {
        let questions: &[&str] = match self {
            AgentKind::Research => &[
                "Which sources should be prioritised or excluded?",
                "What time period should the research cover?",
                "Who is the audience for the final summary?",
            ],
            AgentKind::MarketAnalysis => &[
                "Which geographic markets are in scope?",
                "Which customer segments matter most?",
                "Is there a market-size figure you already trust?",
            ],
            AgentKind::CompetitiveIntel => &[
                "Which competitors must be covered?",
                "Which dimensions matter most (pricing, product, distribution)?",
            ],
            AgentKind::FinancialAnalysis => &[
                "Which reporting periods should be analysed?",
                "Which metrics are decision-critical?",
                "Should projections be included, and over what horizon?",
            ],
            AgentKind::DataAnalysis => &[
                "Where does the data come from and how fresh is it?",
                "Which question should the analysis answer first?",
            ],
            AgentKind::Custom => &["Is there anything the plan steps do not already say?"],
        };
        questions.iter().map(|q| q.to_string()).collect()
    }
}

/// One step of a work plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkPlanStep {
    pub title: String,
    pub description: String,
    pub estimated_effort: String,
    #[serde(default)]
    pub required_tools: Vec<String>,
}

impl WorkPlanStep {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        estimated_effort: impl Into<String>,
        required_tools: &[&str],
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            estimated_effort: estimated_effort.into(),
            required_tools: required_tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn requires(&self, tool: &str) -> bool {
        self.required_tools.iter().any(|t| t == tool)
    }
}

/// Ordered sequence of steps, generated once per agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub steps: Vec<WorkPlanStep>,
    /// True when the generic fallback replaced the kind's template
    #[serde(default)]
    pub fallback: bool,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Merge reviewer feedback into every step without touching count or order
    pub fn apply_feedback(&mut self, feedback: &str) {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return;
        }
        for step in &mut self.steps {
            step.description = format!("{}\n\nReviewer feedback: {}", step.description, feedback);
        }
    }
}

/// Why a template could not be used
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TemplateError {
    #[error("custom plan has no steps")]
    Empty,
    #[error("custom plan has {0} steps, more than the maximum of 9")]
    TooLong(usize),
}

fn template(kind: AgentKind, goal: &str) -> Vec<WorkPlanStep> {
    let s = |title: &str, desc: &str, effort: &str, tools: &[&str]| {
        WorkPlanStep::new(title, desc.replace("{goal}", goal), effort, tools)
    };

    match kind {
        AgentKind::Research => vec![
            s("Frame the question", "Restate '{goal}' as precise research questions and success criteria.", "15m", &[]),
            s("Gather sources", "Search for recent, authoritative sources on {goal}.", "30m", &[WEB_SEARCH]),
            s("Review provided material", "Extract relevant facts about {goal} from any supplied documents.", "20m", &[DOCUMENT_PARSE]),
            s("Analyse findings", "Identify patterns, agreements and disagreements across sources.", "30m", &[]),
            s("Assess confidence", "Rate the strength of the evidence behind each finding.", "15m", &[]),
            s("Draft conclusions", "Write the conclusions about {goal} with supporting evidence.", "20m", &[]),
        ],
        AgentKind::MarketAnalysis => vec![
            s("Define the market", "Set the boundaries of the market for {goal}: products, regions, segments.", "15m", &[]),
            s("Size the market", "Estimate total and serviceable market size for {goal}.", "30m", &[WEB_SEARCH]),
            s("Map customer segments", "Describe the main customer segments and their needs.", "25m", &[]),
            s("Identify trends", "Find growth drivers and headwinds affecting {goal}.", "30m", &[WEB_SEARCH]),
            s("Review regulation", "Summarise regulatory factors relevant to {goal}.", "20m", &[WEB_SEARCH]),
            s("Build the data table", "Tabulate market size, growth and segment shares.", "20m", &[SPREADSHEET]),
            s("Recommend positioning", "Recommend where to compete and why.", "20m", &[]),
        ],
        AgentKind::CompetitiveIntel => vec![
            s("List competitors", "Identify the main competitors relevant to {goal}.", "20m", &[WEB_SEARCH]),
            s("Profile offerings", "Compare products, pricing and positioning of each competitor.", "40m", &[WEB_SEARCH]),
            s("Assess strengths and weaknesses", "Build a strengths/weaknesses view for each competitor.", "30m", &[]),
            s("Spot gaps", "Find underserved needs and white space around {goal}.", "20m", &[]),
            s("Summarise threats", "Rank competitive threats and likely next moves.", "15m", &[]),
        ],
        AgentKind::FinancialAnalysis => vec![
            s("Collect financials", "Gather the financial statements and figures relevant to {goal}.", "30m", &[WEB_SEARCH, DOCUMENT_PARSE]),
            s("Normalise figures", "Put figures on a comparable basis and note adjustments.", "20m", &[]),
            s("Analyse revenue", "Break down revenue drivers and growth.", "25m", &[]),
            s("Analyse costs and margins", "Examine cost structure and margin trends.", "25m", &[]),
            s("Assess cash flow", "Review cash generation, burn and liquidity.", "20m", &[]),
            s("Compare ratios", "Compute key ratios and compare them with peers.", "20m", &[WEB_SEARCH]),
            s("Model scenarios", "Tabulate base, upside and downside scenarios for {goal}.", "30m", &[SPREADSHEET]),
            s("State the verdict", "Summarise financial health and key risks.", "15m", &[]),
        ],
        AgentKind::DataAnalysis => vec![
            s("Inspect the data", "Describe the available data for {goal}: fields, coverage, quality.", "20m", &[DOCUMENT_PARSE]),
            s("Clean and prepare", "List cleaning steps and resulting caveats.", "20m", &[]),
            s("Analyse", "Answer the questions behind {goal} with the prepared data.", "40m", &[]),
            s("Tabulate results", "Produce the result tables.", "20m", &[SPREADSHEET]),
        ],
        AgentKind::Custom => Vec::new(),
    }
}

/// Fixed generic plan used whenever a template cannot be used
pub fn fallback_plan(goal: &str) -> Plan {
    let s = |title: &str, desc: &str, tools: &[&str]| {
        WorkPlanStep::new(title, desc.replace("{goal}", goal), "20m", tools)
    };
    Plan {
        steps: vec![
            s("Understand the objective", "Clarify what a good outcome for '{goal}' looks like.", &[]),
            s("Research background", "Collect background information on {goal}.", &[WEB_SEARCH]),
            s("Analyse information", "Analyse the collected information for key patterns.", &[]),
            s("Identify insights", "Extract the most important insights.", &[]),
            s("Develop recommendations", "Turn the insights into actionable recommendations.", &[]),
            s("Summarise", "Summarise findings and recommendations for {goal}.", &[]),
        ],
        fallback: true,
    }
}

fn custom_template(steps: &[WorkPlanStep]) -> Result<Vec<WorkPlanStep>, TemplateError> {
    match steps.len() {
        0 => Err(TemplateError::Empty),
        n if n > MAX_PLAN_STEPS => Err(TemplateError::TooLong(n)),
        _ => Ok(steps.to_vec()),
    }
}

/// Generate the plan for an agent.
///
/// `context_notes` (clarification answers) are appended to every step so a
/// regenerated plan carries them.
pub fn generate_plan(
    kind: AgentKind,
    goal: &str,
    custom_steps: &[WorkPlanStep],
    context_notes: &[String],
) -> Plan {
    let steps = match kind {
        AgentKind::Custom => custom_template(custom_steps),
        other => Ok(template(other, goal)),
    };

    let mut plan = match steps {
        Ok(steps) => Plan {
            steps,
            fallback: false,
        },
        Err(e) => {
            tracing::warn!("plan template for {:?} unusable ({}), using fallback", kind, e);
            fallback_plan(goal)
        }
    };

    if !context_notes.is_empty() {
        let notes = context_notes.join("; ");
        for step in &mut plan.steps {
            step.description = format!("{}\n\nClarifications: {}", step.description, notes);
        }
    }

    plan
}
