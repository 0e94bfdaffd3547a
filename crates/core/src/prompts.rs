//! Default prompt templates bundled at compile time.
//!
//! Templates use `{placeholder}` markers filled by [`render`].

/// Step executor - JSON step result contract
pub const STEP_EXECUTOR: &str = include_str!("defaults/step_executor.md");

/// Step executor - spreadsheet tool-call loop
pub const SPREADSHEET_STEP: &str = include_str!("defaults/spreadsheet_step.md");

/// Agent - executive summary that becomes the deliverable
pub const DELIVERABLE: &str = include_str!("defaults/deliverable.md");

/// Agent - free-form chat persona
pub const AGENT_CHAT: &str = include_str!("defaults/agent_chat.md");

/// Orchestrator - cross-agent synthesis
pub const SYNTHESIS: &str = include_str!("defaults/synthesis.md");

/// Orchestrator - hypothesis evaluation
pub const HYPOTHESIS: &str = include_str!("defaults/hypothesis.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("step_executor", STEP_EXECUTOR),
        ("spreadsheet_step", SPREADSHEET_STEP),
        ("deliverable", DELIVERABLE),
        ("agent_chat", AGENT_CHAT),
        ("synthesis", SYNTHESIS),
        ("hypothesis", HYPOTHESIS),
    ]
}

/// Substitute `{key}` markers in a template
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_prompts_non_empty() {
        for (slug, content) in all_defaults() {
            assert!(!content.is_empty(), "Prompt '{}' should not be empty", slug);
            assert!(content.len() > 50, "Prompt '{}' seems too short", slug);
        }
    }

    #[test]
    fn test_render_fills_every_marker() {
        let rendered = render(DELIVERABLE, &[("agent_name", "Scout"), ("goal", "EV market")]);
        assert!(rendered.contains("You are Scout."));
        assert!(rendered.contains("Goal: EV market"));
        assert!(!rendered.contains('{'));
    }
}
