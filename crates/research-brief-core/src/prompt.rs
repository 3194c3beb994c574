//! Prompts sent to the generator.

/// System prompt: ground every claim in the numbered evidence.
pub const BRIEFING_SYSTEM: &str = "\
You are a research assistant that produces short, evidence-grounded briefings.
Rules:
- Do not claim facts not supported by provided evidence snippets.
- Every important statement must include citations like [1], [2].
- If evidence is insufficient, say what is missing and abstain.
";

/// Build the user prompt from the topic and rendered evidence block.
pub fn briefing_prompt(topic: &str, evidence: &str) -> String {
    format!(
        "Topic: {topic}

Evidence snippets:
{evidence}

Write a 1-page briefing in Markdown with:
# Briefing - {topic}
## Executive summary
## Key points
## Metrics / signals (only if present)
## Risks & uncertainties
## Opportunities / next actions
## Sources
"
    )
}
