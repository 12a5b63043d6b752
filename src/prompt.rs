//! The instruction that seeds every end-of-day analysis session.

use crate::datasets::StagedDataset;
use crate::session::{EXECUTE_CODE, FINALIZE, SEARCH_INSIGHTS};

/// Iteration by which the model is asked to have finalized.
fn finalize_deadline(max_iterations: usize) -> usize {
    (max_iterations * 3 / 4).max(1)
}

/// Build the session instruction for the staged datasets and optional focus.
pub fn analysis_prompt(
    staged: &[StagedDataset],
    focus: Option<&str>,
    max_iterations: usize,
) -> String {
    let files = staged
        .iter()
        .map(|d| format!("- {} at {}", d.name, d.sandbox_path))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        r#"# Iterative Personal Data Analysis

The following CSV exports have been uploaded to the sandbox:
{files}

## Actions
You work in a loop and may request these actions:

1. `{execute}` - run Python in the sandbox. Variables and files persist between calls. Charts shown with matplotlib or seaborn are captured.
2. `{search}` - search health and fitness research to validate findings and ground recommendations.
3. `{finalize}` - end the session with a markdown executive summary. Nothing runs after it.

## Workflow
1. Explore: load every file, check columns, date ranges and the most recent entries.
2. Analyse: chart recent data (last 7-14 days) against historical averages and call out changes.
3. Refine: improve the charts, add cross-metric correlations and a clear narrative.
4. Research: use `{search}` to check unusual patterns and back recommendations with evidence.
5. Finalize: call `{finalize}` by iteration {deadline} at the latest. Aim for 3-5 strong charts; fewer excellent charts beat running out of iterations.

## Guidelines
- Adapt to whatever data is actually present and handle missing values.
- Use clear styling, highlight recent points and annotate significant changes.
- Compare "recent" and "historical" periods explicitly.

Start by exploring the data structure."#,
        files = files,
        execute = EXECUTE_CODE,
        search = SEARCH_INSIGHTS,
        finalize = FINALIZE,
        deadline = finalize_deadline(max_iterations),
    );

    if let Some(focus) = focus.map(str::trim).filter(|f| !f.is_empty()) {
        prompt.push_str(&format!(
            r#"

## Focus: "{focus}"
Make this the central question of the analysis while still covering the basics:
- Treat it as a hypothesis and test it against the data.
- Look for correlations and timing relationships with every relevant metric.
- If symptoms are described, track them against the other measurements.
- Report what you found in `focus_analysis_findings` when you call `{finalize}`, with specific recommendations."#,
            focus = focus,
            finalize = FINALIZE,
        ));
    }

    prompt.push_str(&format!(
        r#"

## End-of-day review
- Today's summary: how today compares with recent patterns.
- Achievements: what went well today.
- Improvements: concrete opportunities for tomorrow.
- Trends: where today sits in the weekly and monthly picture.
- Research: use `{search}` for evidence-based next steps.

Tone: encouraging, insightful and actionable."#,
        search = SEARCH_INSIGHTS,
    ));

    prompt
}
