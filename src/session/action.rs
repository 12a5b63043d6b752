//! The closed set of actions the model may request.
//!
//! The model names an action by string; parsing turns `(name, arguments)`
//! into an [`Action`] once, and dispatch is an exhaustive match afterwards.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm::ToolDefinition;

pub const EXECUTE_CODE: &str = "execute_code";
pub const SEARCH_INSIGHTS: &str = "search_insights";
pub const FINALIZE: &str = "finalize";

const DEFAULT_EXECUTIVE_SUMMARY: &str = "Analysis completed";

/// A parsed action request.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ExecuteCode {
        code: String,
    },
    SearchInsights {
        query: String,
        context: Option<String>,
    },
    Finalize {
        executive_summary: String,
        focus_findings: String,
    },
}

/// Why an action request could not be turned into an [`Action`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("Unknown action '{0}'. Available actions: execute_code, search_insights, finalize")]
    UnknownAction(String),

    #[error("Invalid arguments for {action}: {reason}")]
    InvalidArguments { action: &'static str, reason: String },

    #[error("Missing required argument '{argument}' for {action}")]
    MissingArgument {
        action: &'static str,
        argument: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct ExecuteCodeArgs {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchInsightsArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FinalizeArgs {
    #[serde(default)]
    executive_summary: Option<String>,
    #[serde(default)]
    focus_analysis_findings: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn decode<T: serde::de::DeserializeOwned>(
    action: &'static str,
    input: &Value,
) -> Result<T, ActionError> {
    serde_json::from_value(input.clone()).map_err(|e| ActionError::InvalidArguments {
        action,
        reason: e.to_string(),
    })
}

impl Action {
    /// Parse a model-issued request.
    pub fn parse(name: &str, input: &Value) -> Result<Self, ActionError> {
        match name {
            EXECUTE_CODE => {
                let args: ExecuteCodeArgs = decode(EXECUTE_CODE, input)?;
                let code = non_blank(args.code).ok_or(ActionError::MissingArgument {
                    action: EXECUTE_CODE,
                    argument: "code",
                })?;
                Ok(Action::ExecuteCode { code })
            }
            SEARCH_INSIGHTS => {
                let args: SearchInsightsArgs = decode(SEARCH_INSIGHTS, input)?;
                let query = non_blank(args.query).ok_or(ActionError::MissingArgument {
                    action: SEARCH_INSIGHTS,
                    argument: "query",
                })?;
                Ok(Action::SearchInsights {
                    query,
                    context: non_blank(args.context),
                })
            }
            FINALIZE => {
                let args: FinalizeArgs = decode(FINALIZE, input)?;
                Ok(Action::Finalize {
                    executive_summary: non_blank(args.executive_summary)
                        .unwrap_or_else(|| DEFAULT_EXECUTIVE_SUMMARY.to_string()),
                    focus_findings: args.focus_analysis_findings.unwrap_or_default(),
                })
            }
            other => Err(ActionError::UnknownAction(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::ExecuteCode { .. } => EXECUTE_CODE,
            Action::SearchInsights { .. } => SEARCH_INSIGHTS,
            Action::Finalize { .. } => FINALIZE,
        }
    }

    pub fn is_finalize(&self) -> bool {
        matches!(self, Action::Finalize { .. })
    }
}

/// Definitions of every action, in the shape the completion service expects.
pub fn action_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            EXECUTE_CODE,
            "Run Python code in the analysis sandbox to explore data, compute statistics and \
             create visualizations. State (variables, files) persists between calls. Charts \
             displayed with matplotlib/seaborn are captured automatically.",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Python code to execute"
                    }
                },
                "required": ["code"]
            }),
        ),
        ToolDefinition::function(
            SEARCH_INSIGHTS,
            "Search health and fitness research to validate patterns, explain unusual metrics \
             and back recommendations with evidence.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Research question, e.g. 'optimal protein intake for strength training'"
                    },
                    "context": {
                        "type": "string",
                        "description": "Optional context about the user's data to make the search more relevant"
                    }
                },
                "required": ["query"]
            }),
        ),
        ToolDefinition::function(
            FINALIZE,
            "Call when the analysis and visualizations are complete. Ends the session and \
             produces the final report.",
            json!({
                "type": "object",
                "properties": {
                    "executive_summary": {
                        "type": "string",
                        "description": "Detailed markdown analysis for the top of the report: key findings, patterns, research insights, recommendations and conclusions."
                    },
                    "focus_analysis_findings": {
                        "type": "string",
                        "description": "Findings about the requested focus area, if one was given: correlations found, research insights and specific recommendations. Leave empty without a focus."
                    }
                },
                "required": ["executive_summary"]
            }),
        ),
    ]
}
