use serde_json::Value as JsonValue;

use super::{Insight, InsightError, InsightRequest, InsightResult};

pub const SYSTEM_PROMPT: &str = "You are a data analyst. You explain why points in a \
two-variable scatter plot were flagged as statistical outliers and what to do about them. \
Reply with a single JSON object and nothing else.";

/// User message describing the sample and the expected reply shape.
pub fn build_prompt(request: &InsightRequest) -> String {
    let rows: Vec<JsonValue> = request
        .rows
        .iter()
        .map(|r| r.to_json(&request.columns))
        .collect();
    let sample = serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string());

    format!(
        "The dataset has columns: {columns}.\n\
         Outliers were detected on the plane X = \"{x}\", Y = \"{y}\" using per-axis and joint z-scores.\n\
         Outlier row indices in the full dataset: {indices:?}.\n\
         Below are the outlier rows followed by up to a handful of normal rows for contrast:\n\
         {sample}\n\n\
         Respond with JSON of the form:\n\
         {{\"summary\": string, \"outlierAnalysis\": string, \"actionableInsights\": [string, ...]}}",
        columns = request.columns.join(", "),
        x = request.x_field,
        y = request.y_field,
        indices = request.outlier_indices,
    )
}

/// Parse the model reply, tolerating markdown code fences around the JSON.
pub fn parse_reply(text: &str) -> InsightResult<Insight> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body).map_err(|e| InsightError::Parse(e.to_string()))
}
