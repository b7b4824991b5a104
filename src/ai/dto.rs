use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::completion::TokenUsage;
use crate::meals::repo_types::{Meal, MealType};
use crate::products::dto::ProductCandidate;

#[derive(Debug, Deserialize)]
pub struct ParseMealRequest {
    pub text: String,
    #[serde(rename = "type")]
    pub meal_type: MealType,
    /// `YYYY-MM-DD`; today (UTC) when absent.
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMealWithTextRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AiMealResponse {
    pub meal: Meal,
    pub confidence: f64,
    pub usage: TokenUsage,
    /// Names the model returned that could not be turned into items.
    pub skipped_items: Vec<String>,
}

/// Shape the parse prompt asks the model for. Items stay raw JSON until
/// each one is decoded on its own, so one malformed entry cannot sink the
/// whole reply.
#[derive(Debug, Deserialize)]
pub struct ParsedMeal {
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Decodes one raw item into a candidate.
pub fn decode_candidate(raw: Value) -> Result<ProductCandidate, serde_json::Error> {
    serde_json::from_value(raw)
}

/// Best name to report for a raw item that could not be used.
pub fn item_label(raw: &Value) -> String {
    match raw.get("name").and_then(Value::as_str).or_else(|| raw.as_str()) {
        Some(name) => name.to_string(),
        None => raw.to_string(),
    }
}

/// Shape the estimate prompt asks the model for.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedNutritionReply {
    pub kcal_per_100g: Option<f64>,
    pub protein_per_100g: Option<f64>,
    pub fat_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fiber_per_100g: Option<f64>,
    pub sugar_per_100g: Option<f64>,
}

/// Models sometimes wrap JSON in a markdown fence despite being told not to.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
