use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::completion::TokenUsage;
use crate::products::repo_types::ProductSource;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub kcal_per_100g: f64,
    pub protein_per_100g: Option<f64>,
    pub fat_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fiber_per_100g: Option<f64>,
    pub sugar_per_100g: Option<f64>,
    pub barcode: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
}

/// PATCH body. Absent and `null` fields both keep the stored value, so a
/// macro cannot be cleared back to unknown once set.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub kcal_per_100g: Option<f64>,
    pub protein_per_100g: Option<f64>,
    pub fat_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fiber_per_100g: Option<f64>,
    pub sugar_per_100g: Option<f64>,
    pub brand: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// A food the AI extracted from free text, not yet tied to a product.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCandidate {
    pub name: String,
    pub quantity: f64,
    #[serde(default)]
    pub search_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedProduct {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub was_created: bool,
    pub source: ProductSource,
    /// Tokens spent estimating nutrition; zero when an existing product matched.
    pub usage: TokenUsage,
}
