use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Provenance of a product or meal item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductSource {
    Manual,
    Ai,
    Openfoodfacts,
    User,
}

impl ProductSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductSource::Manual => "manual",
            ProductSource::Ai => "ai",
            ProductSource::Openfoodfacts => "openfoodfacts",
            ProductSource::User => "user",
        }
    }
}

impl fmt::Display for ProductSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ProductSource::Manual),
            "ai" => Ok(ProductSource::Ai),
            "openfoodfacts" => Ok(ProductSource::Openfoodfacts),
            "user" => Ok(ProductSource::User),
            other => anyhow::bail!("unknown product source: {other}"),
        }
    }
}

/// Nutrition profile per 100 g of a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionPer100g {
    pub kcal: f64,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
    pub fiber: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub normalized_name: String,
    pub kcal_per_100g: f64,
    pub protein_per_100g: Option<f64>,
    pub fat_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fiber_per_100g: Option<f64>,
    pub sugar_per_100g: Option<f64>,
    pub source: ProductSource,
    pub is_verified: bool,
    pub usage_count: i64,
    pub created_by: Option<Uuid>,
    pub barcode: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Product {
    pub fn per_100g(&self) -> NutritionPer100g {
        NutritionPer100g {
            kcal: self.kcal_per_100g,
            protein: self.protein_per_100g,
            fat: self.fat_per_100g,
            carbs: self.carbs_per_100g,
            fiber: self.fiber_per_100g,
        }
    }
}

/// Data for a product insert. `normalized_name` is filled in by the service.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub normalized_name: String,
    pub kcal_per_100g: f64,
    pub protein_per_100g: Option<f64>,
    pub fat_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fiber_per_100g: Option<f64>,
    pub sugar_per_100g: Option<f64>,
    pub source: ProductSource,
    pub is_verified: bool,
    pub created_by: Option<Uuid>,
    pub barcode: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
}

/// Partial product update; `None` leaves a column untouched. There is no
/// way to set a nullable column back to `NULL`.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub normalized_name: Option<String>,
    pub kcal_per_100g: Option<f64>,
    pub protein_per_100g: Option<f64>,
    pub fat_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fiber_per_100g: Option<f64>,
    pub sugar_per_100g: Option<f64>,
    pub brand: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub normalized_name: String,
    pub kcal_per_100g: f64,
    pub protein_per_100g: Option<f64>,
    pub fat_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fiber_per_100g: Option<f64>,
    pub sugar_per_100g: Option<f64>,
    pub source: String,
    pub is_verified: bool,
    pub usage_count: i64,
    pub created_by: Option<Uuid>,
    pub barcode: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ProductRow> for Product {
    type Error = anyhow::Error;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            normalized_name: r.normalized_name,
            kcal_per_100g: r.kcal_per_100g,
            protein_per_100g: r.protein_per_100g,
            fat_per_100g: r.fat_per_100g,
            carbs_per_100g: r.carbs_per_100g,
            fiber_per_100g: r.fiber_per_100g,
            sugar_per_100g: r.sugar_per_100g,
            source: r.source.parse()?,
            is_verified: r.is_verified,
            usage_count: r.usage_count,
            created_by: r.created_by,
            barcode: r.barcode,
            brand: r.brand,
            category: r.category,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
