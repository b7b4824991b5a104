use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::products::repo_types::ProductSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Other,
}

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Other => "other",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            "other" => Ok(MealType::Other),
            other => anyhow::bail!("unknown meal type: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSource {
    #[default]
    Manual,
    Ai,
}

impl MealSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MealSource::Manual => "manual",
            MealSource::Ai => "ai",
        }
    }
}

impl FromStr for MealSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(MealSource::Manual),
            "ai" => Ok(MealSource::Ai),
            other => anyhow::bail!("unknown meal source: {other}"),
        }
    }
}

/// Line item embedded in a meal. Nutrition fields are cached values derived
/// from the product profile and `quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub kcal: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ProductSource>,
}

/// What a new meal item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    Product(Uuid),
    /// Reserved; recipes are not implemented and always rejected.
    Recipe(Uuid),
}

impl ItemRef {
    pub fn product_id(&self) -> Option<Uuid> {
        match self {
            ItemRef::Product(id) => Some(*id),
            ItemRef::Recipe(_) => None,
        }
    }
}

/// Input for one item of a create or merge call.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFoodItem {
    pub item_ref: ItemRef,
    pub quantity: f64,
    pub unit: Option<String>,
}

impl NewFoodItem {
    pub fn product(product_id: Uuid, quantity: f64) -> Self {
        Self {
            item_ref: ItemRef::Product(product_id),
            quantity,
            unit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: Uuid,
    pub day_entry_id: Uuid,
    #[serde(rename = "type")]
    pub meal_type: MealType,
    pub time: Option<String>,
    pub items: Vec<FoodItem>,
    pub total_kcal: i32,
    pub total_fiber: f64,
    pub source: MealSource,
    pub ai_confidence: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub day_entry_id: Uuid,
    pub meal_type: MealType,
    pub time: Option<String>,
    pub items: Vec<FoodItem>,
    pub total_kcal: i32,
    pub total_fiber: f64,
    pub source: MealSource,
    pub ai_confidence: Option<f64>,
}

/// Partial meal update. Items and both totals travel together.
#[derive(Debug, Clone, Default)]
pub struct MealUpdate {
    pub meal_type: Option<MealType>,
    pub time: Option<String>,
    pub items: Option<MealItems>,
}

#[derive(Debug, Clone)]
pub struct MealItems {
    pub items: Vec<FoodItem>,
    pub total_kcal: i32,
    pub total_fiber: f64,
}

#[derive(Debug, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub day_entry_id: Uuid,
    pub meal_type: String,
    pub time: Option<String>,
    pub items: Json<Vec<FoodItem>>,
    pub total_kcal: i32,
    pub total_fiber: f64,
    pub source: String,
    pub ai_confidence: Option<f64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<MealRow> for Meal {
    type Error = anyhow::Error;

    fn try_from(r: MealRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            day_entry_id: r.day_entry_id,
            meal_type: r.meal_type.parse()?,
            time: r.time,
            items: r.items.0,
            total_kcal: r.total_kcal,
            total_fiber: r.total_fiber,
            source: r.source.parse()?,
            ai_confidence: r.ai_confidence,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
