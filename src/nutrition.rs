//! Conversion between per-100 g nutrition profiles and the absolute values
//! cached on a meal item.
//!
//! `kcal` is always an integer; gram-based macros keep one decimal and a
//! macro that scales to zero is reported as unknown (`None`) rather than `0`.
//!
//! [`recover_per_100g`] inverts [`scale_from_per_100g`] from an item's own
//! cached values so it can be re-quantified without loading its product.
//! Each recovery works from already-rounded numbers, so repeated
//! re-quantification drifts by up to the rounding step per pass. That drift
//! is accepted.
//!
//! Inputs are bounded by [`MAX_QUANTITY_GRAMS`] and [`MAX_KCAL_PER_100G`], so a
//! single item never exceeds 1 000 000 kcal and [`scale_kcal`] never clamps.

use serde::Serialize;

use crate::meals::repo_types::FoodItem;
use crate::products::repo_types::NutritionPer100g;

/// Absolute nutrition for a concrete quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ItemNutrition {
    pub kcal: i32,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
    pub fiber: Option<f64>,
}

/// Largest accepted item quantity: 100 kg.
pub const MAX_QUANTITY_GRAMS: f64 = 100_000.0;

/// Pure fat is about 900 kcal per 100 g.
pub const MAX_KCAL_PER_100G: f64 = 1_000.0;

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn scale_kcal(kcal_per_100g: f64, quantity_grams: f64) -> i32 {
    (kcal_per_100g * quantity_grams / 100.0).round() as i32
}

pub fn scale_macro(per_100g: Option<f64>, quantity_grams: f64) -> Option<f64> {
    let scaled = round1(per_100g? * quantity_grams / 100.0);
    (scaled > 0.0).then_some(scaled)
}

pub fn scale_from_per_100g(rates: &NutritionPer100g, quantity_grams: f64) -> ItemNutrition {
    ItemNutrition {
        kcal: scale_kcal(rates.kcal, quantity_grams),
        protein: scale_macro(rates.protein, quantity_grams),
        fat: scale_macro(rates.fat, quantity_grams),
        carbs: scale_macro(rates.carbs, quantity_grams),
        fiber: scale_macro(rates.fiber, quantity_grams),
    }
}

/// Per-100 g rates implied by an item's cached values. Only fields the item
/// carries are recovered. Returns `None` for items with a non-positive
/// quantity, where there is nothing to divide by.
pub fn recover_per_100g(item: &FoodItem) -> Option<NutritionPer100g> {
    let quantity = item.quantity;
    if !(quantity > 0.0) {
        return None;
    }
    let rate = |value: f64| value / quantity * 100.0;
    Some(NutritionPer100g {
        kcal: rate(f64::from(item.kcal)),
        protein: item.protein.map(rate),
        fat: item.fat.map(rate),
        carbs: item.carbs.map(rate),
        fiber: item.fiber.map(rate),
    })
}
