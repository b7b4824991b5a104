use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::meals::repo_types::{ItemRef, Meal, MealType, NewFoodItem};

/// One item as sent by clients: exactly one of `product_id` and `recipe_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct FoodItemInput {
    pub product_id: Option<Uuid>,
    pub recipe_id: Option<Uuid>,
    pub quantity: f64,
    pub unit: Option<String>,
}

impl TryFrom<FoodItemInput> for NewFoodItem {
    type Error = AppError;

    fn try_from(input: FoodItemInput) -> Result<Self, Self::Error> {
        let item_ref = match (input.product_id, input.recipe_id) {
            (Some(id), None) => ItemRef::Product(id),
            (None, Some(id)) => ItemRef::Recipe(id),
            (None, None) => {
                return Err(AppError::bad_request("Item needs product_id or recipe_id"))
            }
            (Some(_), Some(_)) => {
                return Err(AppError::bad_request(
                    "Item cannot have both product_id and recipe_id",
                ))
            }
        };
        Ok(NewFoodItem {
            item_ref,
            quantity: input.quantity,
            unit: input.unit,
        })
    }
}

pub fn to_new_items(inputs: Vec<FoodItemInput>) -> Result<Vec<NewFoodItem>, AppError> {
    inputs.into_iter().map(NewFoodItem::try_from).collect()
}

#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(rename = "type")]
    pub meal_type: MealType,
    pub time: Option<String>,
    pub items: Vec<FoodItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMealRequest {
    #[serde(rename = "type")]
    pub meal_type: Option<MealType>,
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: f64,
}

#[derive(Debug, Deserialize)]
pub struct AddItemsRequest {
    pub items: Vec<FoodItemInput>,
}

/// Body of a product removal. `meal` is `null` when the meal was deleted
/// because its last item went away.
#[derive(Debug, Serialize)]
pub struct RemoveProductResponse {
    pub meal: Option<Meal>,
    pub deleted: bool,
}
