use std::collections::HashMap;
use std::sync::Arc;

use time::Date;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::days::services::DayService;
use crate::error::{AppError, AppResult};
use crate::meals::repo::MealRepository;
use crate::meals::repo_types::{
    FoodItem, ItemRef, Meal, MealItems, MealSource, MealType, MealUpdate, NewFoodItem, NewMeal,
};
use crate::nutrition::{recover_per_100g, round1, scale_from_per_100g, MAX_QUANTITY_GRAMS};
use crate::products::repo::ProductRepository;

const DEFAULT_UNIT: &str = "g";

#[derive(Debug, Clone)]
pub struct CreateMeal {
    pub meal_type: MealType,
    pub time: Option<String>,
    pub items: Vec<NewFoodItem>,
    pub source: MealSource,
    pub ai_confidence: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct MealDetailsPatch {
    pub meal_type: Option<MealType>,
    pub time: Option<String>,
}

/// Result of a merge: the stored meal and the products that became new items.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub meal: Meal,
    pub added_product_ids: Vec<Uuid>,
}

/// `(total_kcal, total_fiber)` for a list of items. A kcal total that does
/// not fit an `i32` is rejected.
pub fn meal_totals(items: &[FoodItem]) -> AppResult<(i32, f64)> {
    let kcal: i64 = items.iter().map(|i| i64::from(i.kcal)).sum();
    let kcal = i32::try_from(kcal).map_err(|_| {
        AppError::bad_request("Meal calorie total is out of range")
            .with_extension("total_kcal", kcal.to_string())
    })?;
    let fiber = round1(items.iter().filter_map(|i| i.fiber).sum());
    Ok((kcal, fiber))
}

fn product_ref(item_ref: ItemRef) -> AppResult<Uuid> {
    match item_ref {
        ItemRef::Product(id) => Ok(id),
        ItemRef::Recipe(id) => Err(AppError::bad_request("Recipes are not implemented")
            .with_extension("recipe_id", id.to_string())),
    }
}

/// Quantities are grams in `0..=MAX_QUANTITY_GRAMS`.
pub fn check_quantity(quantity: f64) -> AppResult<()> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(AppError::bad_request("Quantity must be a non-negative number")
            .with_extension("quantity", "must be >= 0"));
    }
    if quantity > MAX_QUANTITY_GRAMS {
        return Err(AppError::bad_request(format!(
            "Quantity must not exceed {MAX_QUANTITY_GRAMS} g"
        ))
        .with_extension("quantity", format!("must be <= {MAX_QUANTITY_GRAMS}")));
    }
    Ok(())
}

/// Owns the item list of every meal. Each mutation recomputes the meal
/// totals, stores them with the items and then refreshes the day totals.
///
/// Mutations are plain read-modify-write with no locking; two concurrent
/// merges on one meal can lose an update.
pub struct MealService {
    meals: Arc<dyn MealRepository>,
    products: Arc<dyn ProductRepository>,
    days: Arc<DayService>,
}

impl MealService {
    pub fn new(
        meals: Arc<dyn MealRepository>,
        products: Arc<dyn ProductRepository>,
        days: Arc<DayService>,
    ) -> Self {
        Self {
            meals,
            products,
            days,
        }
    }

    #[instrument(skip(self, input), fields(meal_type = %input.meal_type, items = input.items.len()))]
    pub async fn create(&self, user_id: Uuid, date: Date, input: CreateMeal) -> AppResult<Meal> {
        if input.items.is_empty() {
            return Err(AppError::bad_request("A meal needs at least one item"));
        }
        if let Some(c) = input.ai_confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(AppError::bad_request("ai_confidence must be within 0..1"));
            }
        }

        let day = self.days.get_or_create(user_id, date).await?;
        if self
            .meals
            .find_by_day_entry_and_type(day.id, input.meal_type)
            .await?
            .is_some()
        {
            return Err(AppError::bad_request(format!(
                "A {} meal already exists for {}",
                input.meal_type, date
            ))
            .with_extension("type", input.meal_type.as_str()));
        }

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product_id = product_ref(item.item_ref)?;
            check_quantity(item.quantity)?;
            items.push(
                self.build_item(product_id, item.quantity, item.unit.clone())
                    .await?,
            );
        }

        let (total_kcal, total_fiber) = meal_totals(&items)?;
        let meal = self
            .meals
            .create(NewMeal {
                day_entry_id: day.id,
                meal_type: input.meal_type,
                time: input.time,
                items,
                total_kcal,
                total_fiber,
                source: input.source,
                ai_confidence: input.ai_confidence,
            })
            .await?;
        info!(meal_id = %meal.id, day_entry_id = %day.id, total_kcal, "meal created");

        self.days.refresh_totals(day.id).await?;
        Ok(meal)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, meal_id: Uuid, user_id: Uuid) -> AppResult<Meal> {
        self.load_owned(meal_id, user_id).await
    }

    #[instrument(skip(self))]
    pub async fn update_product_quantity(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        product_id: Uuid,
        quantity: f64,
    ) -> AppResult<Meal> {
        check_quantity(quantity)?;
        let meal = self.load_owned(meal_id, user_id).await?;
        let idx = meal
            .items
            .iter()
            .position(|i| i.product_id == Some(product_id))
            .ok_or_else(|| {
                AppError::not_found("Product not found in meal")
                    .with_extension("product_id", product_id.to_string())
            })?;

        let mut items = meal.items;
        items[idx] = self.requantify(&items[idx], quantity).await?;
        self.save_items(meal.id, meal.day_entry_id, items).await
    }

    /// Updates items whose product is already in the meal, appends the rest.
    /// Items not named in `incoming` are kept as they are.
    #[instrument(skip(self, incoming), fields(items = incoming.len()))]
    pub async fn merge_or_add_items(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        incoming: Vec<NewFoodItem>,
    ) -> AppResult<MergeOutcome> {
        if incoming.is_empty() {
            return Err(AppError::bad_request("No items to merge"));
        }
        let meal = self.load_owned(meal_id, user_id).await?;

        let mut items = meal.items;
        let mut by_product: HashMap<Uuid, usize> = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            if let Some(pid) = item.product_id {
                by_product.entry(pid).or_insert(idx);
            }
        }

        let mut added_product_ids = Vec::new();
        for new_item in incoming {
            let product_id = product_ref(new_item.item_ref)?;
            check_quantity(new_item.quantity)?;
            match by_product.get(&product_id) {
                Some(&idx) => {
                    items[idx] = self.requantify(&items[idx], new_item.quantity).await?;
                }
                None => {
                    let item = self
                        .build_item(product_id, new_item.quantity, new_item.unit)
                        .await?;
                    by_product.insert(product_id, items.len());
                    items.push(item);
                    added_product_ids.push(product_id);
                }
            }
        }

        let meal = self.save_items(meal.id, meal.day_entry_id, items).await?;
        debug!(meal_id = %meal.id, added = added_product_ids.len(), "items merged");
        Ok(MergeOutcome {
            meal,
            added_product_ids,
        })
    }

    /// Removes the product from the meal. Removing the last item deletes the
    /// whole meal and returns `None`.
    #[instrument(skip(self))]
    pub async fn remove_product(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Option<Meal>> {
        let meal = self.load_owned(meal_id, user_id).await?;
        let before = meal.items.len();
        let items: Vec<FoodItem> = meal
            .items
            .into_iter()
            .filter(|i| i.product_id != Some(product_id))
            .collect();
        if items.len() == before {
            return Err(AppError::not_found("Product not found in meal")
                .with_extension("product_id", product_id.to_string()));
        }

        if items.is_empty() {
            self.meals.delete(meal.id).await?;
            info!(meal_id = %meal.id, "last item removed, meal deleted");
            self.days.refresh_totals(meal.day_entry_id).await?;
            return Ok(None);
        }

        self.save_items(meal.id, meal.day_entry_id, items)
            .await
            .map(Some)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, meal_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let meal = self.load_owned(meal_id, user_id).await?;
        self.meals.delete(meal.id).await?;
        info!(meal_id = %meal.id, "meal deleted");
        self.days.refresh_totals(meal.day_entry_id).await
    }

    /// Changes type and/or time. A new type must still be free for the day.
    #[instrument(skip(self, patch))]
    pub async fn update_details(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
        patch: MealDetailsPatch,
    ) -> AppResult<Meal> {
        let meal = self.load_owned(meal_id, user_id).await?;
        if let Some(new_type) = patch.meal_type.filter(|t| *t != meal.meal_type) {
            let taken = self
                .meals
                .find_by_day_entry_and_type(meal.day_entry_id, new_type)
                .await?
                .is_some_and(|other| other.id != meal.id);
            if taken {
                return Err(AppError::bad_request(format!(
                    "A {new_type} meal already exists for this day"
                ))
                .with_extension("type", new_type.as_str()));
            }
        }

        let updated = self
            .meals
            .update(
                meal.id,
                MealUpdate {
                    meal_type: patch.meal_type,
                    time: patch.time,
                    items: None,
                },
            )
            .await?
            .ok_or_else(|| AppError::not_found("Meal not found"))?;
        self.days.refresh_totals(meal.day_entry_id).await?;
        Ok(updated)
    }

    async fn load_owned(&self, meal_id: Uuid, user_id: Uuid) -> AppResult<Meal> {
        let meal = self
            .meals
            .get_by_id(meal_id)
            .await?
            .ok_or_else(|| AppError::not_found("Meal not found"))?;
        if !self.days.check_ownership(meal.day_entry_id, user_id).await? {
            return Err(AppError::forbidden("Meal belongs to another user"));
        }
        Ok(meal)
    }

    async fn build_item(
        &self,
        product_id: Uuid,
        quantity: f64,
        unit: Option<String>,
    ) -> AppResult<FoodItem> {
        let product = self.products.get_by_id(product_id).await?.ok_or_else(|| {
            AppError::not_found("Product not found")
                .with_extension("product_id", product_id.to_string())
        })?;
        let n = scale_from_per_100g(&product.per_100g(), quantity);
        Ok(FoodItem {
            id: Uuid::new_v4(),
            product_id: Some(product.id),
            name: product.name,
            quantity,
            unit: unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            kcal: n.kcal,
            protein: n.protein,
            fat: n.fat,
            carbs: n.carbs,
            fiber: n.fiber,
            source: Some(product.source),
        })
    }

    /// Rescales an item from its own cached values. Items stored with zero
    /// quantity carry no rate, so those fall back to the product profile.
    async fn requantify(&self, item: &FoodItem, quantity: f64) -> AppResult<FoodItem> {
        let rates = match recover_per_100g(item) {
            Some(rates) => rates,
            None => {
                let product_id = item
                    .product_id
                    .ok_or_else(|| AppError::not_found("Product not found"))?;
                self.products
                    .get_by_id(product_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::not_found("Product not found")
                            .with_extension("product_id", product_id.to_string())
                    })?
                    .per_100g()
            }
        };
        let n = scale_from_per_100g(&rates, quantity);
        Ok(FoodItem {
            quantity,
            kcal: n.kcal,
            protein: n.protein,
            fat: n.fat,
            carbs: n.carbs,
            fiber: n.fiber,
            ..item.clone()
        })
    }

    async fn save_items(
        &self,
        meal_id: Uuid,
        day_entry_id: Uuid,
        items: Vec<FoodItem>,
    ) -> AppResult<Meal> {
        let (total_kcal, total_fiber) = meal_totals(&items)?;
        let meal = self
            .meals
            .update(
                meal_id,
                MealUpdate {
                    items: Some(MealItems {
                        items,
                        total_kcal,
                        total_fiber,
                    }),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| AppError::not_found("Meal not found"))?;
        self.days.refresh_totals(day_entry_id).await?;
        Ok(meal)
    }
}

#[cfg(test)]
mod meal_tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::MemoryDb;
    use time::macros::date;

    const DAY: Date = date!(2024 - 05 - 10);

    fn service(db: &Arc<MemoryDb>) -> MealService {
        let days = Arc::new(DayService::new(db.clone(), db.clone()));
        MealService::new(db.clone(), db.clone(), days)
    }

    fn manual(meal_type: MealType, items: Vec<NewFoodItem>) -> CreateMeal {
        CreateMeal {
            meal_type,
            time: Some("08:30".into()),
            items,
            source: MealSource::Manual,
            ai_confidence: None,
        }
    }

    fn assert_consistent(db: &MemoryDb, meal: &Meal) {
        let kcal: i32 = meal.items.iter().map(|i| i.kcal).sum();
        assert_eq!(meal.total_kcal, kcal);
        let day = db.day(meal.day_entry_id).expect("day entry");
        let day_kcal: i32 = db
            .meals_for_day(day.id)
            .iter()
            .map(|m| m.total_kcal)
            .sum();
        assert_eq!(day.consumed_kcal, day_kcal);
    }

    #[tokio::test]
    async fn create_computes_item_meal_and_day_totals() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let oats = db.insert_product("Овсянка", 343.0);
        let user = Uuid::new_v4();

        let meal = meals
            .create(user, DAY, manual(MealType::Breakfast, vec![NewFoodItem::product(oats.id, 100.0)]))
            .await
            .unwrap();

        assert_eq!(meal.items.len(), 1);
        assert_eq!(meal.items[0].kcal, 343);
        assert_eq!(meal.items[0].name, "Овсянка");
        assert_eq!(meal.items[0].unit, "g");
        assert_eq!(meal.total_kcal, 343);
        let day = db.day(meal.day_entry_id).unwrap();
        assert_eq!(day.consumed_kcal, 343);
        assert_eq!(day.user_id, user);
        // the engine itself never bumps usage counts
        assert_eq!(db.product(oats.id).unwrap().usage_count, 0);
    }

    #[tokio::test]
    async fn create_sums_fiber_to_one_decimal() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let a = db.insert_product_full("Bran", 216.0, Some(15.6), Some(42.8));
        let b = db.insert_product_full("Pear", 57.0, Some(0.4), Some(3.1));
        let meal = meals
            .create(
                Uuid::new_v4(),
                DAY,
                manual(
                    MealType::Snack,
                    vec![NewFoodItem::product(a.id, 30.0), NewFoodItem::product(b.id, 178.0)],
                ),
            )
            .await
            .unwrap();
        // 12.8 + 5.5
        assert_eq!(meal.items[0].fiber, Some(12.8));
        assert_eq!(meal.items[1].fiber, Some(5.5));
        assert_eq!(meal.total_fiber, 18.3);
        assert_eq!(db.day(meal.day_entry_id).unwrap().consumed_fiber, 18.3);
    }

    #[tokio::test]
    async fn one_meal_per_type_per_day() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let p = db.insert_product("Rice", 130.0);
        let user = Uuid::new_v4();

        meals
            .create(user, DAY, manual(MealType::Lunch, vec![NewFoodItem::product(p.id, 200.0)]))
            .await
            .unwrap();
        let err = meals
            .create(user, DAY, manual(MealType::Lunch, vec![NewFoodItem::product(p.id, 50.0)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        meals
            .create(user, DAY, manual(MealType::Dinner, vec![NewFoodItem::product(p.id, 50.0)]))
            .await
            .expect("different type is fine");
        meals
            .create(user, date!(2024 - 05 - 11), manual(MealType::Lunch, vec![NewFoodItem::product(p.id, 50.0)]))
            .await
            .expect("same type on another day is fine");
        meals
            .create(Uuid::new_v4(), DAY, manual(MealType::Lunch, vec![NewFoodItem::product(p.id, 50.0)]))
            .await
            .expect("another user is fine");
    }

    #[tokio::test]
    async fn create_rejects_recipes_missing_products_and_empty_input() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let user = Uuid::new_v4();

        let recipe = NewFoodItem {
            item_ref: ItemRef::Recipe(Uuid::new_v4()),
            quantity: 100.0,
            unit: None,
        };
        let err = meals
            .create(user, DAY, manual(MealType::Breakfast, vec![recipe]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        let err = meals
            .create(user, DAY, manual(MealType::Breakfast, vec![NewFoodItem::product(Uuid::new_v4(), 10.0)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = meals
            .create(user, DAY, manual(MealType::Breakfast, vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        assert_eq!(db.meal_count(), 0);
    }

    #[tokio::test]
    async fn get_checks_owner() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let p = db.insert_product("Egg", 155.0);
        let owner = Uuid::new_v4();
        let meal = meals
            .create(owner, DAY, manual(MealType::Breakfast, vec![NewFoodItem::product(p.id, 60.0)]))
            .await
            .unwrap();

        assert_eq!(meals.get_by_id(meal.id, owner).await.unwrap().id, meal.id);
        let err = meals.get_by_id(meal.id, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = meals.get_by_id(Uuid::new_v4(), owner).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn update_quantity_rescales_from_item_not_product() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let milk = db.insert_product_full("Milk", 64.0, Some(0.0), None);
        let bread = db.insert_product("Bread", 265.0);
        let user = Uuid::new_v4();
        let meal = meals
            .create(
                user,
                DAY,
                manual(
                    MealType::Breakfast,
                    vec![NewFoodItem::product(milk.id, 250.0), NewFoodItem::product(bread.id, 40.0)],
                ),
            )
            .await
            .unwrap();
        assert_eq!(meal.items[0].kcal, 160);

        // Changing the product afterwards must not affect re-quantification.
        db.set_kcal(milk.id, 1000.0);

        let updated = meals
            .update_product_quantity(meal.id, user, milk.id, 125.0)
            .await
            .unwrap();
        assert_eq!(updated.items[0].kcal, 80);
        assert_eq!(updated.items[0].quantity, 125.0);
        assert_eq!(updated.items[0].id, meal.items[0].id);
        assert_eq!(updated.items[1], meal.items[1]);
        assert_eq!(updated.total_kcal, 80 + 106);
        assert_consistent(&db, &updated);

        let err = meals
            .update_product_quantity(meal.id, user, Uuid::new_v4(), 10.0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = meals
            .update_product_quantity(meal.id, user, milk.id, -1.0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn zero_quantity_item_falls_back_to_product() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let p = db.insert_product("Butter", 717.0);
        let user = Uuid::new_v4();
        let meal = meals
            .create(user, DAY, manual(MealType::Breakfast, vec![NewFoodItem::product(p.id, 0.0)]))
            .await
            .unwrap();
        assert_eq!(meal.total_kcal, 0);

        let updated = meals
            .update_product_quantity(meal.id, user, p.id, 10.0)
            .await
            .unwrap();
        assert_eq!(updated.items[0].kcal, 72);
    }

    #[tokio::test]
    async fn oversized_quantities_are_rejected_without_writes() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let oil = db.insert_product("Olive oil", 884.0);
        let user = Uuid::new_v4();

        let err = meals
            .create(
                user,
                DAY,
                manual(
                    MealType::Dinner,
                    vec![NewFoodItem::product(oil.id, 1.0e9), NewFoodItem::product(oil.id, 1.0e9)],
                ),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(db.meal_count(), 0);

        let meal = meals
            .create(user, DAY, manual(MealType::Dinner, vec![NewFoodItem::product(oil.id, MAX_QUANTITY_GRAMS)]))
            .await
            .expect("the bound itself is accepted");
        assert_eq!(meal.total_kcal, 884_000);

        let err = meals
            .update_product_quantity(meal.id, user, oil.id, MAX_QUANTITY_GRAMS + 1.0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        let err = meals
            .merge_or_add_items(meal.id, user, vec![NewFoodItem::product(oil.id, f64::INFINITY)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(db.meal(meal.id).unwrap().total_kcal, 884_000);
    }

    #[test]
    fn meal_total_overflow_is_bad_request() {
        let item = |kcal: i32| FoodItem {
            id: Uuid::new_v4(),
            product_id: Some(Uuid::new_v4()),
            name: "block".into(),
            quantity: 100.0,
            unit: "g".into(),
            kcal,
            protein: None,
            fat: None,
            carbs: None,
            fiber: Some(0.25),
            source: None,
        };
        let err = meal_totals(&[item(i32::MAX), item(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        let (kcal, fiber) = meal_totals(&[item(i32::MAX - 1), item(1)]).unwrap();
        assert_eq!(kcal, i32::MAX);
        assert_eq!(fiber, 0.5);
    }

    #[tokio::test]
    async fn merge_updates_existing_and_appends_new() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let p = db.insert_product("Kefir", 172.0);
        let other = db.insert_product("Cookie", 450.0);
        let fresh = db.insert_product("Banana", 89.0);
        let user = Uuid::new_v4();
        let meal = meals
            .create(
                user,
                DAY,
                manual(
                    MealType::Snack,
                    vec![NewFoodItem::product(p.id, 100.0), NewFoodItem::product(other.id, 20.0)],
                ),
            )
            .await
            .unwrap();
        assert_eq!(meal.items[0].kcal, 172);

        let outcome = meals
            .merge_or_add_items(
                meal.id,
                user,
                vec![NewFoodItem::product(p.id, 200.0), NewFoodItem::product(fresh.id, 120.0)],
            )
            .await
            .unwrap();

        let merged = outcome.meal;
        assert_eq!(merged.items.len(), 3);
        assert_eq!(merged.items[0].kcal, 344);
        assert_eq!(merged.items[0].quantity, 200.0);
        assert_eq!(merged.items[1], meal.items[1]);
        assert_eq!(merged.items[2].kcal, 107);
        assert_eq!(outcome.added_product_ids, vec![fresh.id]);
        assert_eq!(merged.total_kcal, 344 + 90 + 107);
        assert_consistent(&db, &merged);
    }

    #[tokio::test]
    async fn merge_with_repeated_product_in_batch_adds_once() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let a = db.insert_product("Tea", 1.0);
        let b = db.insert_product("Sugar", 400.0);
        let user = Uuid::new_v4();
        let meal = meals
            .create(user, DAY, manual(MealType::Other, vec![NewFoodItem::product(a.id, 250.0)]))
            .await
            .unwrap();

        let outcome = meals
            .merge_or_add_items(
                meal.id,
                user,
                vec![NewFoodItem::product(b.id, 5.0), NewFoodItem::product(b.id, 10.0)],
            )
            .await
            .unwrap();
        assert_eq!(outcome.meal.items.len(), 2);
        assert_eq!(outcome.meal.items[1].quantity, 10.0);
        assert_eq!(outcome.meal.items[1].kcal, 40);
        assert_eq!(outcome.added_product_ids, vec![b.id]);
    }

    #[tokio::test]
    async fn merge_checks_owner_and_fails_fast() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let p = db.insert_product("Tea", 1.0);
        let user = Uuid::new_v4();
        let meal = meals
            .create(user, DAY, manual(MealType::Other, vec![NewFoodItem::product(p.id, 250.0)]))
            .await
            .unwrap();

        let err = meals
            .merge_or_add_items(meal.id, Uuid::new_v4(), vec![NewFoodItem::product(p.id, 1.0)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = meals
            .merge_or_add_items(
                meal.id,
                user,
                vec![NewFoodItem::product(p.id, 500.0), NewFoodItem::product(Uuid::new_v4(), 1.0)],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        // nothing was written
        assert_eq!(db.meal(meal.id).unwrap().items[0].quantity, 250.0);
    }

    #[tokio::test]
    async fn removing_last_item_deletes_meal() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let a = db.insert_product("Apple", 52.0);
        let b = db.insert_product("Cheese", 402.0);
        let user = Uuid::new_v4();
        let meal = meals
            .create(
                user,
                DAY,
                manual(
                    MealType::Snack,
                    vec![NewFoodItem::product(a.id, 150.0), NewFoodItem::product(b.id, 30.0)],
                ),
            )
            .await
            .unwrap();
        let day_id = meal.day_entry_id;

        let remaining = meals
            .remove_product(meal.id, user, a.id)
            .await
            .unwrap()
            .expect("meal still has cheese");
        assert_eq!(remaining.items.len(), 1);
        assert_eq!(remaining.total_kcal, 121);
        assert_consistent(&db, &remaining);

        let err = meals.remove_product(meal.id, user, a.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let gone = meals.remove_product(meal.id, user, b.id).await.unwrap();
        assert!(gone.is_none());
        let err = meals.get_by_id(meal.id, user).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(db.day(day_id).unwrap().consumed_kcal, 0);
    }

    #[tokio::test]
    async fn delete_refreshes_day() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let p = db.insert_product("Pasta", 158.0);
        let user = Uuid::new_v4();
        let lunch = meals
            .create(user, DAY, manual(MealType::Lunch, vec![NewFoodItem::product(p.id, 200.0)]))
            .await
            .unwrap();
        let dinner = meals
            .create(user, DAY, manual(MealType::Dinner, vec![NewFoodItem::product(p.id, 100.0)]))
            .await
            .unwrap();
        assert_eq!(db.day(lunch.day_entry_id).unwrap().consumed_kcal, 316 + 158);

        let err = meals.delete(lunch.id, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        meals.delete(lunch.id, user).await.unwrap();
        assert!(db.meal(lunch.id).is_none());
        assert_eq!(db.day(dinner.day_entry_id).unwrap().consumed_kcal, 158);
    }

    #[tokio::test]
    async fn update_details_keeps_type_unique() {
        let db = MemoryDb::new();
        let meals = service(&db);
        let p = db.insert_product("Soup", 40.0);
        let user = Uuid::new_v4();
        let lunch = meals
            .create(user, DAY, manual(MealType::Lunch, vec![NewFoodItem::product(p.id, 300.0)]))
            .await
            .unwrap();
        meals
            .create(user, DAY, manual(MealType::Dinner, vec![NewFoodItem::product(p.id, 300.0)]))
            .await
            .unwrap();

        let err = meals
            .update_details(
                lunch.id,
                user,
                MealDetailsPatch {
                    meal_type: Some(MealType::Dinner),
                    time: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        let updated = meals
            .update_details(
                lunch.id,
                user,
                MealDetailsPatch {
                    meal_type: Some(MealType::Snack),
                    time: Some("16:00".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.meal_type, MealType::Snack);
        assert_eq!(updated.time.as_deref(), Some("16:00"));
        assert_eq!(updated.items, lunch.items);
    }
}
