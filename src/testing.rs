//! In-memory repositories and a scripted completion service for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::ai::completion::{Completion, CompletionOptions, CompletionService, TokenUsage};
use crate::days::repo::DayEntryRepository;
use crate::days::repo_types::{DayEntry, DayEntryPatch};
use crate::error::{AppError, AppResult};
use crate::meals::repo::MealRepository;
use crate::meals::repo_types::{Meal, MealType, MealUpdate, NewMeal};
use crate::products::normalize::normalize_name;
use crate::products::repo::ProductRepository;
use crate::products::repo_types::{NewProduct, Product, ProductPatch, ProductSource};

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    days: HashMap<Uuid, DayEntry>,
    // insertion order, like `ORDER BY created_at`
    meals: Vec<Meal>,
}

/// Implements every repository trait over plain collections.
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
}

impl MemoryDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.tables.lock().unwrap();
        f(&mut tables)
    }

    pub fn insert_product(&self, name: &str, kcal: f64) -> Product {
        self.insert_product_full_by(name, kcal, None, None, None)
    }

    pub fn insert_product_by(&self, name: &str, kcal: f64, created_by: Option<Uuid>) -> Product {
        self.insert_product_full_by(name, kcal, None, None, created_by)
    }

    pub fn insert_product_full(
        &self,
        name: &str,
        kcal: f64,
        protein: Option<f64>,
        fiber: Option<f64>,
    ) -> Product {
        self.insert_product_full_by(name, kcal, protein, fiber, None)
    }

    fn insert_product_full_by(
        &self,
        name: &str,
        kcal: f64,
        protein: Option<f64>,
        fiber: Option<f64>,
        created_by: Option<Uuid>,
    ) -> Product {
        let now = OffsetDateTime::now_utc();
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            normalized_name: normalize_name(name),
            kcal_per_100g: kcal,
            protein_per_100g: protein,
            fat_per_100g: None,
            carbs_per_100g: None,
            fiber_per_100g: fiber,
            sugar_per_100g: None,
            source: ProductSource::Manual,
            is_verified: true,
            usage_count: 0,
            created_by,
            barcode: None,
            brand: None,
            category: None,
            created_at: now,
            updated_at: now,
        };
        self.with(|t| t.products.insert(product.id, product.clone()));
        product
    }

    pub fn set_usage_count(&self, id: Uuid, count: i64) {
        self.with(|t| {
            if let Some(p) = t.products.get_mut(&id) {
                p.usage_count = count;
            }
        });
    }

    pub fn set_kcal(&self, id: Uuid, kcal: f64) {
        self.with(|t| {
            if let Some(p) = t.products.get_mut(&id) {
                p.kcal_per_100g = kcal;
            }
        });
    }

    pub fn product(&self, id: Uuid) -> Option<Product> {
        self.with(|t| t.products.get(&id).cloned())
    }

    pub fn product_count(&self) -> usize {
        self.with(|t| t.products.len())
    }

    pub fn day(&self, id: Uuid) -> Option<DayEntry> {
        self.with(|t| t.days.get(&id).cloned())
    }

    pub fn day_count(&self) -> usize {
        self.with(|t| t.days.len())
    }

    pub fn meal(&self, id: Uuid) -> Option<Meal> {
        self.with(|t| t.meals.iter().find(|m| m.id == id).cloned())
    }

    pub fn meal_count(&self) -> usize {
        self.with(|t| t.meals.len())
    }

    pub fn meals_for_day(&self, day_entry_id: Uuid) -> Vec<Meal> {
        self.with(|t| {
            t.meals
                .iter()
                .filter(|m| m.day_entry_id == day_entry_id)
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl ProductRepository for MemoryDb {
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        Ok(self.product(id))
    }

    async fn search(&self, normalized_term: &str, limit: i64) -> anyhow::Result<Vec<Product>> {
        let mut hits: Vec<Product> = self.with(|t| {
            t.products
                .values()
                .filter(|p| p.normalized_name.contains(normalized_term))
                .cloned()
                .collect()
        });
        hits.sort_by(|a, b| {
            let exact = |p: &Product| p.normalized_name == normalized_term;
            let prefix = |p: &Product| p.normalized_name.starts_with(normalized_term);
            exact(b)
                .cmp(&exact(a))
                .then(prefix(b).cmp(&prefix(a)))
                .then(b.usage_count.cmp(&a.usage_count))
                .then(b.updated_at.cmp(&a.updated_at))
        });
        hits.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(hits)
    }

    async fn create(&self, data: NewProduct) -> anyhow::Result<Uuid> {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        let product = Product {
            id,
            name: data.name,
            normalized_name: data.normalized_name,
            kcal_per_100g: data.kcal_per_100g,
            protein_per_100g: data.protein_per_100g,
            fat_per_100g: data.fat_per_100g,
            carbs_per_100g: data.carbs_per_100g,
            fiber_per_100g: data.fiber_per_100g,
            sugar_per_100g: data.sugar_per_100g,
            source: data.source,
            is_verified: data.is_verified,
            usage_count: 0,
            created_by: data.created_by,
            barcode: data.barcode,
            brand: data.brand,
            category: data.category,
            created_at: now,
            updated_at: now,
        };
        self.with(|t| t.products.insert(id, product));
        Ok(id)
    }

    async fn update(&self, id: Uuid, patch: ProductPatch) -> anyhow::Result<Option<Product>> {
        Ok(self.with(|t| {
            let p = t.products.get_mut(&id)?;
            if let Some(v) = patch.name {
                p.name = v;
            }
            if let Some(v) = patch.normalized_name {
                p.normalized_name = v;
            }
            if let Some(v) = patch.kcal_per_100g {
                p.kcal_per_100g = v;
            }
            p.protein_per_100g = patch.protein_per_100g.or(p.protein_per_100g);
            p.fat_per_100g = patch.fat_per_100g.or(p.fat_per_100g);
            p.carbs_per_100g = patch.carbs_per_100g.or(p.carbs_per_100g);
            p.fiber_per_100g = patch.fiber_per_100g.or(p.fiber_per_100g);
            p.sugar_per_100g = patch.sugar_per_100g.or(p.sugar_per_100g);
            p.brand = patch.brand.or(p.brand.take());
            p.category = patch.category.or(p.category.take());
            p.updated_at = OffsetDateTime::now_utc();
            Some(p.clone())
        }))
    }

    async fn increment_usage_count(&self, id: Uuid) -> anyhow::Result<()> {
        self.with(|t| {
            if let Some(p) = t.products.get_mut(&id) {
                p.usage_count += 1;
            }
        });
        Ok(())
    }
}

#[async_trait]
impl DayEntryRepository for MemoryDb {
    async fn get_by_user_and_date(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> anyhow::Result<Option<DayEntry>> {
        Ok(self.with(|t| {
            t.days
                .values()
                .find(|d| d.user_id == user_id && d.date == date)
                .cloned()
        }))
    }

    async fn create(&self, user_id: Uuid, date: Date) -> anyhow::Result<DayEntry> {
        Ok(self.with(|t| {
            if let Some(existing) = t
                .days
                .values()
                .find(|d| d.user_id == user_id && d.date == date)
            {
                return existing.clone();
            }
            let now = OffsetDateTime::now_utc();
            let day = DayEntry {
                id: Uuid::new_v4(),
                user_id,
                date,
                target_kcal: None,
                consumed_kcal: 0,
                consumed_fiber: 0.0,
                notes: None,
                created_at: now,
                updated_at: now,
            };
            t.days.insert(day.id, day.clone());
            day
        }))
    }

    async fn update(&self, id: Uuid, patch: DayEntryPatch) -> anyhow::Result<Option<DayEntry>> {
        Ok(self.with(|t| {
            let d = t.days.get_mut(&id)?;
            if patch.target_kcal.is_some() {
                d.target_kcal = patch.target_kcal;
            }
            if patch.notes.is_some() {
                d.notes = patch.notes;
            }
            d.updated_at = OffsetDateTime::now_utc();
            Some(d.clone())
        }))
    }

    async fn update_consumed_kcal(&self, id: Uuid, kcal: i32) -> anyhow::Result<()> {
        self.with(|t| {
            if let Some(d) = t.days.get_mut(&id) {
                d.consumed_kcal = kcal;
            }
        });
        Ok(())
    }

    async fn update_consumed_fiber(&self, id: Uuid, fiber: f64) -> anyhow::Result<()> {
        self.with(|t| {
            if let Some(d) = t.days.get_mut(&id) {
                d.consumed_fiber = fiber;
            }
        });
        Ok(())
    }

    async fn check_ownership(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.day(id).is_some_and(|d| d.user_id == user_id))
    }
}

#[async_trait]
impl MealRepository for MemoryDb {
    async fn create(&self, data: NewMeal) -> anyhow::Result<Meal> {
        let now = OffsetDateTime::now_utc();
        let meal = Meal {
            id: Uuid::new_v4(),
            day_entry_id: data.day_entry_id,
            meal_type: data.meal_type,
            time: data.time,
            items: data.items,
            total_kcal: data.total_kcal,
            total_fiber: data.total_fiber,
            source: data.source,
            ai_confidence: data.ai_confidence,
            created_at: now,
            updated_at: now,
        };
        self.with(|t| t.meals.push(meal.clone()));
        Ok(meal)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Meal>> {
        Ok(self.meal(id))
    }

    async fn find_by_day_entry_and_type(
        &self,
        day_entry_id: Uuid,
        meal_type: MealType,
    ) -> anyhow::Result<Option<Meal>> {
        Ok(self.with(|t| {
            t.meals
                .iter()
                .find(|m| m.day_entry_id == day_entry_id && m.meal_type == meal_type)
                .cloned()
        }))
    }

    async fn update(&self, id: Uuid, update: MealUpdate) -> anyhow::Result<Option<Meal>> {
        Ok(self.with(|t| {
            let m = t.meals.iter_mut().find(|m| m.id == id)?;
            if let Some(v) = update.meal_type {
                m.meal_type = v;
            }
            if update.time.is_some() {
                m.time = update.time;
            }
            if let Some(items) = update.items {
                m.items = items.items;
                m.total_kcal = items.total_kcal;
                m.total_fiber = items.total_fiber;
            }
            m.updated_at = OffsetDateTime::now_utc();
            Some(m.clone())
        }))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.with(|t| {
            let before = t.meals.len();
            t.meals.retain(|m| m.id != id);
            t.meals.len() != before
        }))
    }

    async fn get_all_by_day_entry(&self, day_entry_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        Ok(self.meals_for_day(day_entry_id))
    }

    async fn calculate_total_kcal_for_day_entry(&self, day_entry_id: Uuid) -> anyhow::Result<i64> {
        Ok(self
            .meals_for_day(day_entry_id)
            .iter()
            .map(|m| i64::from(m.total_kcal))
            .sum())
    }

    async fn calculate_total_fiber_for_day_entry(
        &self,
        day_entry_id: Uuid,
    ) -> anyhow::Result<f64> {
        Ok(self
            .meals_for_day(day_entry_id)
            .iter()
            .map(|m| m.total_fiber)
            .sum())
    }
}

enum Reply {
    Text(String),
    Fail,
}

/// Replays canned completion texts in order. Every reply reports
/// 10 prompt and 5 completion tokens.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Reply>>,
    always_fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn replying(texts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(texts.iter().map(|t| Reply::Text(t.to_string())).collect()),
            always_fail: false,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            always_fail: true,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn push_failure(&self) {
        self.replies.lock().unwrap().push_back(Reply::Fail);
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn user_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _options: CompletionOptions,
    ) -> AppResult<Completion> {
        self.prompts.lock().unwrap().push(user_prompt.to_string());
        if self.always_fail {
            return Err(AppError::internal("AI service request failed"));
        }
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Text(json_text)) => Ok(Completion {
                json_text,
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            }),
            Some(Reply::Fail) | None => Err(AppError::internal("AI service request failed")),
        }
    }
}
