use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::meals::repo_types::{Meal, MealRow, MealType, MealUpdate, NewMeal};

#[async_trait]
pub trait MealRepository: Send + Sync {
    async fn create(&self, data: NewMeal) -> anyhow::Result<Meal>;

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Meal>>;

    async fn find_by_day_entry_and_type(
        &self,
        day_entry_id: Uuid,
        meal_type: MealType,
    ) -> anyhow::Result<Option<Meal>>;

    async fn update(&self, id: Uuid, update: MealUpdate) -> anyhow::Result<Option<Meal>>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn get_all_by_day_entry(&self, day_entry_id: Uuid) -> anyhow::Result<Vec<Meal>>;

    /// Summed as `i64`; the caller decides what fits the cached day total.
    async fn calculate_total_kcal_for_day_entry(&self, day_entry_id: Uuid) -> anyhow::Result<i64>;

    async fn calculate_total_fiber_for_day_entry(&self, day_entry_id: Uuid)
        -> anyhow::Result<f64>;
}

const MEAL_COLUMNS: &str = r#"
    id, day_entry_id, meal_type, time, items, total_kcal, total_fiber,
    source, ai_confidence, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgMealRepository {
    db: PgPool,
}

impl PgMealRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MealRepository for PgMealRepository {
    async fn create(&self, data: NewMeal) -> anyhow::Result<Meal> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            INSERT INTO meals (
                day_entry_id, meal_type, time, items, total_kcal, total_fiber,
                source, ai_confidence
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(data.day_entry_id)
        .bind(data.meal_type.as_str())
        .bind(&data.time)
        .bind(Json(&data.items))
        .bind(data.total_kcal)
        .bind(data.total_fiber)
        .bind(data.source.as_str())
        .bind(data.ai_confidence)
        .fetch_one(&self.db)
        .await?;
        Meal::try_from(row)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Meal>> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            "SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Meal::try_from).transpose()
    }

    async fn find_by_day_entry_and_type(
        &self,
        day_entry_id: Uuid,
        meal_type: MealType,
    ) -> anyhow::Result<Option<Meal>> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            "SELECT {MEAL_COLUMNS} FROM meals WHERE day_entry_id = $1 AND meal_type = $2 LIMIT 1"
        ))
        .bind(day_entry_id)
        .bind(meal_type.as_str())
        .fetch_optional(&self.db)
        .await?;
        row.map(Meal::try_from).transpose()
    }

    async fn update(&self, id: Uuid, update: MealUpdate) -> anyhow::Result<Option<Meal>> {
        let (items, total_kcal, total_fiber) = match update.items {
            Some(i) => (Some(Json(i.items)), Some(i.total_kcal), Some(i.total_fiber)),
            None => (None, None, None),
        };
        let row = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            UPDATE meals SET
                meal_type = COALESCE($2, meal_type),
                time = COALESCE($3, time),
                items = COALESCE($4, items),
                total_kcal = COALESCE($5, total_kcal),
                total_fiber = COALESCE($6, total_fiber),
                updated_at = now()
            WHERE id = $1
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.meal_type.map(MealType::as_str))
        .bind(&update.time)
        .bind(items)
        .bind(total_kcal)
        .bind(total_fiber)
        .fetch_optional(&self.db)
        .await?;
        row.map(Meal::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM meals WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_all_by_day_entry(&self, day_entry_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        let rows = sqlx::query_as::<_, MealRow>(&format!(
            "SELECT {MEAL_COLUMNS} FROM meals WHERE day_entry_id = $1 ORDER BY created_at ASC"
        ))
        .bind(day_entry_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Meal::try_from).collect()
    }

    async fn calculate_total_kcal_for_day_entry(&self, day_entry_id: Uuid) -> anyhow::Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_kcal), 0)::BIGINT FROM meals WHERE day_entry_id = $1",
        )
        .bind(day_entry_id)
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }

    async fn calculate_total_fiber_for_day_entry(
        &self,
        day_entry_id: Uuid,
    ) -> anyhow::Result<f64> {
        let total: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_fiber), 0)::DOUBLE PRECISION FROM meals WHERE day_entry_id = $1",
        )
        .bind(day_entry_id)
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }
}
