use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use crate::days::repo_types::{DayEntry, DayEntryPatch};

#[async_trait]
pub trait DayEntryRepository: Send + Sync {
    async fn get_by_user_and_date(&self, user_id: Uuid, date: Date)
        -> anyhow::Result<Option<DayEntry>>;

    /// Inserts an entry with zero totals. Returns the already stored entry if
    /// `(user_id, date)` exists.
    async fn create(&self, user_id: Uuid, date: Date) -> anyhow::Result<DayEntry>;

    async fn update(&self, id: Uuid, patch: DayEntryPatch) -> anyhow::Result<Option<DayEntry>>;

    async fn update_consumed_kcal(&self, id: Uuid, kcal: i32) -> anyhow::Result<()>;

    async fn update_consumed_fiber(&self, id: Uuid, fiber: f64) -> anyhow::Result<()>;

    async fn check_ownership(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;
}

const DAY_COLUMNS: &str = r#"
    id, user_id, date, target_kcal, consumed_kcal, consumed_fiber, notes,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgDayEntryRepository {
    db: PgPool,
}

impl PgDayEntryRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DayEntryRepository for PgDayEntryRepository {
    async fn get_by_user_and_date(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> anyhow::Result<Option<DayEntry>> {
        let day = sqlx::query_as::<_, DayEntry>(&format!(
            "SELECT {DAY_COLUMNS} FROM day_entries WHERE user_id = $1 AND date = $2"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.db)
        .await?;
        Ok(day)
    }

    async fn create(&self, user_id: Uuid, date: Date) -> anyhow::Result<DayEntry> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let day = sqlx::query_as::<_, DayEntry>(&format!(
            r#"
            INSERT INTO day_entries (user_id, date, consumed_kcal, consumed_fiber)
            VALUES ($1, $2, 0, 0)
            ON CONFLICT (user_id, date) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING {DAY_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.db)
        .await?;
        Ok(day)
    }

    async fn update(&self, id: Uuid, patch: DayEntryPatch) -> anyhow::Result<Option<DayEntry>> {
        let day = sqlx::query_as::<_, DayEntry>(&format!(
            r#"
            UPDATE day_entries SET
                target_kcal = COALESCE($2, target_kcal),
                notes = COALESCE($3, notes),
                updated_at = now()
            WHERE id = $1
            RETURNING {DAY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.target_kcal)
        .bind(&patch.notes)
        .fetch_optional(&self.db)
        .await?;
        Ok(day)
    }

    async fn update_consumed_kcal(&self, id: Uuid, kcal: i32) -> anyhow::Result<()> {
        sqlx::query("UPDATE day_entries SET consumed_kcal = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(kcal)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_consumed_fiber(&self, id: Uuid, fiber: f64) -> anyhow::Result<()> {
        sqlx::query("UPDATE day_entries SET consumed_fiber = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(fiber)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn check_ownership(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM day_entries WHERE id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(owned)
    }
}
