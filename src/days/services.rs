use std::sync::Arc;

use time::Date;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::days::dto::DaySummary;
use crate::days::repo::DayEntryRepository;
use crate::days::repo_types::{DayEntry, DayEntryPatch};
use crate::error::{AppError, AppResult};
use crate::meals::repo::MealRepository;
use crate::nutrition::round1;

/// Owns the per-day consumed totals. Totals are always recomputed from the
/// meals currently stored for the day, never adjusted by deltas.
pub struct DayService {
    days: Arc<dyn DayEntryRepository>,
    meals: Arc<dyn MealRepository>,
}

impl DayService {
    pub fn new(days: Arc<dyn DayEntryRepository>, meals: Arc<dyn MealRepository>) -> Self {
        Self { days, meals }
    }

    #[instrument(skip(self))]
    pub async fn get_or_create(&self, user_id: Uuid, date: Date) -> AppResult<DayEntry> {
        if let Some(day) = self.days.get_by_user_and_date(user_id, date).await? {
            return Ok(day);
        }
        let day = self.days.create(user_id, date).await?;
        debug!(day_entry_id = %day.id, %user_id, %date, "day entry created");
        Ok(day)
    }

    #[instrument(skip(self))]
    pub async fn refresh_consumed_kcal(&self, day_entry_id: Uuid) -> AppResult<i32> {
        let sum = self
            .meals
            .calculate_total_kcal_for_day_entry(day_entry_id)
            .await?;
        let total = i32::try_from(sum).map_err(|_| {
            AppError::bad_request("Daily calorie total is out of range")
                .with_extension("consumed_kcal", sum.to_string())
        })?;
        self.days.update_consumed_kcal(day_entry_id, total).await?;
        Ok(total)
    }

    #[instrument(skip(self))]
    pub async fn refresh_consumed_fiber(&self, day_entry_id: Uuid) -> AppResult<f64> {
        let total = round1(
            self.meals
                .calculate_total_fiber_for_day_entry(day_entry_id)
                .await?,
        );
        self.days.update_consumed_fiber(day_entry_id, total).await?;
        Ok(total)
    }

    /// Recomputes both cached totals. Every meal write path ends here.
    pub async fn refresh_totals(&self, day_entry_id: Uuid) -> AppResult<()> {
        let kcal = self.refresh_consumed_kcal(day_entry_id).await?;
        let fiber = self.refresh_consumed_fiber(day_entry_id).await?;
        debug!(%day_entry_id, kcal, fiber, "day totals refreshed");
        Ok(())
    }

    /// `false` when the entry does not exist or belongs to someone else.
    pub async fn check_ownership(&self, day_entry_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self.days.check_ownership(day_entry_id, user_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_summary(&self, user_id: Uuid, date: Date) -> AppResult<DaySummary> {
        let day = self.get_or_create(user_id, date).await?;
        let meals = self.meals.get_all_by_day_entry(day.id).await?;
        Ok(DaySummary { day, meals })
    }

    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        user_id: Uuid,
        date: Date,
        patch: DayEntryPatch,
    ) -> AppResult<DayEntry> {
        if matches!(patch.target_kcal, Some(t) if t < 0) {
            return Err(AppError::bad_request("target_kcal must not be negative")
                .with_extension("target_kcal", "must be >= 0"));
        }
        let day = self.get_or_create(user_id, date).await?;
        self.days
            .update(day.id, patch)
            .await?
            .ok_or_else(|| AppError::not_found("Day entry not found"))
    }
}
