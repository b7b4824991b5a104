use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use time::{Date, OffsetDateTime};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::ai::completion::{CompletionOptions, CompletionService, TokenUsage};
use crate::ai::dto::{
    decode_candidate, item_label, strip_code_fence, AiMealResponse, EstimatedNutritionReply,
    ParsedMeal,
};
use crate::ai::prompts::{
    estimate_user_prompt, parse_user_prompt, ESTIMATE_OPTIONS, ESTIMATE_SYSTEM_PROMPT,
    PARSE_OPTIONS, PARSE_SYSTEM_PROMPT,
};
use crate::error::{AppError, AppResult};
use crate::meals::repo_types::{MealSource, MealType, NewFoodItem};
use crate::meals::services::{check_quantity, CreateMeal, MealService};
use crate::products::dto::ProductCandidate;
use crate::products::repo_types::NutritionPer100g;
use crate::products::services::{
    EstimatedNutrition, NutritionEstimator, ProductResolver, ProductService,
};

/// Calls the model and decodes its JSON reply. An empty or undecodable
/// reply is an upstream failure.
async fn complete_json<T: DeserializeOwned>(
    completion: &dyn CompletionService,
    system_prompt: &str,
    user_prompt: &str,
    options: CompletionOptions,
) -> AppResult<(T, TokenUsage)> {
    let reply = completion
        .complete(system_prompt, user_prompt, options)
        .await?;
    let body = strip_code_fence(&reply.json_text);
    if body.is_empty() {
        error!("completion returned an empty payload");
        return Err(AppError::internal("AI service returned an empty response"));
    }
    let value = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "completion payload is not the expected JSON");
        AppError::internal("AI service returned malformed JSON")
    })?;
    Ok((value, reply.usage))
}

fn non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Per-100 g estimation backed by the completion service.
pub struct AiNutritionEstimator {
    completion: Arc<dyn CompletionService>,
}

impl AiNutritionEstimator {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl NutritionEstimator for AiNutritionEstimator {
    #[instrument(skip(self))]
    async fn estimate(&self, food_name: &str) -> AppResult<EstimatedNutrition> {
        let (reply, usage): (EstimatedNutritionReply, _) = complete_json(
            self.completion.as_ref(),
            ESTIMATE_SYSTEM_PROMPT,
            &estimate_user_prompt(food_name),
            ESTIMATE_OPTIONS,
        )
        .await?;

        let kcal = non_negative(reply.kcal_per_100g).ok_or_else(|| {
            AppError::bad_request(format!("Could not estimate calories for {food_name}"))
                .with_extension("kcal_per_100g", "missing or negative")
        })?;

        Ok(EstimatedNutrition {
            per_100g: NutritionPer100g {
                kcal,
                protein: non_negative(reply.protein_per_100g),
                fat: non_negative(reply.fat_per_100g),
                carbs: non_negative(reply.carbs_per_100g),
                fiber: non_negative(reply.fiber_per_100g),
            },
            sugar_per_100g: non_negative(reply.sugar_per_100g),
            usage,
        })
    }
}

struct ResolvedBatch {
    items: Vec<NewFoodItem>,
    confidence: f64,
    usage: TokenUsage,
    skipped: Vec<String>,
}

/// Free text to meal items. Resolution is best effort per item: one food
/// that cannot be resolved is logged and skipped, only a batch where nothing
/// resolves is an error.
pub struct AiParsingPipeline {
    completion: Arc<dyn CompletionService>,
    resolver: ProductResolver,
    meals: Arc<MealService>,
    products: Arc<ProductService>,
}

impl AiParsingPipeline {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        resolver: ProductResolver,
        meals: Arc<MealService>,
        products: Arc<ProductService>,
    ) -> Self {
        Self {
            completion,
            resolver,
            meals,
            products,
        }
    }

    #[instrument(skip(self, text))]
    pub async fn parse_and_create(
        &self,
        user_id: Uuid,
        text: &str,
        meal_type: MealType,
        date: Option<Date>,
    ) -> AppResult<AiMealResponse> {
        let date = date.unwrap_or_else(|| OffsetDateTime::now_utc().date());
        let batch = self.parse_and_resolve(user_id, text).await?;
        let product_ids: Vec<Uuid> = batch
            .items
            .iter()
            .filter_map(|i| i.item_ref.product_id())
            .collect();

        let meal = self
            .meals
            .create(
                user_id,
                date,
                CreateMeal {
                    meal_type,
                    time: None,
                    items: batch.items,
                    source: MealSource::Ai,
                    ai_confidence: Some(batch.confidence),
                },
            )
            .await?;
        self.products.record_usage(&product_ids).await;

        info!(meal_id = %meal.id, items = meal.items.len(), skipped = batch.skipped.len(), "meal created from text");
        Ok(AiMealResponse {
            meal,
            confidence: batch.confidence,
            usage: batch.usage,
            skipped_items: batch.skipped,
        })
    }

    /// Adds the foods in `text` to an existing meal. Foods already in the
    /// meal get the new quantity; everything else in the meal is kept.
    #[instrument(skip(self, text))]
    pub async fn parse_and_merge(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
        text: &str,
    ) -> AppResult<AiMealResponse> {
        // fail before spending tokens on a meal the user cannot touch
        self.meals.get_by_id(meal_id, user_id).await?;

        let batch = self.parse_and_resolve(user_id, text).await?;
        let outcome = self
            .meals
            .merge_or_add_items(meal_id, user_id, batch.items)
            .await?;
        self.products.record_usage(&outcome.added_product_ids).await;

        info!(meal_id = %meal_id, added = outcome.added_product_ids.len(), skipped = batch.skipped.len(), "meal merged from text");
        Ok(AiMealResponse {
            meal: outcome.meal,
            confidence: batch.confidence,
            usage: batch.usage,
            skipped_items: batch.skipped,
        })
    }

    async fn parse(&self, text: &str) -> AppResult<(ParsedMeal, TokenUsage)> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::bad_request("Text is required").with_extension("text", "empty"));
        }
        let (parsed, usage): (ParsedMeal, _) = complete_json(
            self.completion.as_ref(),
            PARSE_SYSTEM_PROMPT,
            &parse_user_prompt(text),
            PARSE_OPTIONS,
        )
        .await?;
        if parsed.items.is_empty() {
            return Err(AppError::bad_request("No food items found in text"));
        }
        Ok((parsed, usage))
    }

    async fn parse_and_resolve(&self, user_id: Uuid, text: &str) -> AppResult<ResolvedBatch> {
        let (parsed, mut usage) = self.parse(text).await?;
        let confidence = parsed.confidence.unwrap_or(0.0).clamp(0.0, 1.0);

        let mut items = Vec::with_capacity(parsed.items.len());
        let mut skipped = Vec::new();
        for raw in parsed.items {
            let label = item_label(&raw);
            let outcome = match decode_candidate(raw) {
                Ok(candidate) => self.resolve_one(&candidate, user_id).await,
                Err(e) => Err(AppError::bad_request(format!("Malformed item: {e}"))),
            };
            match outcome {
                Ok((item, spent)) => {
                    usage += spent;
                    items.push(item);
                }
                Err(e) => {
                    warn!(error = %e, name = %label, "skipping unresolved item");
                    skipped.push(label);
                }
            }
        }

        if items.is_empty() {
            return Err(AppError::bad_request("Failed to process any products"));
        }
        Ok(ResolvedBatch {
            items,
            confidence,
            usage,
            skipped,
        })
    }

    async fn resolve_one(
        &self,
        candidate: &ProductCandidate,
        user_id: Uuid,
    ) -> AppResult<(NewFoodItem, TokenUsage)> {
        if candidate.name.trim().is_empty() {
            return Err(AppError::bad_request("Item has no name"));
        }
        check_quantity(candidate.quantity)?;
        let resolved = self.resolver.find_or_create(candidate, user_id).await?;
        Ok((
            NewFoodItem::product(resolved.product_id, resolved.quantity),
            resolved.usage,
        ))
    }
}
