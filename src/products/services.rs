use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::ai::completion::TokenUsage;
use crate::error::{AppError, AppResult};
use crate::products::dto::{
    CreateProductRequest, ProductCandidate, ResolvedProduct, UpdateProductRequest,
};
use crate::products::normalize::normalize_name;
use crate::products::repo::ProductRepository;
use crate::nutrition::MAX_KCAL_PER_100G;
use crate::products::repo_types::{
    NewProduct, NutritionPer100g, Product, ProductPatch, ProductSource,
};

const MAX_SEARCH_LIMIT: i64 = 50;

/// Per-100 g values estimated for a food that has no stored product yet.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedNutrition {
    pub per_100g: NutritionPer100g,
    pub sugar_per_100g: Option<f64>,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait NutritionEstimator: Send + Sync {
    async fn estimate(&self, food_name: &str) -> AppResult<EstimatedNutrition>;
}

fn check_non_negative(field: &'static str, value: Option<f64>) -> AppResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(AppError::bad_request(format!(
            "{field} must be a non-negative number"
        ))
        .with_extension(field, "must be >= 0")),
        _ => Ok(()),
    }
}

fn check_kcal(kcal: f64) -> AppResult<()> {
    if !kcal.is_finite() || kcal < 0.0 {
        return Err(AppError::bad_request("kcal_per_100g must be a non-negative number")
            .with_extension("kcal_per_100g", "must be >= 0"));
    }
    if kcal > MAX_KCAL_PER_100G {
        return Err(AppError::bad_request(format!(
            "kcal_per_100g must not exceed {MAX_KCAL_PER_100G}"
        ))
        .with_extension("kcal_per_100g", format!("must be <= {MAX_KCAL_PER_100G}")));
    }
    Ok(())
}

/// Finds an existing product for an AI candidate or creates one from an AI
/// nutrition estimate. Never touches `usage_count`; callers record usage
/// once the owning meal is stored.
pub struct ProductResolver {
    products: Arc<dyn ProductRepository>,
    estimator: Arc<dyn NutritionEstimator>,
}

impl ProductResolver {
    pub fn new(products: Arc<dyn ProductRepository>, estimator: Arc<dyn NutritionEstimator>) -> Self {
        Self { products, estimator }
    }

    #[instrument(skip(self, candidate), fields(name = %candidate.name))]
    pub async fn find_or_create(
        &self,
        candidate: &ProductCandidate,
        user_id: Uuid,
    ) -> AppResult<ResolvedProduct> {
        let mut terms: Vec<&str> = candidate.search_terms.iter().map(String::as_str).collect();
        if !terms.iter().any(|t| *t == candidate.name) {
            terms.push(&candidate.name);
        }

        for term in terms {
            let key = normalize_name(term);
            if key.is_empty() {
                continue;
            }
            if let Some(product) = self.products.search(&key, 1).await?.into_iter().next() {
                debug!(term, product_id = %product.id, "matched existing product");
                return Ok(ResolvedProduct {
                    product_id: product.id,
                    name: product.name,
                    quantity: candidate.quantity,
                    was_created: false,
                    source: product.source,
                    usage: TokenUsage::default(),
                });
            }
        }

        let estimate = self.estimator.estimate(&candidate.name).await?;
        let kcal = estimate.per_100g.kcal;
        if check_kcal(kcal).is_err() {
            return Err(AppError::bad_request(format!(
                "No usable calorie value for {}",
                candidate.name
            )));
        }

        let name = candidate.name.trim().to_string();
        let id = self
            .products
            .create(NewProduct {
                normalized_name: normalize_name(&name),
                name: name.clone(),
                kcal_per_100g: kcal,
                protein_per_100g: estimate.per_100g.protein,
                fat_per_100g: estimate.per_100g.fat,
                carbs_per_100g: estimate.per_100g.carbs,
                fiber_per_100g: estimate.per_100g.fiber,
                sugar_per_100g: estimate.sugar_per_100g,
                source: ProductSource::Ai,
                is_verified: false,
                created_by: Some(user_id),
                barcode: None,
                brand: None,
                category: None,
            })
            .await?;
        info!(product_id = %id, %name, kcal, "product created from AI estimate");

        Ok(ResolvedProduct {
            product_id: id,
            name,
            quantity: candidate.quantity,
            was_created: true,
            source: ProductSource::Ai,
            usage: estimate.usage,
        })
    }
}

/// Catalog operations on products.
pub struct ProductService {
    products: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create(&self, user_id: Uuid, req: CreateProductRequest) -> AppResult<Product> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::bad_request("Product name is required"));
        }
        check_kcal(req.kcal_per_100g)?;
        check_non_negative("protein_per_100g", req.protein_per_100g)?;
        check_non_negative("fat_per_100g", req.fat_per_100g)?;
        check_non_negative("carbs_per_100g", req.carbs_per_100g)?;
        check_non_negative("fiber_per_100g", req.fiber_per_100g)?;
        check_non_negative("sugar_per_100g", req.sugar_per_100g)?;

        let id = self
            .products
            .create(NewProduct {
                normalized_name: normalize_name(&name),
                name,
                kcal_per_100g: req.kcal_per_100g,
                protein_per_100g: req.protein_per_100g,
                fat_per_100g: req.fat_per_100g,
                carbs_per_100g: req.carbs_per_100g,
                fiber_per_100g: req.fiber_per_100g,
                sugar_per_100g: req.sugar_per_100g,
                source: ProductSource::User,
                is_verified: false,
                created_by: Some(user_id),
                barcode: req.barcode,
                brand: req.brand,
                category: req.category,
            })
            .await?;
        info!(product_id = %id, %user_id, "product created");
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Product> {
        self.products
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))
    }

    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<Product>> {
        let key = normalize_name(query);
        if key.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .products
            .search(&key, limit.clamp(1, MAX_SEARCH_LIMIT))
            .await?)
    }

    /// Only the creator may edit a product. A new name gets a new search key.
    #[instrument(skip(self, req))]
    pub async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: UpdateProductRequest,
    ) -> AppResult<Product> {
        let existing = self.get(id).await?;
        if existing.created_by != Some(user_id) {
            return Err(AppError::forbidden("Product belongs to another user"));
        }
        if let Some(kcal) = req.kcal_per_100g {
            check_kcal(kcal)?;
        }
        check_non_negative("protein_per_100g", req.protein_per_100g)?;
        check_non_negative("fat_per_100g", req.fat_per_100g)?;
        check_non_negative("carbs_per_100g", req.carbs_per_100g)?;
        check_non_negative("fiber_per_100g", req.fiber_per_100g)?;
        check_non_negative("sugar_per_100g", req.sugar_per_100g)?;

        let name = match req.name.map(|n| n.trim().to_string()) {
            Some(n) if n.is_empty() => return Err(AppError::bad_request("Product name is required")),
            other => other,
        };
        let patch = ProductPatch {
            normalized_name: name.as_deref().map(normalize_name),
            name,
            kcal_per_100g: req.kcal_per_100g,
            protein_per_100g: req.protein_per_100g,
            fat_per_100g: req.fat_per_100g,
            carbs_per_100g: req.carbs_per_100g,
            fiber_per_100g: req.fiber_per_100g,
            sugar_per_100g: req.sugar_per_100g,
            brand: req.brand,
            category: req.category,
        };
        self.products
            .update(id, patch)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))
    }

    /// Bumps `usage_count` once per id, concurrently. The meal referencing
    /// these products is already stored, so failures are only logged.
    pub async fn record_usage(&self, product_ids: &[Uuid]) {
        let results = join_all(
            product_ids
                .iter()
                .map(|id| async move { (*id, self.products.increment_usage_count(*id).await) }),
        )
        .await;
        for (product_id, res) in results {
            if let Err(e) = res {
                warn!(error = %e, %product_id, "failed to increment usage count");
            }
        }
    }
}
