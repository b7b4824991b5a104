use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::products::repo_types::{NewProduct, Product, ProductPatch, ProductRow};

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Product>>;

    /// Products whose normalized name matches `normalized_term`, best match
    /// first: exact, then prefix, then substring; ties by usage count and
    /// most recent update.
    async fn search(&self, normalized_term: &str, limit: i64) -> anyhow::Result<Vec<Product>>;

    async fn create(&self, data: NewProduct) -> anyhow::Result<Uuid>;

    async fn update(&self, id: Uuid, patch: ProductPatch) -> anyhow::Result<Option<Product>>;

    async fn increment_usage_count(&self, id: Uuid) -> anyhow::Result<()>;
}

const PRODUCT_COLUMNS: &str = r#"
    id, name, normalized_name, kcal_per_100g, protein_per_100g, fat_per_100g,
    carbs_per_100g, fiber_per_100g, sugar_per_100g, source, is_verified,
    usage_count, created_by, barcode, brand, category, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgProductRepository {
    db: PgPool,
}

impl PgProductRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Product::try_from).transpose()
    }

    async fn search(&self, normalized_term: &str, limit: i64) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE normalized_name LIKE '%' || $1 || '%'
            ORDER BY (normalized_name = $1) DESC,
                     (normalized_name LIKE $1 || '%') DESC,
                     usage_count DESC,
                     updated_at DESC
            LIMIT $2
            "#
        ))
        .bind(normalized_term)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn create(&self, data: NewProduct) -> anyhow::Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO products (
                name, normalized_name, kcal_per_100g, protein_per_100g, fat_per_100g,
                carbs_per_100g, fiber_per_100g, sugar_per_100g, source, is_verified,
                created_by, barcode, brand, category
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(&data.name)
        .bind(&data.normalized_name)
        .bind(data.kcal_per_100g)
        .bind(data.protein_per_100g)
        .bind(data.fat_per_100g)
        .bind(data.carbs_per_100g)
        .bind(data.fiber_per_100g)
        .bind(data.sugar_per_100g)
        .bind(data.source.as_str())
        .bind(data.is_verified)
        .bind(data.created_by)
        .bind(&data.barcode)
        .bind(&data.brand)
        .bind(&data.category)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn update(&self, id: Uuid, patch: ProductPatch) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                normalized_name = COALESCE($3, normalized_name),
                kcal_per_100g = COALESCE($4, kcal_per_100g),
                protein_per_100g = COALESCE($5, protein_per_100g),
                fat_per_100g = COALESCE($6, fat_per_100g),
                carbs_per_100g = COALESCE($7, carbs_per_100g),
                fiber_per_100g = COALESCE($8, fiber_per_100g),
                sugar_per_100g = COALESCE($9, sugar_per_100g),
                brand = COALESCE($10, brand),
                category = COALESCE($11, category),
                updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.normalized_name)
        .bind(patch.kcal_per_100g)
        .bind(patch.protein_per_100g)
        .bind(patch.fat_per_100g)
        .bind(patch.carbs_per_100g)
        .bind(patch.fiber_per_100g)
        .bind(patch.sugar_per_100g)
        .bind(&patch.brand)
        .bind(&patch.category)
        .fetch_optional(&self.db)
        .await?;
        row.map(Product::try_from).transpose()
    }

    async fn increment_usage_count(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE products SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
