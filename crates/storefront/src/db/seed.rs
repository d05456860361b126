//! Load a [`Dataset`] into `PostgreSQL`.
//!
//! Rows keep the dataset's explicit ids so that references between them stay
//! intact; sequences are bumped past the highest id afterwards.

use sqlx::{PgPool, Postgres, Transaction};

use super::RepositoryError;
use crate::store::fallback::{Dataset, FallbackError};

/// Outcome of a seed run, per table.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub seeded: Vec<(&'static str, usize)>,
    /// Tables left alone because they already held rows.
    pub skipped: Vec<&'static str>,
}

/// Errors from seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Dataset(#[from] FallbackError),

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

impl From<sqlx::Error> for SeedError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

async fn has_rows(tx: &mut Transaction<'_, Postgres>, table: &str) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM kaaya.{table})");
    sqlx::query_scalar(&sql).fetch_one(&mut **tx).await
}

async fn bump_sequence(tx: &mut Transaction<'_, Postgres>, table: &str) -> Result<(), sqlx::Error> {
    let sql = format!(
        "SELECT setval(pg_get_serial_sequence('kaaya.{table}', 'id'), \
         GREATEST((SELECT MAX(id) FROM kaaya.{table}), 1))"
    );
    sqlx::query(&sql).execute(&mut **tx).await?;
    Ok(())
}

/// Insert `dataset` inside a single transaction.
///
/// Tables that already hold rows are skipped unless `force` is set, in which
/// case rows with matching ids are overwritten.
///
/// # Errors
///
/// Returns an error if the dataset cannot be materialized or any write fails.
pub async fn import(pool: &PgPool, dataset: &Dataset, force: bool) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();
    let mut tx = pool.begin().await?;

    if force || !has_rows(&mut tx, "app_user").await? {
        let users = dataset.users();
        for user in &users {
            sqlx::query(
                r"
                INSERT INTO kaaya.app_user (id, name, email, phone, role, is_active)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name, email = EXCLUDED.email, phone = EXCLUDED.phone,
                    role = EXCLUDED.role, is_active = EXCLUDED.is_active, updated_at = NOW()
                ",
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(user.role)
            .bind(user.is_active)
            .execute(&mut *tx)
            .await?;
        }
        bump_sequence(&mut tx, "app_user").await?;
        report.seeded.push(("app_user", users.len()));
    } else {
        report.skipped.push("app_user");
    }

    if force || !has_rows(&mut tx, "category").await? {
        let categories = dataset.categories()?;
        // Parents may appear after their children, so links are set in a second pass.
        for category in &categories {
            sqlx::query(
                r"
                INSERT INTO kaaya.category
                    (id, name, slug, description, image_url, sort_order, show_in_menu, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name, slug = EXCLUDED.slug,
                    description = EXCLUDED.description, image_url = EXCLUDED.image_url,
                    sort_order = EXCLUDED.sort_order, show_in_menu = EXCLUDED.show_in_menu,
                    is_active = EXCLUDED.is_active, updated_at = NOW()
                ",
            )
            .bind(category.id)
            .bind(&category.name)
            .bind(category.slug.as_str())
            .bind(&category.description)
            .bind(&category.image_url)
            .bind(category.sort_order)
            .bind(category.show_in_menu)
            .bind(category.is_active)
            .execute(&mut *tx)
            .await?;
        }
        for category in &categories {
            sqlx::query("UPDATE kaaya.category SET parent_id = $2 WHERE id = $1")
                .bind(category.id)
                .bind(category.parent_id)
                .execute(&mut *tx)
                .await?;
        }
        bump_sequence(&mut tx, "category").await?;
        report.seeded.push(("category", categories.len()));
    } else {
        report.skipped.push("category");
    }

    if force || !has_rows(&mut tx, "product").await? {
        let products = dataset.products()?;
        for product in &products {
            sqlx::query(
                r"
                INSERT INTO kaaya.product
                    (id, name, slug, description, price, compare_at_price, sku, stock_quantity,
                     category_id, brand, image_url, images, is_featured, is_active, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name, slug = EXCLUDED.slug,
                    description = EXCLUDED.description, price = EXCLUDED.price,
                    compare_at_price = EXCLUDED.compare_at_price, sku = EXCLUDED.sku,
                    stock_quantity = EXCLUDED.stock_quantity, category_id = EXCLUDED.category_id,
                    brand = EXCLUDED.brand, image_url = EXCLUDED.image_url,
                    images = EXCLUDED.images, is_featured = EXCLUDED.is_featured,
                    is_active = EXCLUDED.is_active, updated_at = NOW()
                ",
            )
            .bind(product.id)
            .bind(&product.name)
            .bind(product.slug.as_str())
            .bind(&product.description)
            .bind(product.price)
            .bind(product.compare_at_price)
            .bind(&product.sku)
            .bind(product.stock_quantity)
            .bind(product.category_id)
            .bind(&product.brand)
            .bind(&product.image_url)
            .bind(&product.images)
            .bind(product.is_featured)
            .bind(product.is_active)
            .bind(product.created_at)
            .execute(&mut *tx)
            .await?;
        }
        bump_sequence(&mut tx, "product").await?;
        report.seeded.push(("product", products.len()));
    } else {
        report.skipped.push("product");
    }

    if force || !has_rows(&mut tx, "setting").await? {
        let entries = dataset.settings.to_map()?;
        for (key, value) in &entries {
            sqlx::query(
                r"
                INSERT INTO kaaya.setting (key, value)
                VALUES ($1, $2)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                ",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        report.seeded.push(("setting", entries.len()));
    } else {
        report.skipped.push("setting");
    }

    tx.commit().await?;
    Ok(report)
}
