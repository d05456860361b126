//! Category repository.
//!
//! `product_count` is computed on read with a correlated subquery, so every
//! read goes through [`SELECT_CATEGORY`] and writes re-read the row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use kaaya_core::CategoryId;

use super::{RepositoryError, conflict_on_unique, parse_slug};
use crate::models::{Category, NewCategory};

const SELECT_CATEGORY: &str = r"
    SELECT c.id, c.name, c.slug, c.description, c.image_url, c.parent_id,
           c.sort_order, c.show_in_menu, c.is_active, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM kaaya.product p WHERE p.category_id = c.id) AS product_count
    FROM kaaya.category c
";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    image_url: Option<String>,
    parent_id: Option<i32>,
    sort_order: i32,
    show_in_menu: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    product_count: i64,
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: parse_slug(&row.slug)?,
            description: row.description,
            image_url: row.image_url,
            parent_id: row.parent_id.map(CategoryId::new),
            sort_order: row.sort_order,
            show_in_menu: row.show_in_menu,
            is_active: row.is_active,
            product_count: row.product_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories ordered for menu display.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Category>, RepositoryError> {
        let sql = format!(
            "{SELECT_CATEGORY} WHERE ($1 OR c.is_active) ORDER BY c.sort_order, c.name"
        );
        let rows = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(include_inactive)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Category::try_from).collect()
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let sql = format!("{SELECT_CATEGORY} WHERE c.id = $1");
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(Category::try_from).transpose()
    }

    /// Get a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let sql = format!("{SELECT_CATEGORY} WHERE c.slug = $1");
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;

        row.map(Category::try_from).transpose()
    }

    /// Insert a new category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, new: &NewCategory) -> Result<Category, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO kaaya.category
                (name, slug, description, image_url, parent_id, sort_order, show_in_menu, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(&new.name)
        .bind(new.slug.as_str())
        .bind(&new.description)
        .bind(&new.image_url)
        .bind(new.parent_id)
        .bind(new.sort_order)
        .bind(new.show_in_menu)
        .bind(new.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("category slug already exists"))?;

        self.get(CategoryId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Persist every mutable field of `category`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row no longer exists.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn save(&self, category: &Category) -> Result<Category, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE kaaya.category
            SET name = $2, slug = $3, description = $4, image_url = $5, parent_id = $6,
                sort_order = $7, show_in_menu = $8, is_active = $9, updated_at = $10
            WHERE id = $1
            ",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(category.slug.as_str())
        .bind(&category.description)
        .bind(&category.image_url)
        .bind(category.parent_id)
        .bind(category.sort_order)
        .bind(category.show_in_menu)
        .bind(category.is_active)
        .bind(category.updated_at)
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("category slug already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get(category.id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Hard-delete a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if nothing was deleted.
    /// Returns `RepositoryError::Conflict` if rows still reference it.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM kaaya.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::Conflict(
                        "category is still referenced by products or subcategories".to_owned(),
                    );
                }
                RepositoryError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of products (active or not) assigned to a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_products(&self, id: CategoryId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM kaaya.product WHERE category_id = $1")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Number of direct child categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_children(&self, id: CategoryId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM kaaya.category WHERE parent_id = $1")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Move a category within the menu.
    ///
    /// `parent` follows the partial-update convention: `None` keeps the
    /// current parent, `Some(None)` moves the category to the top level.
    /// Returns `false` when the id does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_menu_position(
        &self,
        id: CategoryId,
        sort_order: i32,
        parent: Option<Option<CategoryId>>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE kaaya.category
            SET sort_order = $2,
                parent_id = CASE WHEN $3 THEN $4 ELSE parent_id END,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(sort_order)
        .bind(parent.is_some())
        .bind(parent.flatten())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Show or hide a category in site navigation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_menu_visibility(
        &self,
        id: CategoryId,
        show_in_menu: bool,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE kaaya.category SET show_in_menu = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(show_in_menu)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
