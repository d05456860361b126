//! Product repository.
//!
//! Listing filters are assembled with [`sqlx::QueryBuilder`]; every user
//! value is bound, never interpolated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use kaaya_core::{CategoryId, Page, PageRequest, Pagination, ProductId};

use super::{RepositoryError, conflict_on_unique, parse_slug};
use crate::models::{NewProduct, Product, ProductFilter, ProductSort};

const SELECT_PRODUCT: &str = r"
    SELECT p.id, p.name, p.slug, p.description, p.price, p.compare_at_price, p.sku,
           p.stock_quantity, p.category_id, p.brand, p.image_url, p.images,
           p.is_featured, p.is_active, p.created_at, p.updated_at
    FROM kaaya.product p
";

const UNIQUE_MESSAGE: &str = "product slug or SKU already exists";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    sku: Option<String>,
    stock_quantity: i32,
    category_id: Option<i32>,
    brand: Option<String>,
    image_url: Option<String>,
    images: Vec<String>,
    is_featured: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug: parse_slug(&row.slug)?,
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            sku: row.sku,
            stock_quantity: row.stock_quantity,
            category_id: row.category_id.map(CategoryId::new),
            brand: row.brand,
            image_url: row.image_url,
            images: row.images,
            is_featured: row.is_featured,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escape `%`, `_` and `\` so a search term matches literally inside `ILIKE`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if !filter.include_inactive {
        qb.push(" AND p.is_active");
    }
    if let Some(ids) = &filter.category_ids {
        let raw: Vec<i32> = ids.iter().map(CategoryId::as_i32).collect();
        qb.push(" AND p.category_id = ANY(").push_bind(raw).push(")");
    }
    if let Some(featured) = filter.featured {
        qb.push(" AND p.is_featured = ").push_bind(featured);
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND p.price <= ").push_bind(max);
    }
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.brand ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

const fn order_clause(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Newest => " ORDER BY p.created_at DESC, p.id DESC",
        ProductSort::PriceAsc => " ORDER BY p.price ASC, p.id ASC",
        ProductSort::PriceDesc => " ORDER BY p.price DESC, p.id ASC",
        ProductSort::Name => " ORDER BY LOWER(p.name) ASC, p.id ASC",
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM kaaya.product p");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::new(SELECT_PRODUCT);
        push_filters(&mut qb, filter);
        qb.push(order_clause(filter.sort));
        qb.push(" LIMIT ")
            .push_bind(i64::from(page.limit()))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

        let rows = qb.build_query_as::<ProductRow>().fetch_all(self.pool).await?;
        let items = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            pagination: Pagination::new(page, u64::try_from(total).unwrap_or(0)),
        })
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{SELECT_PRODUCT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get a product by slug, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{SELECT_PRODUCT} WHERE p.slug = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Fetch several products at once. Missing ids are simply absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let sql = format!("{SELECT_PRODUCT} WHERE p.id = ANY($1) ORDER BY p.id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(raw)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Insert a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let sql = r"
            INSERT INTO kaaya.product
                (name, slug, description, price, compare_at_price, sku, stock_quantity,
                 category_id, brand, image_url, images, is_featured, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, name, slug, description, price, compare_at_price, sku,
                      stock_quantity, category_id, brand, image_url, images,
                      is_featured, is_active, created_at, updated_at
        ";
        let row = sqlx::query_as::<_, ProductRow>(sql)
            .bind(&new.name)
            .bind(new.slug.as_str())
            .bind(&new.description)
            .bind(new.price)
            .bind(new.compare_at_price)
            .bind(&new.sku)
            .bind(new.stock_quantity)
            .bind(new.category_id)
            .bind(&new.brand)
            .bind(&new.image_url)
            .bind(&new.images)
            .bind(new.is_featured)
            .bind(new.is_active)
            .fetch_one(self.pool)
            .await
            .map_err(conflict_on_unique(UNIQUE_MESSAGE))?;

        Product::try_from(row)
    }

    /// Persist every mutable field of `product`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row no longer exists.
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    pub async fn save(&self, product: &Product) -> Result<Product, RepositoryError> {
        let sql = r"
            UPDATE kaaya.product
            SET name = $2, slug = $3, description = $4, price = $5, compare_at_price = $6,
                sku = $7, stock_quantity = $8, category_id = $9, brand = $10, image_url = $11,
                images = $12, is_featured = $13, is_active = $14, updated_at = $15
            WHERE id = $1
            RETURNING id, name, slug, description, price, compare_at_price, sku,
                      stock_quantity, category_id, brand, image_url, images,
                      is_featured, is_active, created_at, updated_at
        ";
        let row = sqlx::query_as::<_, ProductRow>(sql)
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
            .bind(product.updated_at)
            .fetch_optional(self.pool)
            .await
            .map_err(conflict_on_unique(UNIQUE_MESSAGE))?
            .ok_or(RepositoryError::NotFound)?;

        Product::try_from(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("neem"), "%neem%");
        assert_eq!(like_pattern("100%_pure"), "%100\\%\\_pure%");
    }

    #[test]
    fn test_filters_bind_values() {
        let filter = ProductFilter {
            category_ids: Some(vec![CategoryId::new(1), CategoryId::new(2)]),
            search: Some("oil".to_string()),
            featured: Some(true),
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM kaaya.product p");
        push_filters(&mut qb, &filter);
        let sql = qb.sql();

        assert!(sql.contains("p.is_active"));
        assert!(sql.contains("p.category_id = ANY($1)"));
        assert!(sql.contains("p.is_featured = $2"));
        assert!(sql.contains("p.brand ILIKE $5"));
        assert!(!sql.contains("oil"));
    }
}
