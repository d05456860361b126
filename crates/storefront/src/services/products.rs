//! Product listing, detail, and admin edits.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use kaaya_core::{CategoryId, Page, PageRequest, ProductId, round_money};

use crate::error::{AppError, Result};
use crate::models::{NewProduct, Product, ProductChanges, ProductFilter, ProductSort, normalize_text};
use crate::services::catalog::{CatalogService, slug_for};
use crate::state::AppState;
use crate::store::{FallbackCatalog, Store};

/// Query string for `GET /api/products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Category id or slug; subcategories are included.
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: Option<String>,
}

/// Request body for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

/// Bulk product action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Activate,
    Deactivate,
    Feature,
    Unfeature,
    SetCategory,
    Delete,
}

/// Request body for `POST /api/admin/products/bulk`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub ids: Vec<ProductId>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub action: BulkAction,
    pub processed: usize,
    pub skipped: Vec<ProductId>,
}

impl BulkAction {
    fn changes(self, category_id: Option<CategoryId>) -> ProductChanges {
        let mut changes = ProductChanges::default();
        match self {
            Self::Activate => changes.is_active = Some(true),
            Self::Deactivate | Self::Delete => changes.is_active = Some(false),
            Self::Feature => changes.is_featured = Some(true),
            Self::Unfeature => changes.is_featured = Some(false),
            Self::SetCategory => changes.category_id = Some(category_id),
        }
        changes
    }
}

/// A product reference from a path segment: numeric id or slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef {
    Id(ProductId),
    Slug(String),
}

impl ProductRef {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<ProductId>()
            .map_or_else(|_| Self::Slug(raw.to_ascii_lowercase()), Self::Id)
    }
}

pub struct ProductService<'a> {
    state: &'a AppState,
    store: &'a Store,
    fallback: Option<&'a FallbackCatalog>,
}

impl<'a> ProductService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            store: state.store(),
            fallback: state.fallback(),
        }
    }

    /// Turn query parameters into a resolved filter. `None` means the
    /// requested category does not exist, so the listing is empty.
    async fn filter_for(&self, query: &ProductQuery, is_admin: bool) -> Result<Option<ProductFilter>> {
        let sort = match query.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw.parse::<ProductSort>().map_err(AppError::BadRequest)?,
            None => ProductSort::default(),
        };
        if let (Some(min), Some(max)) = (query.min_price, query.max_price)
            && min > max
        {
            return Err(AppError::BadRequest(
                "min_price cannot be greater than max_price".to_string(),
            ));
        }

        let category_ids = match query.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => match CatalogService::new(self.state).resolve_filter(raw).await? {
                Some(ids) => Some(ids),
                None => return Ok(None),
            },
            None => None,
        };

        Ok(Some(ProductFilter {
            category_ids,
            search: normalize_text(query.search.clone()),
            featured: query.featured,
            min_price: query.min_price,
            max_price: query.max_price,
            include_inactive: is_admin,
            sort,
        }))
    }

    /// One page of products. Inactive products are listed only for admins.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid sort or price range and
    /// `AppError::Database` if the store fails with no fallback enabled.
    #[instrument(skip(self, query))]
    pub async fn list(&self, query: &ProductQuery, is_admin: bool) -> Result<Page<Product>> {
        let page = PageRequest::new(query.page, query.limit);
        let Some(filter) = self.filter_for(query, is_admin).await? else {
            return Ok(Page::from_vec(Vec::new(), page));
        };

        match self.store.list_products(&filter, page).await {
            Ok(found) => Ok(found),
            Err(e) if e.is_unavailable() && self.fallback.is_some() => {
                warn!(error = %e, "Product listing failed, serving fallback catalog");
                let mut products: Vec<Product> = self
                    .fallback
                    .map(|f| f.products.iter().filter(|p| filter.matches(p)).cloned().collect())
                    .unwrap_or_default();
                filter.sort(&mut products);
                Ok(Page::from_vec(products, page))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up one product by id or slug.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if missing, or inactive for a non-admin.
    pub async fn get(&self, reference: &ProductRef, is_admin: bool) -> Result<Product> {
        let found = match reference {
            ProductRef::Id(id) => self.store.get_product(*id).await,
            ProductRef::Slug(slug) => self.store.get_product_by_slug(slug).await,
        };

        let product = match found {
            Ok(product) => product,
            Err(e) if e.is_unavailable() && self.fallback.is_some() => {
                warn!(error = %e, "Product lookup failed, serving fallback catalog");
                self.fallback.and_then(|f| {
                    f.products
                        .iter()
                        .find(|p| match reference {
                            ProductRef::Id(id) => p.id == *id,
                            ProductRef::Slug(slug) => p.slug.as_str() == slug,
                        })
                        .cloned()
                })
            }
            Err(e) => return Err(e.into()),
        };

        product
            .filter(|p| is_admin || p.is_active)
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    async fn check_category(&self, category_id: Option<CategoryId>) -> Result<()> {
        if let Some(id) = category_id
            && !CatalogService::new(self.state).exists(id).await?
        {
            return Err(AppError::BadRequest("Category not found".to_string()));
        }
        Ok(())
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid input and
    /// `AppError::Database(Conflict)` for a duplicate slug or SKU.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: ProductInput) -> Result<Product> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Product name is required".to_string()));
        }
        let slug = slug_for(input.slug.as_deref(), &name)?;
        let price = checked_price("price", input.price)?;
        let compare_at_price = input
            .compare_at_price
            .map(|p| checked_price("compare_at_price", p))
            .transpose()?;
        if input.stock_quantity < 0 {
            return Err(AppError::BadRequest("stock_quantity cannot be negative".to_string()));
        }
        self.check_category(input.category_id).await?;

        let new = NewProduct {
            name,
            slug,
            description: normalize_text(input.description),
            price,
            compare_at_price,
            sku: normalize_text(input.sku),
            stock_quantity: input.stock_quantity,
            category_id: input.category_id,
            brand: normalize_text(input.brand),
            image_url: normalize_text(input.image_url),
            images: input.images,
            is_featured: input.is_featured,
            is_active: input.is_active,
        };
        let product = self.store.create_product(&new).await?;
        self.state.categories().invalidate().await;

        info!(product_id = %product.id, slug = %product.slug, "Product created");
        Ok(product)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and `AppError::BadRequest`
    /// for invalid input.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: ProductId, mut changes: ProductChanges) -> Result<Product> {
        let current = self
            .store
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        if let Some(name) = changes.name.take() {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::BadRequest("Product name cannot be empty".to_string()));
            }
            changes.name = Some(name);
        }
        if let Some(price) = changes.price {
            changes.price = Some(checked_price("price", price)?);
        }
        if let Some(Some(price)) = changes.compare_at_price {
            changes.compare_at_price = Some(Some(checked_price("compare_at_price", price)?));
        }
        if changes.stock_quantity.is_some_and(|q| q < 0) {
            return Err(AppError::BadRequest("stock_quantity cannot be negative".to_string()));
        }
        if let Some(category_id) = changes.category_id {
            self.check_category(category_id).await?;
        }
        changes.description = changes.description.map(normalize_text);
        changes.sku = changes.sku.map(normalize_text);
        changes.brand = changes.brand.map(normalize_text);
        changes.image_url = changes.image_url.map(normalize_text);

        let saved = self
            .store
            .save_product(&current.with_changes(changes, Utc::now()))
            .await?;
        self.state.categories().invalidate().await;

        info!(product_id = %id, "Product updated");
        Ok(saved)
    }

    /// Soft delete: the product is deactivated, never removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    pub async fn delete(&self, id: ProductId) -> Result<()> {
        let changes = ProductChanges {
            is_active: Some(false),
            ..ProductChanges::default()
        };
        self.update(id, changes).await?;
        info!(product_id = %id, "Product deactivated");
        Ok(())
    }

    /// Apply one action to many products, in input order. Unknown ids are
    /// skipped and reported.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an empty id list or a missing or
    /// unknown `category_id` on `set_category`.
    #[instrument(skip(self, request), fields(action = ?request.action, count = request.ids.len()))]
    pub async fn bulk(&self, request: BulkRequest) -> Result<BulkReport> {
        if request.ids.is_empty() {
            return Err(AppError::BadRequest("ids must not be empty".to_string()));
        }
        if request.action == BulkAction::SetCategory {
            if request.category_id.is_none() {
                return Err(AppError::BadRequest(
                    "category_id is required for set_category".to_string(),
                ));
            }
            self.check_category(request.category_id).await?;
        }

        let now = Utc::now();
        let mut report = BulkReport {
            action: request.action,
            processed: 0,
            skipped: Vec::new(),
        };
        for id in request.ids {
            let Some(product) = self.store.get_product(id).await? else {
                report.skipped.push(id);
                continue;
            };
            let updated = product.with_changes(request.action.changes(request.category_id), now);
            self.store.save_product(&updated).await?;
            report.processed += 1;
        }
        self.state.categories().invalidate().await;

        info!(processed = report.processed, skipped = report.skipped.len(), "Bulk product update");
        Ok(report)
    }
}

/// Prices are stored as `NUMERIC(12,2)`.
const PRICE_LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

fn checked_price(field: &str, price: Decimal) -> Result<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(AppError::BadRequest(format!("{field} cannot be negative")));
    }
    let price = round_money(price);
    if price >= PRICE_LIMIT {
        return Err(AppError::BadRequest(format!(
            "{field} must be less than {PRICE_LIMIT}"
        )));
    }
    Ok(price)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::services::test_support::demo_state;

    fn query(category: Option<&str>) -> ProductQuery {
        ProductQuery {
            category: category.map(String::from),
            limit: Some(100),
            ..ProductQuery::default()
        }
    }

    #[test]
    fn test_bulk_action_changes() {
        let changes = BulkAction::Delete.changes(None);
        assert_eq!(changes.is_active, Some(false));

        let changes = BulkAction::SetCategory.changes(Some(CategoryId::new(3)));
        assert_eq!(changes.category_id, Some(Some(CategoryId::new(3))));
    }

    #[test]
    fn test_checked_price() {
        assert_eq!(checked_price("price", Decimal::new(12_345, 3)).unwrap(), Decimal::new(1235, 2));
        assert!(checked_price("price", Decimal::new(-1, 0)).is_err());
        assert_eq!(PRICE_LIMIT, Decimal::new(10_000_000_000, 0));
        assert!(checked_price("price", Decimal::new(999_999_999_999, 2)).is_ok());
        assert!(matches!(
            checked_price("price", Decimal::new(10_000_000_000, 0)),
            Err(AppError::BadRequest(_))
        ));
        assert!(checked_price("price", Decimal::new(9_999_999_999_995, 3)).is_err());
    }

    #[tokio::test]
    async fn test_list_hides_inactive_for_customers() {
        let state = demo_state();
        let service = ProductService::new(&state);

        let public = service.list(&query(None), false).await.unwrap();
        let admin = service.list(&query(None), true).await.unwrap();

        assert_eq!(public.pagination.total, 13);
        assert_eq!(admin.pagination.total, 14);
    }

    #[tokio::test]
    async fn test_category_filter_includes_subcategories() {
        let state = demo_state();
        let service = ProductService::new(&state);

        let skin = service.list(&query(Some("skin-care")), false).await.unwrap();
        assert_eq!(skin.pagination.total, 5);

        let by_id = service.list(&query(Some("8")), false).await.unwrap();
        assert_eq!(by_id.pagination.total, 2);

        let unknown = service.list(&query(Some("no-such-thing")), false).await.unwrap();
        assert_eq!(unknown.pagination.total, 0);
    }

    #[tokio::test]
    async fn test_invalid_sort_is_bad_request() {
        let state = demo_state();
        let q = ProductQuery {
            sort: Some("cheapest".to_string()),
            ..ProductQuery::default()
        };
        let err = ProductService::new(&state).list(&q, false).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_inactive_product_hidden_from_detail() {
        let state = demo_state();
        let service = ProductService::new(&state);
        let slug = ProductRef::parse("sandalwood-soap");

        assert!(matches!(service.get(&slug, false).await, Err(AppError::NotFound(_))));
        assert!(service.get(&slug, true).await.unwrap().id == ProductId::new(14));
    }

    #[tokio::test]
    async fn test_create_derives_slug_and_checks_category() {
        let state = demo_state();
        let service = ProductService::new(&state);
        let input = ProductInput {
            name: "Brahmi Hair Tonic".to_string(),
            slug: None,
            description: None,
            price: Decimal::new(549, 0),
            compare_at_price: None,
            sku: Some("KL-HOL-003".to_string()),
            stock_quantity: 10,
            category_id: Some(CategoryId::new(8)),
            brand: None,
            image_url: None,
            images: Vec::new(),
            is_featured: false,
            is_active: true,
        };

        let product = service.create(input.clone()).await.unwrap();
        assert_eq!(product.slug.as_str(), "brahmi-hair-tonic");

        let bad = ProductInput {
            category_id: Some(CategoryId::new(999)),
            slug: Some("other".to_string()),
            sku: None,
            ..input
        };
        assert!(matches!(service.create(bad).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_delete_is_soft() {
        let state = demo_state();
        let service = ProductService::new(&state);

        service.delete(ProductId::new(2)).await.unwrap();
        let product = service.get(&ProductRef::Id(ProductId::new(2)), true).await.unwrap();
        assert!(!product.is_active);
    }

    #[tokio::test]
    async fn test_bulk_skips_unknown_ids() {
        let state = demo_state();
        let service = ProductService::new(&state);
        let request = BulkRequest {
            action: BulkAction::Feature,
            ids: vec![ProductId::new(2), ProductId::new(404), ProductId::new(5)],
            category_id: None,
        };

        let report = service.bulk(request).await.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, vec![ProductId::new(404)]);

        let product = service.get(&ProductRef::Id(ProductId::new(5)), false).await.unwrap();
        assert!(product.is_featured);
    }

    #[tokio::test]
    async fn test_bulk_set_category_requires_category() {
        let state = demo_state();
        let request = BulkRequest {
            action: BulkAction::SetCategory,
            ids: vec![ProductId::new(1)],
            category_id: None,
        };
        let err = ProductService::new(&state).bulk(request).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
