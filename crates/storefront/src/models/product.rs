//! Product domain types and listing filters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kaaya_core::{CategoryId, ProductId, Slug};

use super::double_option;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub price: Decimal,
    /// Original price shown struck through when the product is on sale.
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub stock_quantity: i32,
    pub category_id: Option<CategoryId>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Apply a partial update. Returns a new value; `updated_at` is bumped.
    #[must_use]
    pub fn with_changes(&self, changes: ProductChanges, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(name) = changes.name {
            next.name = name;
        }
        if let Some(slug) = changes.slug {
            next.slug = slug;
        }
        if let Some(description) = changes.description {
            next.description = description;
        }
        if let Some(price) = changes.price {
            next.price = price;
        }
        if let Some(compare_at_price) = changes.compare_at_price {
            next.compare_at_price = compare_at_price;
        }
        if let Some(sku) = changes.sku {
            next.sku = sku;
        }
        if let Some(stock_quantity) = changes.stock_quantity {
            next.stock_quantity = stock_quantity;
        }
        if let Some(category_id) = changes.category_id {
            next.category_id = category_id;
        }
        if let Some(brand) = changes.brand {
            next.brand = brand;
        }
        if let Some(image_url) = changes.image_url {
            next.image_url = image_url;
        }
        if let Some(images) = changes.images {
            next.images = images;
        }
        if let Some(is_featured) = changes.is_featured {
            next.is_featured = is_featured;
        }
        if let Some(is_active) = changes.is_active {
            next.is_active = is_active;
        }
        next.updated_at = now;
        next
    }
}

/// Validated input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub stock_quantity: i32,
    pub category_id: Option<CategoryId>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
}

/// Partial product update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub slug: Option<Slug>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub compare_at_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sku: Option<Option<String>>,
    pub stock_quantity: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<CategoryId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub brand: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    pub images: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl std::str::FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "name" => Ok(Self::Name),
            other => Err(format!(
                "invalid sort '{other}' (expected newest, price_asc, price_desc, or name)"
            )),
        }
    }
}

/// Resolved product listing filter.
///
/// `category_ids` is already expanded to include subcategories.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_ids: Option<Vec<CategoryId>>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub include_inactive: bool,
    pub sort: ProductSort,
}

impl ProductFilter {
    /// In-memory equivalent of the SQL `WHERE` clause.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_inactive && !product.is_active {
            return false;
        }
        if let Some(ids) = &self.category_ids
            && !product.category_id.is_some_and(|id| ids.contains(&id))
        {
            return false;
        }
        if let Some(featured) = self.featured
            && product.is_featured != featured
        {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price < min)
            || self.max_price.is_some_and(|max| product.price > max)
        {
            return false;
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&term));
            if !(hit(Some(product.name.as_str()))
                || hit(product.description.as_deref())
                || hit(product.brand.as_deref()))
            {
                return false;
            }
        }
        true
    }

    /// In-memory equivalent of the SQL `ORDER BY` clause.
    pub fn sort(&self, products: &mut [Product]) {
        match self.sort {
            ProductSort::Newest => {
                products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            }
            ProductSort::PriceAsc => {
                products.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id)));
            }
            ProductSort::PriceDesc => {
                products.sort_by(|a, b| b.price.cmp(&a.price).then(a.id.cmp(&b.id)));
            }
            ProductSort::Name => {
                products.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            }
        }
    }
}
