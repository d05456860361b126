//! Static fallback dataset.
//!
//! The built-in catalog is compiled into the binary from
//! `data/catalog.yaml`. It seeds the in-memory store in demo mode, backs
//! catalog reads when the database is unreachable, and is what
//! `kaaya-cli seed` inserts by default.

use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use kaaya_core::{CategoryId, Email, ProductId, Slug, UserId, UserRole};

use crate::models::{Category, Product, StoreSettings, User};

const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.yaml");

/// Errors loading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("invalid dataset YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid dataset: {0}")]
    Invalid(String),
}

/// Timestamp stamped on every dataset record that does not carry one.
#[must_use]
pub fn dataset_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

const fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub slug: Option<Slug>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i32>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "yes")]
    pub show_in_menu: bool,
    #[serde(default = "yes")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub slug: Option<Slug>,
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
    pub category_id: Option<i32>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "yes")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedUser {
    pub id: i32,
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

/// A catalog dataset as written in YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    #[serde(default)]
    pub settings: StoreSettings,
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

impl Dataset {
    /// The catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded YAML is malformed.
    pub fn builtin() -> Result<Self, FallbackError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Parse and validate a dataset.
    ///
    /// # Errors
    ///
    /// Returns `FallbackError::Parse` for malformed YAML and
    /// `FallbackError::Invalid` for duplicate ids or dangling references.
    pub fn from_yaml(yaml: &str) -> Result<Self, FallbackError> {
        let dataset: Self = serde_yaml::from_str(yaml)?;
        dataset.validate()?;
        Ok(dataset)
    }

    fn validate(&self) -> Result<(), FallbackError> {
        let category_ids = unique_ids("category", self.categories.iter().map(|c| c.id))?;
        unique_ids("product", self.products.iter().map(|p| p.id))?;
        unique_ids("user", self.users.iter().map(|u| u.id))?;

        for category in &self.categories {
            if let Some(parent) = category.parent_id
                && (parent == category.id || !category_ids.contains(&parent))
            {
                return Err(FallbackError::Invalid(format!(
                    "category {} has invalid parent_id {parent}",
                    category.id
                )));
            }
        }
        for product in &self.products {
            if let Some(category) = product.category_id
                && !category_ids.contains(&category)
            {
                return Err(FallbackError::Invalid(format!(
                    "product {} references unknown category {category}",
                    product.id
                )));
            }
            if product.price.is_sign_negative() {
                return Err(FallbackError::Invalid(format!(
                    "product {} has a negative price",
                    product.id
                )));
            }
        }

        let mut slugs = HashSet::new();
        for category in self.categories()? {
            if !slugs.insert(category.slug.clone()) {
                return Err(FallbackError::Invalid(format!(
                    "duplicate category slug '{}'",
                    category.slug
                )));
            }
        }
        slugs.clear();
        for product in self.products()? {
            if !slugs.insert(product.slug.clone()) {
                return Err(FallbackError::Invalid(format!(
                    "duplicate product slug '{}'",
                    product.slug
                )));
            }
        }
        Ok(())
    }

    /// Materialize categories, with `product_count` filled in.
    ///
    /// # Errors
    ///
    /// Returns `FallbackError::Invalid` if a name cannot produce a slug.
    pub fn categories(&self) -> Result<Vec<Category>, FallbackError> {
        let epoch = dataset_epoch();
        self.categories
            .iter()
            .map(|seed| {
                let slug = resolve_slug(seed.slug.as_ref(), &seed.name)?;
                let product_count = self
                    .products
                    .iter()
                    .filter(|p| p.category_id == Some(seed.id))
                    .count();
                Ok(Category {
                    id: CategoryId::new(seed.id),
                    name: seed.name.clone(),
                    slug,
                    description: seed.description.clone(),
                    image_url: seed.image_url.clone(),
                    parent_id: seed.parent_id.map(CategoryId::new),
                    sort_order: seed.sort_order,
                    show_in_menu: seed.show_in_menu,
                    is_active: seed.is_active,
                    product_count: i64::try_from(product_count).unwrap_or(i64::MAX),
                    created_at: epoch,
                    updated_at: epoch,
                })
            })
            .collect()
    }

    /// Materialize products. Later entries get later `created_at` so the
    /// "newest" sort is stable and meaningful.
    ///
    /// # Errors
    ///
    /// Returns `FallbackError::Invalid` if a name cannot produce a slug.
    pub fn products(&self) -> Result<Vec<Product>, FallbackError> {
        let epoch = dataset_epoch();
        self.products
            .iter()
            .map(|seed| {
                let created_at = epoch + Duration::hours(i64::from(seed.id));
                Ok(Product {
                    id: ProductId::new(seed.id),
                    name: seed.name.clone(),
                    slug: resolve_slug(seed.slug.as_ref(), &seed.name)?,
                    description: seed.description.clone(),
                    price: seed.price,
                    compare_at_price: seed.compare_at_price,
                    sku: seed.sku.clone(),
                    stock_quantity: seed.stock_quantity,
                    category_id: seed.category_id.map(CategoryId::new),
                    brand: seed.brand.clone(),
                    image_url: seed.image_url.clone(),
                    images: seed.images.clone(),
                    is_featured: seed.is_featured,
                    is_active: seed.is_active,
                    created_at,
                    updated_at: created_at,
                })
            })
            .collect()
    }

    /// Materialize users.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        let epoch = dataset_epoch();
        self.users
            .iter()
            .map(|seed| User {
                id: UserId::new(seed.id),
                name: seed.name.clone(),
                email: seed.email.clone(),
                phone: seed.phone.clone(),
                role: seed.role,
                is_active: true,
                created_at: epoch,
                updated_at: epoch,
            })
            .collect()
    }
}

fn resolve_slug(explicit: Option<&Slug>, name: &str) -> Result<Slug, FallbackError> {
    match explicit {
        Some(slug) => Ok(slug.clone()),
        None => Slug::from_name(name)
            .map_err(|e| FallbackError::Invalid(format!("cannot derive slug from '{name}': {e}"))),
    }
}

fn unique_ids(kind: &str, ids: impl Iterator<Item = i32>) -> Result<HashSet<i32>, FallbackError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id <= 0 {
            return Err(FallbackError::Invalid(format!("{kind} id must be positive, got {id}")));
        }
        if !seen.insert(id) {
            return Err(FallbackError::Invalid(format!("duplicate {kind} id {id}")));
        }
    }
    Ok(seen)
}

/// Read-only snapshot of the built-in catalog used when the database
/// cannot serve a catalog read.
#[derive(Debug, Clone)]
pub struct FallbackCatalog {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
    pub settings: StoreSettings,
}

impl FallbackCatalog {
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be materialized.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self, FallbackError> {
        Ok(Self {
            categories: dataset.categories()?,
            products: dataset.products()?,
            settings: dataset.settings.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let dataset = Dataset::builtin().unwrap();
        let categories = dataset.categories().unwrap();
        let products = dataset.products().unwrap();

        assert!(!categories.is_empty());
        assert!(!products.is_empty());
        assert!(dataset.users().iter().any(|u| u.role.is_admin()));
        assert_eq!(dataset.settings.store_name, "KaayaLife");
    }

    #[test]
    fn test_slugs_derived_from_names() {
        let dataset = Dataset::builtin().unwrap();
        let categories = dataset.categories().unwrap();
        let skin = categories.iter().find(|c| c.id == CategoryId::new(1)).unwrap();
        assert_eq!(skin.slug.as_str(), "skin-care");
        assert_eq!(skin.product_count, 0);

        let serums = categories.iter().find(|c| c.id == CategoryId::new(6)).unwrap();
        assert_eq!(serums.slug.as_str(), "serums-face-oils");
        assert_eq!(serums.product_count, 2);
    }

    #[test]
    fn test_rejects_dangling_parent() {
        let yaml = "categories:\n  - id: 1\n    name: Skin\n    parent_id: 9\n";
        let err = Dataset::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("invalid parent_id 9"));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let yaml = "products:\n  - id: 1\n    name: A\n    price: \"1.00\"\n  - id: 1\n    name: B\n    price: \"2.00\"\n";
        let err = Dataset::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate product id 1"));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let yaml = "categories:\n  - id: 1\n    name: Skin\n    colour: red\n";
        assert!(matches!(Dataset::from_yaml(yaml), Err(FallbackError::Parse(_))));
    }
}
