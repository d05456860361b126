//! Categories and menu management.
//!
//! Category lists are cached for 60 seconds and the cache is dropped on
//! every category write. Reads that hit a database error are served from
//! the fallback catalog when it is enabled; those results are never cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use kaaya_core::{CategoryId, Slug};

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::models::category::{descendant_ids, parent_allowed};
use crate::models::{Category, CategoryChanges, CategoryNode, NewCategory, double_option, normalize_text};
use crate::state::AppState;
use crate::store::{FallbackCatalog, Store};

const CACHE_TTL: Duration = Duration::from_secs(60);

/// Cached category lists, keyed by `include_inactive`.
#[derive(Clone)]
pub struct CategoryCache {
    cache: Cache<bool, Arc<Vec<Category>>>,
}

impl CategoryCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(2)
            .time_to_live(CACHE_TTL)
            .build();
        Self { cache }
    }

    pub async fn get(&self, include_inactive: bool) -> Option<Arc<Vec<Category>>> {
        self.cache.get(&include_inactive).await
    }

    pub async fn insert(&self, include_inactive: bool, categories: Arc<Vec<Category>>) {
        self.cache.insert(include_inactive, categories).await;
    }

    /// Drop every cached list.
    pub async fn invalidate(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

impl Default for CategoryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A category reference from a path segment: numeric id or slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryRef {
    Id(CategoryId),
    Slug(String),
}

impl CategoryRef {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<CategoryId>()
            .map_or_else(|_| Self::Slug(raw.to_ascii_lowercase()), Self::Id)
    }
}

/// Request body for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub show_in_menu: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// One entry of a menu reorder request.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuPosition {
    pub id: CategoryId,
    pub sort_order: i32,
    /// Absent keeps the parent, `null` moves the category to the top level.
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<CategoryId>>,
}

/// One entry of a category sync request.
#[derive(Debug, Clone, Deserialize)]
pub struct CategorySyncItem {
    pub id: CategoryId,
    #[serde(flatten)]
    pub changes: CategoryChanges,
}

/// Result of a reorder or sync batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MenuUpdateReport {
    pub updated: usize,
    pub skipped: Vec<CategoryId>,
}

/// Category and menu operations.
pub struct CatalogService<'a> {
    store: &'a Store,
    cache: &'a CategoryCache,
    fallback: Option<&'a FallbackCatalog>,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            store: state.store(),
            cache: state.categories(),
            fallback: state.fallback(),
        }
    }

    /// All categories, from cache, store, or fallback in that order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store fails and no fallback is enabled.
    pub async fn categories(&self, include_inactive: bool) -> Result<Arc<Vec<Category>>> {
        if let Some(cached) = self.cache.get(include_inactive).await {
            return Ok(cached);
        }

        match self.store.list_categories(include_inactive).await {
            Ok(categories) => {
                let categories = Arc::new(categories);
                self.cache.insert(include_inactive, Arc::clone(&categories)).await;
                Ok(categories)
            }
            Err(e) if e.is_unavailable() && self.fallback.is_some() => {
                warn!(error = %e, "Category read failed, serving fallback catalog");
                let fallback = self.fallback.map(|f| f.categories.clone()).unwrap_or_default();
                Ok(Arc::new(
                    fallback
                        .into_iter()
                        .filter(|c| include_inactive || c.is_active)
                        .collect(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Categories as a forest.
    ///
    /// # Errors
    ///
    /// See [`Self::categories`].
    pub async fn tree(&self, include_inactive: bool) -> Result<Vec<CategoryNode>> {
        let categories = self.categories(include_inactive).await?;
        Ok(CategoryNode::build_tree(categories.as_ref().clone()))
    }

    /// Public navigation: active, menu-visible categories. Hiding a category
    /// hides everything below it.
    ///
    /// # Errors
    ///
    /// See [`Self::categories`].
    pub async fn menu(&self) -> Result<Vec<CategoryNode>> {
        let mut tree = self.tree(false).await?;
        prune_hidden(&mut tree);
        Ok(tree)
    }

    /// Look up one category by id or slug.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if missing, or inactive and `include_inactive` is off.
    pub async fn get(&self, reference: &CategoryRef, include_inactive: bool) -> Result<Category> {
        let found = match reference {
            CategoryRef::Id(id) => self.store.get_category(*id).await,
            CategoryRef::Slug(slug) => self.store.get_category_by_slug(slug).await,
        };

        let category = match found {
            Ok(category) => category,
            Err(e) if e.is_unavailable() && self.fallback.is_some() => {
                warn!(error = %e, "Category lookup failed, serving fallback catalog");
                self.fallback.and_then(|f| {
                    f.categories
                        .iter()
                        .find(|c| match reference {
                            CategoryRef::Id(id) => c.id == *id,
                            CategoryRef::Slug(slug) => c.slug.as_str() == slug,
                        })
                        .cloned()
                })
            }
            Err(e) => return Err(e.into()),
        };

        category
            .filter(|c| include_inactive || c.is_active)
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    /// Resolve a product-listing `category` parameter to the ids it covers
    /// (the category itself plus every descendant). `None` if no such category.
    ///
    /// # Errors
    ///
    /// See [`Self::categories`].
    pub async fn resolve_filter(&self, raw: &str) -> Result<Option<Vec<CategoryId>>> {
        let categories = self.categories(true).await?;
        let root = match CategoryRef::parse(raw) {
            CategoryRef::Id(id) => categories.iter().find(|c| c.id == id),
            CategoryRef::Slug(slug) => categories.iter().find(|c| c.slug.as_str() == slug),
        };
        Ok(root.map(|root| descendant_ids(&categories, root.id)))
    }

    /// Whether a category with this id exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store fails.
    pub async fn exists(&self, id: CategoryId) -> Result<bool> {
        Ok(self.store.get_category(id).await?.is_some())
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid input or an unknown parent,
    /// `AppError::Database(Conflict)` for a duplicate slug.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CategoryInput) -> Result<Category> {
        let name = required_name(&input.name)?;
        let slug = slug_for(input.slug.as_deref(), &name)?;

        if let Some(parent) = input.parent_id
            && self.store.get_category(parent).await?.is_none()
        {
            return Err(AppError::BadRequest("Parent category not found".to_string()));
        }

        let new = NewCategory {
            name,
            slug,
            description: normalize_text(input.description),
            image_url: normalize_text(input.image_url),
            parent_id: input.parent_id,
            sort_order: input.sort_order.unwrap_or(0),
            show_in_menu: input.show_in_menu.unwrap_or(true),
            is_active: input.is_active.unwrap_or(true),
        };
        let category = self.store.create_category(&new).await?;
        self.cache.invalidate().await;

        info!(category_id = %category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and `AppError::BadRequest`
    /// for invalid input, an unknown parent, or a parent that would create a cycle.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: CategoryId, changes: CategoryChanges) -> Result<Category> {
        let current = self
            .store
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        let all = self.store.list_categories(true).await?;
        let changes = normalize_changes(&all, &current, changes)?;
        let updated = current.with_changes(changes, Utc::now());
        let saved = self.store.save_category(&updated).await?;
        self.cache.invalidate().await;

        info!(category_id = %id, "Category updated");
        Ok(saved)
    }

    /// Hard-delete a category that has no products and no subcategories.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and `AppError::Conflict`
    /// when products or subcategories still reference it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<()> {
        if self.store.get_category(id).await?.is_none() {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        if self.store.count_products_in_category(id).await? > 0 {
            return Err(AppError::Conflict(
                "Cannot delete category with associated products".to_string(),
            ));
        }
        if self.store.count_child_categories(id).await? > 0 {
            return Err(AppError::Conflict(
                "Cannot delete category with subcategories".to_string(),
            ));
        }

        self.store.delete_category(id).await?;
        self.cache.invalidate().await;

        info!(category_id = %id, "Category deleted");
        Ok(())
    }

    /// Apply menu positions in input order. Unknown ids, and items whose new
    /// parent is unknown or would create a cycle, are skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store fails mid-batch; earlier
    /// items stay applied.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn reorder(&self, items: Vec<MenuPosition>) -> Result<MenuUpdateReport> {
        let mut all = self.store.list_categories(true).await?;
        let mut report = MenuUpdateReport::default();
        for item in items {
            if let Some(Some(parent)) = item.parent_id
                && !parent_allowed(&all, item.id, parent)
            {
                warn!(category_id = %item.id, parent_id = %parent, "Skipping invalid menu parent");
                report.skipped.push(item.id);
                continue;
            }
            if self
                .store
                .set_menu_position(item.id, item.sort_order, item.parent_id)
                .await?
            {
                if let Some(entry) = all.iter_mut().find(|c| c.id == item.id) {
                    entry.sort_order = item.sort_order;
                    if let Some(parent) = item.parent_id {
                        entry.parent_id = parent;
                    }
                }
                report.updated += 1;
            } else {
                report.skipped.push(item.id);
            }
        }
        self.cache.invalidate().await;

        info!(updated = report.updated, skipped = report.skipped.len(), "Menu reordered");
        Ok(report)
    }

    /// Show or hide one category in navigation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    pub async fn set_visibility(&self, id: CategoryId, show_in_menu: bool) -> Result<Category> {
        if !self.store.set_menu_visibility(id, show_in_menu).await? {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        self.cache.invalidate().await;

        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    /// Bulk-apply category edits from the menu editor, in input order.
    ///
    /// Each item goes through the same checks as a single update. Unknown
    /// ids and items whose edit is rejected (blank name, bad parent,
    /// duplicate slug) are skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store fails mid-batch.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn sync(&self, items: Vec<CategorySyncItem>) -> Result<MenuUpdateReport> {
        let mut all = self.store.list_categories(true).await?;
        let mut report = MenuUpdateReport::default();
        let now = Utc::now();

        for item in items {
            let Some(current) = all.iter().find(|c| c.id == item.id).cloned() else {
                report.skipped.push(item.id);
                continue;
            };
            let changes = match normalize_changes(&all, &current, item.changes) {
                Ok(changes) => changes,
                Err(e) => {
                    warn!(category_id = %item.id, error = %e, "Skipping category in sync");
                    report.skipped.push(item.id);
                    continue;
                }
            };

            let updated = current.with_changes(changes, now);
            match self.store.save_category(&updated).await {
                Ok(saved) => {
                    if let Some(entry) = all.iter_mut().find(|c| c.id == saved.id) {
                        *entry = saved;
                    }
                    report.updated += 1;
                }
                Err(RepositoryError::Conflict(reason)) => {
                    warn!(category_id = %item.id, %reason, "Skipping category in sync");
                    report.skipped.push(item.id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.cache.invalidate().await;

        info!(updated = report.updated, skipped = report.skipped.len(), "Categories synced");
        Ok(report)
    }
}

/// Trim and check a partial update against the current hierarchy.
fn normalize_changes(
    all: &[Category],
    current: &Category,
    mut changes: CategoryChanges,
) -> Result<CategoryChanges> {
    if let Some(name) = changes.name.take() {
        changes.name = Some(required_name(&name)?);
    }
    changes.description = changes.description.map(normalize_text);
    changes.image_url = changes.image_url.map(normalize_text);

    if let Some(Some(parent)) = changes.parent_id {
        if parent == current.id {
            return Err(AppError::BadRequest(
                "A category cannot be its own parent".to_string(),
            ));
        }
        if !all.iter().any(|c| c.id == parent) {
            return Err(AppError::BadRequest("Parent category not found".to_string()));
        }
        if !parent_allowed(all, current.id, parent) {
            return Err(AppError::BadRequest(
                "A category cannot be moved under its own subcategory".to_string(),
            ));
        }
    }
    Ok(changes)
}

/// Remove menu-hidden nodes together with their subtrees.
fn prune_hidden(nodes: &mut Vec<CategoryNode>) {
    nodes.retain(|n| n.category.show_in_menu);
    for node in nodes {
        prune_hidden(&mut node.children);
    }
}

fn required_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }
    Ok(name.to_string())
}

/// Validate an explicit slug, or derive one from the name.
pub(crate) fn slug_for(explicit: Option<&str>, name: &str) -> Result<Slug> {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Slug::parse(raw).map_err(|e| AppError::BadRequest(format!("Invalid slug: {e}"))),
        None => Slug::from_name(name)
            .map_err(|e| AppError::BadRequest(format!("Cannot derive slug from name: {e}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::models::category::tests::category;

    #[test]
    fn test_category_ref_parse() {
        assert_eq!(CategoryRef::parse("12"), CategoryRef::Id(CategoryId::new(12)));
        assert_eq!(
            CategoryRef::parse("Hair-Oils"),
            CategoryRef::Slug("hair-oils".to_string())
        );
    }

    #[test]
    fn test_prune_hidden_drops_subtree() {
        let mut hidden = category(1, None, 1, "Skin");
        hidden.show_in_menu = false;
        let mut tree = CategoryNode::build_tree(vec![
            hidden,
            category(2, Some(1), 1, "Serums"),
            category(3, None, 2, "Hair"),
        ]);
        prune_hidden(&mut tree);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].category.name, "Hair");
    }

    #[test]
    fn test_slug_for() {
        assert_eq!(slug_for(None, "Face Oils").unwrap().as_str(), "face-oils");
        assert_eq!(slug_for(Some("  "), "Face Oils").unwrap().as_str(), "face-oils");
        assert_eq!(slug_for(Some("oils-2"), "Face Oils").unwrap().as_str(), "oils-2");
        assert!(matches!(slug_for(Some("Bad Slug"), "x"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_menu_position_parent_semantics() {
        let keep: MenuPosition = serde_json::from_str(r#"{"id": 3, "sort_order": 1}"#).unwrap();
        assert_eq!(keep.parent_id, None);

        let root: MenuPosition =
            serde_json::from_str(r#"{"id": 3, "sort_order": 1, "parent_id": null}"#).unwrap();
        assert_eq!(root.parent_id, Some(None));
    }

    #[test]
    fn test_normalize_changes_checks_parent_and_trims() {
        let all = vec![
            category(1, None, 0, "Skin"),
            category(2, Some(1), 0, "Serums"),
            category(3, None, 0, "Hair"),
        ];
        let into_child: CategoryChanges = serde_json::from_str(r#"{"parent_id": 2}"#).unwrap();
        assert!(matches!(
            normalize_changes(&all, &all[0], into_child),
            Err(AppError::BadRequest(_))
        ));

        let unknown: CategoryChanges = serde_json::from_str(r#"{"parent_id": 42}"#).unwrap();
        assert!(matches!(
            normalize_changes(&all, &all[0], unknown),
            Err(AppError::BadRequest(_))
        ));

        let tidy: CategoryChanges =
            serde_json::from_str(r#"{"name": " Hair Oils ", "image_url": "  ", "parent_id": 1}"#)
                .unwrap();
        let tidy = normalize_changes(&all, &all[2], tidy).unwrap();
        assert_eq!(tidy.name.as_deref(), Some("Hair Oils"));
        assert_eq!(tidy.image_url, Some(None));
        assert_eq!(tidy.parent_id, Some(Some(CategoryId::new(1))));
    }

    #[test]
    fn test_sync_item_flattens_changes() {
        let item: CategorySyncItem =
            serde_json::from_str(r#"{"id": 4, "name": "Hair", "show_in_menu": false}"#).unwrap();
        assert_eq!(item.id, CategoryId::new(4));
        assert_eq!(item.changes.name.as_deref(), Some("Hair"));
        assert_eq!(item.changes.show_in_menu, Some(false));
    }
}
