//! Category domain types and the navigation tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kaaya_core::{CategoryId, Slug};

use super::double_option;

/// A catalog category. Categories nest through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    /// Position among siblings in the site menu.
    pub sort_order: i32,
    /// Whether the category appears in site navigation.
    pub show_in_menu: bool,
    pub is_active: bool,
    /// Number of products assigned to this category (active or not).
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Apply a partial update. Returns a new value; `updated_at` is bumped.
    #[must_use]
    pub fn with_changes(&self, changes: CategoryChanges, now: DateTime<Utc>) -> Self {
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
        if let Some(image_url) = changes.image_url {
            next.image_url = image_url;
        }
        if let Some(parent_id) = changes.parent_id {
            next.parent_id = parent_id;
        }
        if let Some(sort_order) = changes.sort_order {
            next.sort_order = sort_order;
        }
        if let Some(show_in_menu) = changes.show_in_menu {
            next.show_in_menu = show_in_menu;
        }
        if let Some(is_active) = changes.is_active {
            next.is_active = is_active;
        }
        next.updated_at = now;
        next
    }
}

/// Validated input for creating a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
    pub show_in_menu: bool,
    pub is_active: bool,
}

/// Partial category update. Nullable fields use `Option<Option<_>>` so that
/// an explicit `null` clears the value while an absent field leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub slug: Option<Slug>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<CategoryId>>,
    pub sort_order: Option<i32>,
    pub show_in_menu: Option<bool>,
    pub is_active: Option<bool>,
}

/// A category with its nested children, for menus and tree listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    /// Build a forest from a flat list.
    ///
    /// Siblings are ordered by `(sort_order, name)`. A category whose parent
    /// is missing from `categories` is promoted to a root so that a filtered
    /// list (e.g. only menu-visible categories) never loses entries.
    #[must_use]
    pub fn build_tree(categories: Vec<Category>) -> Vec<Self> {
        use std::collections::{HashMap, HashSet};

        let present: HashSet<CategoryId> = categories.iter().map(|c| c.id).collect();
        let mut by_parent: HashMap<Option<CategoryId>, Vec<Category>> = HashMap::new();
        for category in categories {
            let parent = category
                .parent_id
                .filter(|p| present.contains(p) && *p != category.id);
            by_parent.entry(parent).or_default().push(category);
        }

        let mut visited = HashSet::new();
        Self::attach(None, &mut by_parent, &mut visited)
    }

    fn attach(
        parent: Option<CategoryId>,
        by_parent: &mut std::collections::HashMap<Option<CategoryId>, Vec<Category>>,
        visited: &mut std::collections::HashSet<CategoryId>,
    ) -> Vec<Self> {
        let mut siblings = by_parent.remove(&parent).unwrap_or_default();
        siblings.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));

        let mut nodes = Vec::with_capacity(siblings.len());
        for category in siblings {
            if !visited.insert(category.id) {
                continue;
            }
            let children = Self::attach(Some(category.id), by_parent, visited);
            nodes.push(Self { category, children });
        }
        nodes
    }

    /// Depth-first walk yielding every category in the tree.
    pub fn flatten(nodes: &[Self]) -> Vec<&Category> {
        let mut out = Vec::new();
        let mut stack: Vec<&Self> = nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(&node.category);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// Ids of `root` and every category below it.
#[must_use]
pub fn descendant_ids(categories: &[Category], root: CategoryId) -> Vec<CategoryId> {
    let mut ids = vec![root];
    let mut cursor = 0;
    while let Some(&current) = ids.get(cursor) {
        for child in categories.iter().filter(|c| c.parent_id == Some(current)) {
            if !ids.contains(&child.id) {
                ids.push(child.id);
            }
        }
        cursor += 1;
    }
    ids
}

/// Whether `id` may move under `parent`: the parent must exist and must not
/// be `id` itself or one of its descendants.
#[must_use]
pub fn parent_allowed(categories: &[Category], id: CategoryId, parent: CategoryId) -> bool {
    categories.iter().any(|c| c.id == parent) && !descendant_ids(categories, id).contains(&parent)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn category(id: i32, parent: Option<i32>, sort_order: i32, name: &str) -> Category {
        Category {
            id: CategoryId::new(id),
            name: name.to_string(),
            slug: Slug::from_name(name).unwrap(),
            description: None,
            image_url: None,
            parent_id: parent.map(CategoryId::new),
            sort_order,
            show_in_menu: true,
            is_active: true,
            product_count: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_build_tree_orders_siblings() {
        let tree = CategoryNode::build_tree(vec![
            category(1, None, 2, "Hair"),
            category(2, None, 1, "Skin"),
            category(3, Some(2), 2, "Serums"),
            category(4, Some(2), 1, "Cleansers"),
        ]);

        let names: Vec<_> = tree.iter().map(|n| n.category.name.as_str()).collect();
        assert_eq!(names, ["Skin", "Hair"]);
        let skin_children: Vec<_> = tree[0].children.iter().map(|n| n.category.name.as_str()).collect();
        assert_eq!(skin_children, ["Cleansers", "Serums"]);
    }

    #[test]
    fn test_build_tree_promotes_orphans() {
        let tree = CategoryNode::build_tree(vec![category(5, Some(99), 0, "Gift Sets")]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].category.id, CategoryId::new(5));
    }

    #[test]
    fn test_build_tree_survives_cycles() {
        // 1 -> 2 -> 1: neither is reachable from a root, so both are dropped
        // rather than looping forever.
        let tree = CategoryNode::build_tree(vec![
            category(1, Some(2), 0, "A"),
            category(2, Some(1), 0, "B"),
            category(3, None, 0, "C"),
        ]);
        assert_eq!(CategoryNode::flatten(&tree).len(), 1);
    }

    #[test]
    fn test_flatten_is_depth_first() {
        let tree = CategoryNode::build_tree(vec![
            category(1, None, 1, "Skin"),
            category(2, Some(1), 1, "Serums"),
            category(3, None, 2, "Hair"),
        ]);
        let ids: Vec<_> = CategoryNode::flatten(&tree).iter().map(|c| c.id.as_i32()).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn test_descendant_ids() {
        let all = vec![
            category(1, None, 0, "Skin"),
            category(2, Some(1), 0, "Serums"),
            category(3, Some(2), 0, "Vitamin C"),
            category(4, None, 0, "Hair"),
        ];
        let ids = descendant_ids(&all, CategoryId::new(1));
        assert_eq!(ids, [CategoryId::new(1), CategoryId::new(2), CategoryId::new(3)]);
    }

    #[test]
    fn test_parent_allowed_rejects_cycles_and_unknown_parents() {
        let all = vec![
            category(1, None, 0, "Skin"),
            category(2, Some(1), 0, "Serums"),
            category(3, Some(2), 0, "Vitamin C"),
            category(4, None, 0, "Hair"),
        ];
        assert!(parent_allowed(&all, CategoryId::new(2), CategoryId::new(4)));
        assert!(!parent_allowed(&all, CategoryId::new(1), CategoryId::new(3)));
        assert!(!parent_allowed(&all, CategoryId::new(1), CategoryId::new(1)));
        assert!(!parent_allowed(&all, CategoryId::new(4), CategoryId::new(99)));
    }

    #[test]
    fn test_build_tree_handles_deep_chains() {
        let tree = CategoryNode::build_tree(vec![
            category(1, None, 0, "Skin"),
            category(2, Some(1), 0, "Serums"),
            category(3, Some(2), 0, "Vitamin C"),
        ]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children[0].children[0].category.id, CategoryId::new(3));
    }

    #[test]
    fn test_with_changes_clears_nullable_fields() {
        let mut base = category(1, Some(7), 0, "Skin");
        base.description = Some("Daily care".to_string());
        let changes: CategoryChanges =
            serde_json::from_str(r#"{"description": null, "sort_order": 4}"#).unwrap();

        let next = base.with_changes(changes, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(next.description, None);
        assert_eq!(next.parent_id, Some(CategoryId::new(7)));
        assert_eq!(next.sort_order, 4);
    }
}
