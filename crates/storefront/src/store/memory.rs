//! In-memory store for demo mode.
//!
//! Seeded from the fallback [`Dataset`] and fully writable, so every route
//! works without a database. Each operation takes the lock exactly once;
//! multi-row writes (order placement) are therefore atomic.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use kaaya_core::{
    CategoryId, Email, OrderId, OrderStatus, Page, PageRequest, PaymentStatus, ProductId, UserId,
};

use super::fallback::{Dataset, FallbackError};
use crate::db::{DUPLICATE_ORDER_NUMBER, RepositoryError};
use crate::models::{
    CartLine, Category, NewCategory, NewOrder, NewProduct, NewUser, Order, OrderFilter, OrderItem,
    Product, ProductFilter, User, WishlistEntry,
};

#[derive(Debug, Default)]
struct MemoryData {
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    users: BTreeMap<UserId, User>,
    carts: HashMap<UserId, Vec<CartLine>>,
    wishlists: HashMap<UserId, Vec<WishlistEntry>>,
    settings: BTreeMap<String, JsonValue>,
}

impl MemoryData {
    fn product_count(&self, id: CategoryId) -> i64 {
        let count = self
            .products
            .values()
            .filter(|p| p.category_id == Some(id))
            .count();
        i64::try_from(count).unwrap_or(i64::MAX)
    }

    fn with_count(&self, category: &Category) -> Category {
        Category {
            product_count: self.product_count(category.id),
            ..category.clone()
        }
    }

    fn category_slug_taken(&self, slug: &str, except: Option<CategoryId>) -> bool {
        self.categories
            .values()
            .any(|c| c.slug.as_str() == slug && Some(c.id) != except)
    }

    fn product_unique_taken(&self, product: &Product) -> bool {
        self.products.values().any(|p| {
            p.id != product.id
                && (p.slug == product.slug
                    || (p.sku.is_some() && p.sku == product.sku))
        })
    }

    fn next_id<K: Copy + Into<i32>, V>(map: &BTreeMap<K, V>) -> i32 {
        map.keys().next_back().map_or(1, |k| (*k).into() + 1)
    }

    fn adjust_stock(&mut self, items: &[OrderItem], take: bool) -> Result<(), RepositoryError> {
        if take {
            for item in items {
                let available = self
                    .products
                    .get(&item.product_id)
                    .filter(|p| p.is_active)
                    .map_or(0, |p| p.stock_quantity);
                if available < item.quantity {
                    return Err(RepositoryError::Conflict(format!(
                        "Insufficient stock for {}",
                        item.product_name
                    )));
                }
            }
        }
        let now = Utc::now();
        for item in items {
            if let Some(product) = self.products.get_mut(&item.product_id) {
                if take {
                    product.stock_quantity -= item.quantity;
                } else {
                    product.stock_quantity += item.quantity;
                }
                product.updated_at = now;
            }
        }
        Ok(())
    }
}

/// Writable in-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    /// A store holding a copy of `dataset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be materialized.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self, FallbackError> {
        let settings = dataset
            .settings
            .to_map()
            .map_err(|e| FallbackError::Invalid(format!("settings: {e}")))?;

        let data = MemoryData {
            categories: dataset.categories()?.into_iter().map(|c| (c.id, c)).collect(),
            products: dataset.products()?.into_iter().map(|p| (p.id, p)).collect(),
            users: dataset.users().into_iter().map(|u| (u.id, u)).collect(),
            settings: settings.into_iter().collect(),
            ..MemoryData::default()
        };
        Ok(Self {
            data: RwLock::new(data),
        })
    }

    // ===== Categories =====

    pub async fn list_categories(&self, include_inactive: bool) -> Vec<Category> {
        let data = self.data.read().await;
        let mut categories: Vec<Category> = data
            .categories
            .values()
            .filter(|c| include_inactive || c.is_active)
            .map(|c| data.with_count(c))
            .collect();
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        categories
    }

    pub async fn get_category(&self, id: CategoryId) -> Option<Category> {
        let data = self.data.read().await;
        data.categories.get(&id).map(|c| data.with_count(c))
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> Option<Category> {
        let data = self.data.read().await;
        data.categories
            .values()
            .find(|c| c.slug.as_str() == slug)
            .map(|c| data.with_count(c))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create_category(&self, new: &NewCategory) -> Result<Category, RepositoryError> {
        let mut data = self.data.write().await;
        if data.category_slug_taken(new.slug.as_str(), None) {
            return Err(RepositoryError::Conflict("category slug already exists".to_owned()));
        }

        let now = Utc::now();
        let category = Category {
            id: CategoryId::new(MemoryData::next_id(&data.categories)),
            name: new.name.clone(),
            slug: new.slug.clone(),
            description: new.description.clone(),
            image_url: new.image_url.clone(),
            parent_id: new.parent_id,
            sort_order: new.sort_order,
            show_in_menu: new.show_in_menu,
            is_active: new.is_active,
            product_count: 0,
            created_at: now,
            updated_at: now,
        };
        data.categories.insert(category.id, category.clone());
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn save_category(&self, category: &Category) -> Result<Category, RepositoryError> {
        let mut data = self.data.write().await;
        if !data.categories.contains_key(&category.id) {
            return Err(RepositoryError::NotFound);
        }
        if data.category_slug_taken(category.slug.as_str(), Some(category.id)) {
            return Err(RepositoryError::Conflict("category slug already exists".to_owned()));
        }
        data.categories.insert(category.id, category.clone());
        Ok(data.with_count(category))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or, when products or subcategories
    /// still reference the category, `RepositoryError::Conflict`.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        if !data.categories.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        let referenced = data.product_count(id) > 0
            || data.categories.values().any(|c| c.parent_id == Some(id));
        if referenced {
            return Err(RepositoryError::Conflict(
                "category is still referenced by products or subcategories".to_owned(),
            ));
        }
        data.categories.remove(&id);
        Ok(())
    }

    pub async fn count_products_in_category(&self, id: CategoryId) -> i64 {
        self.data.read().await.product_count(id)
    }

    pub async fn count_child_categories(&self, id: CategoryId) -> i64 {
        let data = self.data.read().await;
        let count = data
            .categories
            .values()
            .filter(|c| c.parent_id == Some(id))
            .count();
        i64::try_from(count).unwrap_or(i64::MAX)
    }

    pub async fn set_menu_position(
        &self,
        id: CategoryId,
        sort_order: i32,
        parent: Option<Option<CategoryId>>,
    ) -> bool {
        let mut data = self.data.write().await;
        let Some(category) = data.categories.get_mut(&id) else {
            return false;
        };
        category.sort_order = sort_order;
        if let Some(parent_id) = parent {
            category.parent_id = parent_id;
        }
        category.updated_at = Utc::now();
        true
    }

    pub async fn set_menu_visibility(&self, id: CategoryId, show_in_menu: bool) -> bool {
        let mut data = self.data.write().await;
        let Some(category) = data.categories.get_mut(&id) else {
            return false;
        };
        category.show_in_menu = show_in_menu;
        category.updated_at = Utc::now();
        true
    }

    // ===== Products =====

    pub async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> Page<Product> {
        let data = self.data.read().await;
        let mut matching: Vec<Product> = data
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        filter.sort(&mut matching);
        Page::from_vec(matching, page)
    }

    pub async fn get_product(&self, id: ProductId) -> Option<Product> {
        self.data.read().await.products.get(&id).cloned()
    }

    pub async fn get_product_by_slug(&self, slug: &str) -> Option<Product> {
        self.data
            .read()
            .await
            .products
            .values()
            .find(|p| p.slug.as_str() == slug)
            .cloned()
    }

    pub async fn get_products(&self, ids: &[ProductId]) -> Vec<Product> {
        let data = self.data.read().await;
        let mut products: Vec<Product> = ids
            .iter()
            .filter_map(|id| data.products.get(id).cloned())
            .collect();
        products.sort_by_key(|p| p.id);
        products.dedup_by_key(|p| p.id);
        products
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    pub async fn create_product(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let mut data = self.data.write().await;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(MemoryData::next_id(&data.products)),
            name: new.name.clone(),
            slug: new.slug.clone(),
            description: new.description.clone(),
            price: new.price,
            compare_at_price: new.compare_at_price,
            sku: new.sku.clone(),
            stock_quantity: new.stock_quantity,
            category_id: new.category_id,
            brand: new.brand.clone(),
            image_url: new.image_url.clone(),
            images: new.images.clone(),
            is_featured: new.is_featured,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };
        if data.product_unique_taken(&product) {
            return Err(RepositoryError::Conflict("product slug or SKU already exists".to_owned()));
        }
        data.products.insert(product.id, product.clone());
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn save_product(&self, product: &Product) -> Result<Product, RepositoryError> {
        let mut data = self.data.write().await;
        if !data.products.contains_key(&product.id) {
            return Err(RepositoryError::NotFound);
        }
        if data.product_unique_taken(product) {
            return Err(RepositoryError::Conflict("product slug or SKU already exists".to_owned()));
        }
        data.products.insert(product.id, product.clone());
        Ok(product.clone())
    }

    // ===== Orders =====

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if stock is insufficient or the
    /// order number collides. Nothing is changed in that case.
    pub async fn create_order(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut data = self.data.write().await;
        if data.orders.values().any(|o| o.order_number == new.order_number) {
            return Err(RepositoryError::Conflict(DUPLICATE_ORDER_NUMBER.to_owned()));
        }

        let items: Vec<OrderItem> = new.items.iter().map(OrderItem::from).collect();
        data.adjust_stock(&items, true)?;

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(MemoryData::next_id(&data.orders)),
            order_number: new.order_number.clone(),
            user_id: new.user_id,
            customer_name: new.customer_name.clone(),
            customer_email: new.customer_email.clone(),
            customer_phone: new.customer_phone.clone(),
            shipping_address: new.shipping_address.clone(),
            items,
            subtotal: new.subtotal,
            shipping_fee: new.shipping_fee,
            total: new.total,
            status: OrderStatus::Pending,
            payment_method: new.payment_method,
            payment_status: PaymentStatus::Pending,
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        data.orders.insert(order.id, order.clone());
        Ok(order)
    }

    pub async fn list_orders(&self, filter: OrderFilter, page: PageRequest) -> Page<Order> {
        let data = self.data.read().await;
        let mut matching: Vec<Order> = data
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Page::from_vec(matching, page)
    }

    pub async fn get_order(&self, id: OrderId) -> Option<Order> {
        self.data.read().await.orders.get(&id).cloned()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, or `RepositoryError::Conflict`
    /// when re-opening a cancelled order needs more stock than is on hand.
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<Order, RepositoryError> {
        let mut data = self.data.write().await;
        let (previous, items) = data
            .orders
            .get(&id)
            .map(|o| (o.status, o.items.clone()))
            .ok_or(RepositoryError::NotFound)?;

        if previous.holds_stock() != status.holds_stock() {
            data.adjust_stock(&items, status.holds_stock())?;
        }

        let order = data.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.status = status;
        if let Some(payment_status) = payment_status {
            order.payment_status = payment_status;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    // ===== Users =====

    pub async fn get_user(&self, id: UserId) -> Option<User> {
        self.data.read().await.users.get(&id).cloned()
    }

    pub async fn get_user_by_email(&self, email: &Email) -> Option<User> {
        self.data
            .read()
            .await
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is taken.
    pub async fn create_user(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let mut data = self.data.write().await;
        if data.users.values().any(|u| u.email == new.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let user = User {
            id: UserId::new(MemoryData::next_id(&data.users)),
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            role: new.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        data.users.insert(user.id, user.clone());
        Ok(user)
    }

    // ===== Cart & wishlist =====

    pub async fn cart_lines(&self, user_id: UserId) -> Vec<CartLine> {
        self.data
            .read()
            .await
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn add_to_cart(&self, user_id: UserId, product_id: ProductId, quantity: i32) -> CartLine {
        let mut data = self.data.write().await;
        let lines = data.carts.entry(user_id).or_default();
        if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity += quantity;
            return *line;
        }
        let line = CartLine {
            product_id,
            quantity,
            added_at: Utc::now(),
        };
        lines.push(line);
        line
    }

    pub async fn set_cart_quantity(&self, user_id: UserId, product_id: ProductId, quantity: i32) -> bool {
        let mut data = self.data.write().await;
        data.carts
            .get_mut(&user_id)
            .and_then(|lines| lines.iter_mut().find(|l| l.product_id == product_id))
            .map(|line| line.quantity = quantity)
            .is_some()
    }

    pub async fn remove_from_cart(&self, user_id: UserId, product_id: ProductId) -> bool {
        let mut data = self.data.write().await;
        let Some(lines) = data.carts.get_mut(&user_id) else {
            return false;
        };
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);
        lines.len() != before
    }

    pub async fn clear_cart(&self, user_id: UserId) -> u64 {
        let mut data = self.data.write().await;
        data.carts
            .remove(&user_id)
            .map_or(0, |lines| lines.len() as u64)
    }

    pub async fn wishlist(&self, user_id: UserId) -> Vec<WishlistEntry> {
        let data = self.data.read().await;
        let mut entries = data.wishlists.get(&user_id).cloned().unwrap_or_default();
        entries.reverse();
        entries
    }

    pub async fn add_to_wishlist(&self, user_id: UserId, product_id: ProductId) {
        let mut data = self.data.write().await;
        let entries = data.wishlists.entry(user_id).or_default();
        if !entries.iter().any(|e| e.product_id == product_id) {
            entries.push(WishlistEntry {
                product_id,
                added_at: Utc::now(),
            });
        }
    }

    pub async fn remove_from_wishlist(&self, user_id: UserId, product_id: ProductId) -> bool {
        let mut data = self.data.write().await;
        let Some(entries) = data.wishlists.get_mut(&user_id) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.product_id != product_id);
        entries.len() != before
    }

    // ===== Settings =====

    pub async fn settings_entries(&self) -> Vec<(String, JsonValue)> {
        self.data
            .read()
            .await
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn upsert_settings(&self, entries: &[(String, JsonValue)]) {
        let mut data = self.data.write().await;
        for (key, value) in entries {
            data.settings.insert(key.clone(), value.clone());
        }
    }
}
