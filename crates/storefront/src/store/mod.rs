//! Data access front door.
//!
//! [`Store`] hides whether the server runs against `PostgreSQL` or the
//! in-memory demo store. Services only ever talk to a `Store`.

pub mod fallback;
pub mod memory;

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use kaaya_core::{
    CategoryId, Email, OrderId, OrderStatus, Page, PageRequest, PaymentStatus, ProductId, UserId,
};

use crate::db::{
    CartRepository, CategoryRepository, OrderRepository, ProductRepository, RepositoryError,
    SettingsRepository, UserRepository,
};
use crate::models::{
    CartLine, Category, NewCategory, NewOrder, NewProduct, NewUser, Order, OrderFilter, Product,
    ProductFilter, User, WishlistEntry,
};

pub use fallback::{Dataset, FallbackCatalog, FallbackError};
pub use memory::MemoryStore;

type Result<T> = std::result::Result<T, RepositoryError>;

/// The primary store: a `PostgreSQL` pool or the in-memory demo store.
#[derive(Clone)]
pub enum Store {
    Postgres(PgPool),
    Memory(Arc<MemoryStore>),
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres(_) => f.write_str("Store::Postgres"),
            Self::Memory(_) => f.write_str("Store::Memory"),
        }
    }
}

#[allow(clippy::missing_errors_doc)]
impl Store {
    /// Demo store seeded from `dataset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be materialized.
    pub fn memory(dataset: &Dataset) -> std::result::Result<Self, FallbackError> {
        Ok(Self::Memory(Arc::new(MemoryStore::from_dataset(dataset)?)))
    }

    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory(_))
    }

    /// Round-trip to the database; always succeeds for the memory store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the ping fails.
    pub async fn ping(&self) -> Result<()> {
        match self {
            Self::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            Self::Memory(_) => Ok(()),
        }
    }

    // ===== Categories =====

    pub async fn list_categories(&self, include_inactive: bool) -> Result<Vec<Category>> {
        match self {
            Self::Postgres(pool) => CategoryRepository::new(pool).list(include_inactive).await,
            Self::Memory(mem) => Ok(mem.list_categories(include_inactive).await),
        }
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        match self {
            Self::Postgres(pool) => CategoryRepository::new(pool).get(id).await,
            Self::Memory(mem) => Ok(mem.get_category(id).await),
        }
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        match self {
            Self::Postgres(pool) => CategoryRepository::new(pool).get_by_slug(slug).await,
            Self::Memory(mem) => Ok(mem.get_category_by_slug(slug).await),
        }
    }

    pub async fn create_category(&self, new: &NewCategory) -> Result<Category> {
        match self {
            Self::Postgres(pool) => CategoryRepository::new(pool).create(new).await,
            Self::Memory(mem) => mem.create_category(new).await,
        }
    }

    pub async fn save_category(&self, category: &Category) -> Result<Category> {
        match self {
            Self::Postgres(pool) => CategoryRepository::new(pool).save(category).await,
            Self::Memory(mem) => mem.save_category(category).await,
        }
    }

    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        match self {
            Self::Postgres(pool) => CategoryRepository::new(pool).delete(id).await,
            Self::Memory(mem) => mem.delete_category(id).await,
        }
    }

    pub async fn count_products_in_category(&self, id: CategoryId) -> Result<i64> {
        match self {
            Self::Postgres(pool) => CategoryRepository::new(pool).count_products(id).await,
            Self::Memory(mem) => Ok(mem.count_products_in_category(id).await),
        }
    }

    pub async fn count_child_categories(&self, id: CategoryId) -> Result<i64> {
        match self {
            Self::Postgres(pool) => CategoryRepository::new(pool).count_children(id).await,
            Self::Memory(mem) => Ok(mem.count_child_categories(id).await),
        }
    }

    pub async fn set_menu_position(
        &self,
        id: CategoryId,
        sort_order: i32,
        parent: Option<Option<CategoryId>>,
    ) -> Result<bool> {
        match self {
            Self::Postgres(pool) => {
                CategoryRepository::new(pool)
                    .set_menu_position(id, sort_order, parent)
                    .await
            }
            Self::Memory(mem) => Ok(mem.set_menu_position(id, sort_order, parent).await),
        }
    }

    pub async fn set_menu_visibility(&self, id: CategoryId, show_in_menu: bool) -> Result<bool> {
        match self {
            Self::Postgres(pool) => {
                CategoryRepository::new(pool)
                    .set_menu_visibility(id, show_in_menu)
                    .await
            }
            Self::Memory(mem) => Ok(mem.set_menu_visibility(id, show_in_menu).await),
        }
    }

    // ===== Products =====

    pub async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> Result<Page<Product>> {
        match self {
            Self::Postgres(pool) => ProductRepository::new(pool).list(filter, page).await,
            Self::Memory(mem) => Ok(mem.list_products(filter, page).await),
        }
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        match self {
            Self::Postgres(pool) => ProductRepository::new(pool).get(id).await,
            Self::Memory(mem) => Ok(mem.get_product(id).await),
        }
    }

    pub async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        match self {
            Self::Postgres(pool) => ProductRepository::new(pool).get_by_slug(slug).await,
            Self::Memory(mem) => Ok(mem.get_product_by_slug(slug).await),
        }
    }

    pub async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        match self {
            Self::Postgres(pool) => ProductRepository::new(pool).get_many(ids).await,
            Self::Memory(mem) => Ok(mem.get_products(ids).await),
        }
    }

    pub async fn create_product(&self, new: &NewProduct) -> Result<Product> {
        match self {
            Self::Postgres(pool) => ProductRepository::new(pool).create(new).await,
            Self::Memory(mem) => mem.create_product(new).await,
        }
    }

    pub async fn save_product(&self, product: &Product) -> Result<Product> {
        match self {
            Self::Postgres(pool) => ProductRepository::new(pool).save(product).await,
            Self::Memory(mem) => mem.save_product(product).await,
        }
    }

    // ===== Orders =====

    pub async fn create_order(&self, new: &NewOrder) -> Result<Order> {
        match self {
            Self::Postgres(pool) => OrderRepository::new(pool).create(new).await,
            Self::Memory(mem) => mem.create_order(new).await,
        }
    }

    pub async fn list_orders(&self, filter: OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        match self {
            Self::Postgres(pool) => OrderRepository::new(pool).list(filter, page).await,
            Self::Memory(mem) => Ok(mem.list_orders(filter, page).await),
        }
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        match self {
            Self::Postgres(pool) => OrderRepository::new(pool).get(id).await,
            Self::Memory(mem) => Ok(mem.get_order(id).await),
        }
    }

    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<Order> {
        match self {
            Self::Postgres(pool) => {
                OrderRepository::new(pool)
                    .update_status(id, status, payment_status)
                    .await
            }
            Self::Memory(mem) => mem.update_order_status(id, status, payment_status).await,
        }
    }

    // ===== Users =====

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        match self {
            Self::Postgres(pool) => UserRepository::new(pool).get_by_id(id).await,
            Self::Memory(mem) => Ok(mem.get_user(id).await),
        }
    }

    pub async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        match self {
            Self::Postgres(pool) => UserRepository::new(pool).get_by_email(email).await,
            Self::Memory(mem) => Ok(mem.get_user_by_email(email).await),
        }
    }

    pub async fn create_user(&self, new: &NewUser) -> Result<User> {
        match self {
            Self::Postgres(pool) => UserRepository::new(pool).create(new).await,
            Self::Memory(mem) => mem.create_user(new).await,
        }
    }

    // ===== Cart & wishlist =====

    pub async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        match self {
            Self::Postgres(pool) => CartRepository::new(pool).lines(user_id).await,
            Self::Memory(mem) => Ok(mem.cart_lines(user_id).await),
        }
    }

    pub async fn add_to_cart(&self, user_id: UserId, product_id: ProductId, quantity: i32) -> Result<CartLine> {
        match self {
            Self::Postgres(pool) => CartRepository::new(pool).add(user_id, product_id, quantity).await,
            Self::Memory(mem) => Ok(mem.add_to_cart(user_id, product_id, quantity).await),
        }
    }

    pub async fn set_cart_quantity(&self, user_id: UserId, product_id: ProductId, quantity: i32) -> Result<bool> {
        match self {
            Self::Postgres(pool) => {
                CartRepository::new(pool)
                    .set_quantity(user_id, product_id, quantity)
                    .await
            }
            Self::Memory(mem) => Ok(mem.set_cart_quantity(user_id, product_id, quantity).await),
        }
    }

    pub async fn remove_from_cart(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        match self {
            Self::Postgres(pool) => CartRepository::new(pool).remove(user_id, product_id).await,
            Self::Memory(mem) => Ok(mem.remove_from_cart(user_id, product_id).await),
        }
    }

    pub async fn clear_cart(&self, user_id: UserId) -> Result<u64> {
        match self {
            Self::Postgres(pool) => CartRepository::new(pool).clear(user_id).await,
            Self::Memory(mem) => Ok(mem.clear_cart(user_id).await),
        }
    }

    pub async fn wishlist(&self, user_id: UserId) -> Result<Vec<WishlistEntry>> {
        match self {
            Self::Postgres(pool) => CartRepository::new(pool).wishlist(user_id).await,
            Self::Memory(mem) => Ok(mem.wishlist(user_id).await),
        }
    }

    pub async fn add_to_wishlist(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        match self {
            Self::Postgres(pool) => {
                CartRepository::new(pool)
                    .add_to_wishlist(user_id, product_id)
                    .await
            }
            Self::Memory(mem) => {
                mem.add_to_wishlist(user_id, product_id).await;
                Ok(())
            }
        }
    }

    pub async fn remove_from_wishlist(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        match self {
            Self::Postgres(pool) => {
                CartRepository::new(pool)
                    .remove_from_wishlist(user_id, product_id)
                    .await
            }
            Self::Memory(mem) => Ok(mem.remove_from_wishlist(user_id, product_id).await),
        }
    }

    // ===== Settings =====

    pub async fn settings_entries(&self) -> Result<Vec<(String, JsonValue)>> {
        match self {
            Self::Postgres(pool) => SettingsRepository::new(pool).entries().await,
            Self::Memory(mem) => Ok(mem.settings_entries().await),
        }
    }

    pub async fn upsert_settings(&self, entries: &[(String, JsonValue)]) -> Result<()> {
        match self {
            Self::Postgres(pool) => SettingsRepository::new(pool).upsert(entries).await,
            Self::Memory(mem) => {
                mem.upsert_settings(entries).await;
                Ok(())
            }
        }
    }
}
