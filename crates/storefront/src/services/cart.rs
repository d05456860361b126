//! Signed-in cart and wishlist.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use kaaya_core::{ProductId, UserId};

use crate::error::{AppError, Result};
use crate::models::{CartLine, Product};
use crate::services::settings::SettingsService;
use crate::state::AppState;
use crate::store::Store;

/// Request body for `POST /api/cart/items`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Request body for `PUT /api/cart/items/{product_id}`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SetQuantity {
    pub quantity: i32,
}

/// Request body for `POST /api/wishlist`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AddToWishlist {
    pub product_id: ProductId,
}

/// A cart line joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
    pub product: Product,
    pub line_total: Decimal,
    /// `false` once the product is deactivated; such lines do not count
    /// towards the totals.
    pub available: bool,
}

/// The cart with computed totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: i64,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
}

impl CartView {
    fn build(
        lines: Vec<CartLine>,
        products: &HashMap<ProductId, Product>,
        shipping: impl Fn(Decimal) -> Decimal,
    ) -> Self {
        let items: Vec<CartItemView> = lines
            .into_iter()
            .filter_map(|line| {
                let product = products.get(&line.product_id)?.clone();
                Some(CartItemView {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    added_at: line.added_at,
                    line_total: product.price * Decimal::from(line.quantity),
                    available: product.is_active,
                    product,
                })
            })
            .collect();

        let counted = items.iter().filter(|i| i.available);
        let subtotal: Decimal = counted.clone().map(|i| i.line_total).sum();
        let item_count = counted.map(|i| i64::from(i.quantity)).sum();
        let shipping_fee = shipping(subtotal);

        Self {
            items,
            item_count,
            subtotal,
            shipping_fee,
            total: subtotal + shipping_fee,
        }
    }
}

/// A wishlist entry joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistItemView {
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
    pub product: Product,
}

pub struct CartService<'a> {
    state: &'a AppState,
    store: &'a Store,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            store: state.store(),
        }
    }

    async fn products_by_id(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>> {
        Ok(self
            .store
            .get_products(ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }

    async fn active_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    /// The user's cart with prices from the live catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store fails.
    pub async fn view(&self, user_id: UserId) -> Result<CartView> {
        let lines = self.store.cart_lines(user_id).await?;
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products = self.products_by_id(&ids).await?;
        let settings = SettingsService::new(self.state).current().await?;

        Ok(CartView::build(lines, &products, |subtotal| {
            settings.shipping_fee_for(subtotal)
        }))
    }

    fn check_stock(product: &Product, wanted: i32) -> Result<()> {
        if wanted > product.stock_quantity {
            return Err(AppError::Conflict(format!(
                "Only {} of {} in stock",
                product.stock_quantity, product.name
            )));
        }
        Ok(())
    }

    /// Add a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a non-positive quantity,
    /// `AppError::NotFound` for an unknown or inactive product, and
    /// `AppError::Conflict` when the merged quantity exceeds stock.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: UserId, item: AddToCart) -> Result<CartView> {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
        }
        let product = self.active_product(item.product_id).await?;
        let in_cart = self
            .store
            .cart_lines(user_id)
            .await?
            .iter()
            .find(|l| l.product_id == item.product_id)
            .map_or(0, |l| l.quantity);
        Self::check_stock(&product, in_cart.saturating_add(item.quantity))?;

        self.store.add_to_cart(user_id, item.product_id, item.quantity).await?;
        debug!(%user_id, product_id = %item.product_id, "Added to cart");
        self.view(user_id).await
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a negative quantity,
    /// `AppError::NotFound` if the product is not in the cart, and
    /// `AppError::Conflict` when the quantity exceeds stock.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartView> {
        if quantity < 0 {
            return Err(AppError::BadRequest("Quantity cannot be negative".to_string()));
        }
        if quantity == 0 {
            return self.remove(user_id, product_id).await;
        }

        let product = self.active_product(product_id).await?;
        Self::check_stock(&product, quantity)?;
        if !self.store.set_cart_quantity(user_id, product_id, quantity).await? {
            return Err(AppError::NotFound("Item not in cart".to_string()));
        }
        self.view(user_id).await
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is not in the cart.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<CartView> {
        if !self.store.remove_from_cart(user_id, product_id).await? {
            return Err(AppError::NotFound("Item not in cart".to_string()));
        }
        self.view(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store fails.
    pub async fn clear(&self, user_id: UserId) -> Result<CartView> {
        let removed = self.store.clear_cart(user_id).await?;
        debug!(%user_id, removed, "Cart cleared");
        self.view(user_id).await
    }

    /// Wishlist entries, newest first. Deactivated products are left out.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store fails.
    pub async fn wishlist(&self, user_id: UserId) -> Result<Vec<WishlistItemView>> {
        let entries = self.store.wishlist(user_id).await?;
        let ids: Vec<ProductId> = entries.iter().map(|e| e.product_id).collect();
        let products = self.products_by_id(&ids).await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let product = products.get(&entry.product_id).filter(|p| p.is_active)?;
                Some(WishlistItemView {
                    product_id: entry.product_id,
                    added_at: entry.added_at,
                    product: product.clone(),
                })
            })
            .collect())
    }

    /// Add a product to the wishlist. Adding it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown or inactive product.
    pub async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<WishlistItemView>> {
        self.active_product(product_id).await?;
        self.store.add_to_wishlist(user_id, product_id).await?;
        self.wishlist(user_id).await
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is not on the wishlist.
    pub async fn remove_from_wishlist(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        if !self.store.remove_from_wishlist(user_id, product_id).await? {
            return Err(AppError::NotFound("Item not in wishlist".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::services::products::ProductService;
    use crate::services::test_support::demo_state;

    const PRIYA: UserId = UserId::new(2);

    fn add(id: i32, quantity: i32) -> AddToCart {
        AddToCart {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_add_merges_quantities_and_totals() {
        let state = demo_state();
        let cart = CartService::new(&state);

        cart.add(PRIYA, add(2, 1)).await.unwrap();
        let view = cart.add(PRIYA, add(2, 2)).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, Decimal::new(747, 0));
        assert_eq!(view.shipping_fee, Decimal::new(79, 0));
        assert_eq!(view.total, Decimal::new(826, 0));
    }

    #[tokio::test]
    async fn test_free_shipping_over_threshold() {
        let state = demo_state();
        let view = CartService::new(&state).add(PRIYA, add(13, 1)).await.unwrap();
        assert_eq!(view.shipping_fee, Decimal::ZERO);
        assert_eq!(view.total, Decimal::new(1799, 0));
    }

    #[tokio::test]
    async fn test_add_checks_stock_and_product() {
        let state = demo_state();
        let cart = CartService::new(&state);

        assert!(matches!(cart.add(PRIYA, add(7, 1)).await, Err(AppError::Conflict(_))));
        assert!(matches!(cart.add(PRIYA, add(14, 1)).await, Err(AppError::NotFound(_))));
        assert!(matches!(cart.add(PRIYA, add(1, 0)).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes_line() {
        let state = demo_state();
        let cart = CartService::new(&state);
        cart.add(PRIYA, add(5, 2)).await.unwrap();

        let view = cart.set_quantity(PRIYA, ProductId::new(5), 4).await.unwrap();
        assert_eq!(view.items[0].quantity, 4);

        let view = cart.set_quantity(PRIYA, ProductId::new(5), 0).await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.total, Decimal::ZERO);

        let err = cart.set_quantity(PRIYA, ProductId::new(5), 0).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deactivated_product_excluded_from_totals() {
        let state = demo_state();
        let cart = CartService::new(&state);
        cart.add(PRIYA, add(1, 1)).await.unwrap();
        cart.add(PRIYA, add(2, 1)).await.unwrap();

        ProductService::new(&state).delete(ProductId::new(1)).await.unwrap();

        let view = cart.view(PRIYA).await.unwrap();
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.item_count, 1);
        assert_eq!(view.subtotal, Decimal::new(249, 0));
    }

    #[tokio::test]
    async fn test_clear() {
        let state = demo_state();
        let cart = CartService::new(&state);
        cart.add(PRIYA, add(1, 1)).await.unwrap();

        let view = cart.clear(PRIYA).await.unwrap();
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn test_wishlist_is_idempotent() {
        let state = demo_state();
        let cart = CartService::new(&state);

        cart.add_to_wishlist(PRIYA, ProductId::new(3)).await.unwrap();
        let list = cart.add_to_wishlist(PRIYA, ProductId::new(3)).await.unwrap();
        assert_eq!(list.len(), 1);

        cart.remove_from_wishlist(PRIYA, ProductId::new(3)).await.unwrap();
        let err = cart.remove_from_wishlist(PRIYA, ProductId::new(3)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
