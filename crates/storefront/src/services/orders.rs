//! Checkout and order management.
//!
//! Prices always come from the live catalog, never from the request. Stock
//! is taken atomically by the store when the order is written.

use std::collections::HashMap;

use chrono::Utc;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use kaaya_core::{
    Email, OrderId, OrderStatus, Page, PageRequest, PaymentMethod, PaymentStatus, ProductId,
};

use crate::db::{DUPLICATE_ORDER_NUMBER, RepositoryError};
use crate::error::{AppError, Result};
use crate::models::{NewOrder, NewOrderItem, Order, OrderFilter, ShippingAddress, normalize_text};
use crate::services::auth::AuthUser;
use crate::services::settings::SettingsService;
use crate::state::AppState;
use crate::store::Store;

const ORDER_NUMBER_PREFIX: &str = "KL";
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ORDER_NUMBER_ATTEMPTS: usize = 3;
const MAX_LINE_QUANTITY: i32 = 100;

/// Request body for `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderInput {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderLineInput>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrderLineInput {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Query string for `GET /api/orders`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

/// Request body for `PATCH /api/orders/{id}/status`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

/// Generate an order number like `KL-20261019-7GQ2XA`.
#[must_use]
pub fn generate_order_number(now: chrono::DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .filter_map(|_| ORDER_NUMBER_ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect();
    format!("{ORDER_NUMBER_PREFIX}-{}-{suffix}", now.format("%Y%m%d"))
}

/// Sum quantities of repeated products, keeping first-seen order.
fn merge_lines(lines: &[OrderLineInput]) -> Result<Vec<OrderLineInput>> {
    let mut merged: Vec<OrderLineInput> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "Quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(*line),
        }
    }
    if let Some(line) = merged.iter().find(|l| l.quantity > MAX_LINE_QUANTITY) {
        return Err(AppError::BadRequest(format!(
            "At most {MAX_LINE_QUANTITY} units of product {} per order",
            line.product_id
        )));
    }
    Ok(merged)
}

pub struct OrderService<'a> {
    state: &'a AppState,
    store: &'a Store,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            store: state.store(),
        }
    }

    /// Price and place an order. Guests must supply name and email; signed-in
    /// customers default to the details in their token.
    ///
    /// # Errors
    ///
    /// - `AppError::ServiceUnavailable` while the store is in maintenance mode
    /// - `AppError::BadRequest` for empty or invalid items, unknown or inactive
    ///   products, missing customer details, or an incomplete address
    /// - `AppError::Database(Conflict)` when stock runs out
    #[instrument(skip(self, input, user), fields(user_id = ?user.map(|u| u.id)))]
    pub async fn create(&self, input: OrderInput, user: Option<&AuthUser>) -> Result<Order> {
        let settings = SettingsService::new(self.state).current().await?;
        if settings.maintenance_mode {
            return Err(AppError::ServiceUnavailable(
                "The store is not accepting orders right now".to_string(),
            ));
        }

        if input.items.is_empty() {
            return Err(AppError::BadRequest("Order must contain at least one item".to_string()));
        }
        let lines = merge_lines(&input.items)?;

        let customer_name = normalize_text(input.customer_name)
            .or_else(|| user.and_then(|u| u.name.clone()))
            .ok_or_else(|| AppError::BadRequest("customer_name is required".to_string()))?;
        let customer_email = match normalize_text(input.customer_email) {
            Some(raw) => Email::parse(&raw)
                .map_err(|e| AppError::BadRequest(format!("Invalid customer_email: {e}")))?,
            None => user
                .and_then(|u| u.email.clone())
                .ok_or_else(|| AppError::BadRequest("customer_email is required".to_string()))?,
        };
        input
            .shipping_address
            .validate()
            .map_err(|field| AppError::BadRequest(format!("shipping_address.{field} is required")))?;

        let items = self.price_lines(&lines).await?;
        let subtotal: Decimal = items.iter().map(NewOrderItem::line_total).sum();
        let shipping_fee = settings.shipping_fee_for(subtotal);

        let mut new = NewOrder {
            order_number: String::new(),
            user_id: user.map(|u| u.id),
            customer_name,
            customer_email,
            customer_phone: normalize_text(input.customer_phone),
            shipping_address: input.shipping_address,
            items,
            subtotal,
            shipping_fee,
            total: subtotal + shipping_fee,
            payment_method: input.payment_method,
            notes: normalize_text(input.notes),
        };

        let order = self.insert_with_fresh_number(&mut new).await?;

        if let Some(user) = user
            && let Err(e) = self.store.clear_cart(user.id).await
        {
            warn!(error = %e, user_id = %user.id, "Order placed but cart was not cleared");
        }

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order placed"
        );
        Ok(order)
    }

    async fn price_lines(&self, lines: &[OrderLineInput]) -> Result<Vec<NewOrderItem>> {
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<ProductId, _> = self
            .store
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        lines
            .iter()
            .map(|line| {
                let product = products
                    .get(&line.product_id)
                    .filter(|p| p.is_active)
                    .ok_or_else(|| {
                        AppError::BadRequest(format!("Product {} is not available", line.product_id))
                    })?;
                if product.stock_quantity < line.quantity {
                    return Err(AppError::Conflict(format!(
                        "Insufficient stock for {}",
                        product.name
                    )));
                }
                Ok(NewOrderItem {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    unit_price: product.price,
                    quantity: line.quantity,
                })
            })
            .collect()
    }

    async fn insert_with_fresh_number(&self, new: &mut NewOrder) -> Result<Order> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            new.order_number = generate_order_number(Utc::now());
            match self.store.create_order(new).await {
                Ok(order) => return Ok(order),
                Err(RepositoryError::Conflict(reason))
                    if reason == DUPLICATE_ORDER_NUMBER && attempt < ORDER_NUMBER_ATTEMPTS =>
                {
                    warn!(order_number = %new.order_number, attempt, "Order number collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Orders visible to `user`: everything for admins, their own otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an unknown status filter.
    pub async fn list(&self, user: &AuthUser, query: &OrderQuery) -> Result<Page<Order>> {
        let status = query
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<OrderStatus>)
            .transpose()
            .map_err(AppError::BadRequest)?;

        let filter = OrderFilter {
            user_id: (!user.is_admin()).then_some(user.id),
            status,
        };
        let page = PageRequest::new(query.page, query.limit);
        Ok(self.store.list_orders(filter, page).await?)
    }

    /// One order, visible to its owner and to admins.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and `AppError::Forbidden`
    /// for someone else's order.
    pub async fn get(&self, user: &AuthUser, id: OrderId) -> Result<Order> {
        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if !user.is_admin() && order.user_id != Some(user.id) {
            return Err(AppError::Forbidden("You do not have access to this order".to_string()));
        }
        Ok(order)
    }

    /// Move an order to any status. Cancelling returns stock; re-opening a
    /// cancelled order takes it again.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and
    /// `AppError::Database(Conflict)` if re-opening needs stock that is gone.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: OrderId, update: StatusUpdate) -> Result<Order> {
        let order = self
            .store
            .update_order_status(id, update.status, update.payment_status)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AppError::NotFound("Order not found".to_string()),
                other => other.into(),
            })?;

        info!(order_id = %id, status = %order.status, payment_status = %order.payment_status, "Order status updated");
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use kaaya_core::{UserId, UserRole};
    use serde_json::json;

    use super::*;
    use crate::services::products::{ProductRef, ProductService};
    use crate::services::settings::SettingsService;
    use crate::services::test_support::demo_state;

    fn customer() -> AuthUser {
        AuthUser {
            id: UserId::new(2),
            email: Some(Email::parse("priya@example.com").unwrap()),
            name: Some("Priya Raman".to_string()),
            role: UserRole::Customer,
        }
    }

    fn admin() -> AuthUser {
        AuthUser {
            id: UserId::new(1),
            email: Some(Email::parse("admin@kaayalife.in").unwrap()),
            name: Some("Kaaya Admin".to_string()),
            role: UserRole::Admin,
        }
    }

    fn input(items: &[(i32, i32)]) -> OrderInput {
        OrderInput {
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            shipping_address: serde_json::from_value(json!({
                "line1": "14 MG Road",
                "city": "Bengaluru",
                "state": "Karnataka",
                "postal_code": "560001"
            }))
            .unwrap(),
            items: items
                .iter()
                .map(|&(id, quantity)| OrderLineInput {
                    product_id: ProductId::new(id),
                    quantity,
                })
                .collect(),
            payment_method: PaymentMethod::Cod,
            notes: None,
        }
    }

    async fn stock_of(state: &AppState, id: i32) -> i32 {
        ProductService::new(state)
            .get(&ProductRef::Id(ProductId::new(id)), true)
            .await
            .unwrap()
            .stock_quantity
    }

    #[test]
    fn test_order_number_format() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 10, 19, 8, 0, 0).unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("KL-20261019-"));
        assert_eq!(number.len(), "KL-20261019-".len() + 6);
        assert!(number[12..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_merge_lines() {
        let lines = [
            OrderLineInput { product_id: ProductId::new(1), quantity: 1 },
            OrderLineInput { product_id: ProductId::new(2), quantity: 1 },
            OrderLineInput { product_id: ProductId::new(1), quantity: 2 },
        ];
        let merged = merge_lines(&lines).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].quantity, 3);

        let zero = [OrderLineInput { product_id: ProductId::new(1), quantity: 0 }];
        assert!(matches!(merge_lines(&zero), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_prices_server_side_and_takes_stock() {
        let state = demo_state();
        let service = OrderService::new(&state);

        // 2 x 299.00 is below the free shipping threshold.
        let order = service.create(input(&[(1, 2)]), Some(&customer())).await.unwrap();
        assert_eq!(order.subtotal, Decimal::new(598, 0));
        assert_eq!(order.shipping_fee, Decimal::new(79, 0));
        assert_eq!(order.total, Decimal::new(677, 0));
        assert_eq!(order.customer_email.as_str(), "priya@example.com");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(stock_of(&state, 1).await, 118);
    }

    #[tokio::test]
    async fn test_free_shipping_at_threshold() {
        let state = demo_state();
        let order = OrderService::new(&state)
            .create(input(&[(3, 1)]), Some(&customer()))
            .await
            .unwrap();
        assert_eq!(order.shipping_fee, Decimal::ZERO);
        assert_eq!(order.total, Decimal::new(1299, 0));
    }

    #[tokio::test]
    async fn test_guest_needs_contact_details() {
        let state = demo_state();
        let err = OrderService::new(&state).create(input(&[(1, 1)]), None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let mut guest = input(&[(1, 1)]);
        guest.customer_name = Some("Arjun".to_string());
        guest.customer_email = Some("arjun@example.com".to_string());
        let order = OrderService::new(&state).create(guest, None).await.unwrap();
        assert_eq!(order.user_id, None);
    }

    #[tokio::test]
    async fn test_out_of_stock_and_inactive_products() {
        let state = demo_state();
        let service = OrderService::new(&state);

        let err = service.create(input(&[(7, 1)]), Some(&customer())).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);

        let err = service.create(input(&[(14, 1)]), Some(&customer())).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_maintenance_mode_blocks_orders() {
        let state = demo_state();
        let patch = serde_json::Map::from_iter([("maintenance_mode".to_string(), json!(true))]);
        SettingsService::new(&state).update(patch).await.unwrap();

        let err = OrderService::new(&state)
            .create(input(&[(1, 1)]), Some(&customer()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_customers_see_only_their_orders() {
        let state = demo_state();
        let service = OrderService::new(&state);
        let order = service.create(input(&[(2, 1)]), Some(&customer())).await.unwrap();

        let other = AuthUser { id: UserId::new(9), ..customer() };
        assert!(matches!(service.get(&other, order.id).await, Err(AppError::Forbidden(_))));
        assert_eq!(service.get(&admin(), order.id).await.unwrap().id, order.id);

        let mine = service.list(&customer(), &OrderQuery::default()).await.unwrap();
        assert_eq!(mine.pagination.total, 1);
        let theirs = service.list(&other, &OrderQuery::default()).await.unwrap();
        assert_eq!(theirs.pagination.total, 0);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock() {
        let state = demo_state();
        let service = OrderService::new(&state);
        let order = service.create(input(&[(4, 5)]), Some(&customer())).await.unwrap();
        assert_eq!(stock_of(&state, 4).await, 50);

        let update = StatusUpdate {
            status: OrderStatus::Cancelled,
            payment_status: Some(PaymentStatus::Refunded),
        };
        let cancelled = service.update_status(order.id, update).await.unwrap();
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(stock_of(&state, 4).await, 55);
    }

    #[tokio::test]
    async fn test_update_unknown_order() {
        let state = demo_state();
        let update = StatusUpdate { status: OrderStatus::Shipped, payment_status: None };
        let err = OrderService::new(&state)
            .update_status(OrderId::new(404), update)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_status() {
        let state = demo_state();
        let query = OrderQuery { status: Some("lost".to_string()), ..OrderQuery::default() };
        let err = OrderService::new(&state).list(&admin(), &query).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
