//! Order repository.
//!
//! Order placement is the one multi-row write: the order, its items, and the
//! stock decrements commit together or not at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use kaaya_core::{
    Email, OrderId, OrderStatus, Page, PageRequest, Pagination, PaymentMethod, PaymentStatus,
    ProductId, UserId,
};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderFilter, OrderItem, ShippingAddress};

/// Conflict message for a colliding order number; callers retry with a new one.
pub const DUPLICATE_ORDER_NUMBER: &str = "order number already exists";

const SELECT_ORDER: &str = r"
    SELECT o.id, o.order_number, o.user_id, o.customer_name, o.customer_email,
           o.customer_phone, o.shipping_address, o.subtotal, o.shipping_fee, o.total,
           o.status, o.payment_method, o.payment_status, o.notes, o.created_at, o.updated_at
    FROM kaaya.customer_order o
";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: Option<i32>,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    shipping_address: Json<ShippingAddress>,
    subtotal: Decimal,
    shipping_fee: Decimal,
    total: Decimal,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    product_id: i32,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let customer_email = Email::parse(&self.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Order {
            id: OrderId::new(self.id),
            order_number: self.order_number,
            user_id: self.user_id.map(UserId::new),
            customer_name: self.customer_name,
            customer_email,
            customer_phone: self.customer_phone,
            shipping_address: self.shipping_address.0,
            items,
            subtotal: self.subtotal,
            shipping_fee: self.shipping_fee,
            total: self.total,
            status: self.status,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id {
        qb.push(" AND o.user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND o.status = ").push_bind(status);
    }
}

/// Take `quantity` units of a product, failing if not enough are on hand.
async fn take_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    quantity: i32,
    product_name: &str,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE kaaya.product
        SET stock_quantity = stock_quantity - $2, updated_at = NOW()
        WHERE id = $1 AND is_active AND stock_quantity >= $2
        ",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "Insufficient stock for {product_name}"
        )));
    }
    Ok(())
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order: decrement stock, insert the order and its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if any line exceeds available stock
    /// or the order number collides.
    pub async fn create(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock product rows in id order so concurrent checkouts cannot deadlock.
        let mut by_product: Vec<_> = new.items.iter().collect();
        by_product.sort_by_key(|item| item.product_id);
        for item in by_product {
            take_stock(&mut tx, item.product_id, item.quantity, &item.product_name).await?;
        }

        let sql = r"
            INSERT INTO kaaya.customer_order
                (order_number, user_id, customer_name, customer_email, customer_phone,
                 shipping_address, subtotal, shipping_fee, total, payment_method, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, order_number, user_id, customer_name, customer_email,
                      customer_phone, shipping_address, subtotal, shipping_fee, total,
                      status, payment_method, payment_status, notes, created_at, updated_at
        ";
        let row = sqlx::query_as::<_, OrderRow>(sql)
            .bind(&new.order_number)
            .bind(new.user_id)
            .bind(&new.customer_name)
            .bind(&new.customer_email)
            .bind(&new.customer_phone)
            .bind(Json(&new.shipping_address))
            .bind(new.subtotal)
            .bind(new.shipping_fee)
            .bind(new.total)
            .bind(new.payment_method)
            .bind(&new.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(super::conflict_on_unique(DUPLICATE_ORDER_NUMBER))?;

        let mut items = Vec::with_capacity(new.items.len());
        for (position, item) in (0_i32..).zip(&new.items) {
            let line = OrderItem::from(item);
            sqlx::query(
                r"
                INSERT INTO kaaya.order_item
                    (order_id, position, product_id, product_name, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(row.id)
            .bind(position)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
            items.push(line);
        }

        tx.commit().await?;
        row.into_order(items)
    }

    /// One page of orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM kaaya.customer_order o");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::new(SELECT_ORDER);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
            .push_bind(i64::from(page.limit()))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
        let rows = qb.build_query_as::<OrderRow>().fetch_all(self.pool).await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;
        let orders = rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items: orders,
            pagination: Pagination::new(page, u64::try_from(total).unwrap_or(0)),
        })
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("{SELECT_ORDER} WHERE o.id = $1");
        let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let mut items = self.items_for(&[row.id]).await?;
        let lines = items.remove(&row.id).unwrap_or_default();
        row.into_order(lines).map(Some)
    }

    /// Change an order's status, and optionally its payment status.
    ///
    /// Cancelling an order returns its units to stock; moving a cancelled
    /// order back into any other status takes them again.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if re-opening needs more stock than is on hand.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous: OrderStatus = sqlx::query_scalar(
            "SELECT status FROM kaaya.customer_order WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if previous.holds_stock() && !status.holds_stock() {
            sqlx::query(
                r"
                UPDATE kaaya.product p
                SET stock_quantity = p.stock_quantity + i.quantity, updated_at = NOW()
                FROM kaaya.order_item i
                WHERE i.order_id = $1 AND p.id = i.product_id
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        } else if !previous.holds_stock() && status.holds_stock() {
            let lines: Vec<OrderItemRow> = sqlx::query_as(
                r"
                SELECT order_id, product_id, product_name, unit_price, quantity, line_total
                FROM kaaya.order_item WHERE order_id = $1 ORDER BY product_id
                ",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
            for line in lines {
                take_stock(
                    &mut tx,
                    ProductId::new(line.product_id),
                    line.quantity,
                    &line.product_name,
                )
                .await?;
            }
        }

        sqlx::query(
            r"
            UPDATE kaaya.customer_order
            SET status = $2, payment_status = COALESCE($3, payment_status), updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .bind(payment_status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn items_for(&self, order_ids: &[i32]) -> Result<HashMap<i32, Vec<OrderItem>>, RepositoryError> {
        let mut grouped: HashMap<i32, Vec<OrderItem>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(grouped);
        }

        let rows: Vec<OrderItemRow> = sqlx::query_as(
            r"
            SELECT order_id, product_id, product_name, unit_price, quantity, line_total
            FROM kaaya.order_item
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;

        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}
