//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kaaya_core::{Email, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};

/// A placed order with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Customer-facing reference, e.g. `KL-20261019-7GQ2XA`.
    pub order_number: String,
    /// Account that placed the order; `None` for guest checkout.
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i64::from(i.quantity)).sum()
    }
}

/// One line of an order, priced at the time of purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl From<&NewOrderItem> for OrderItem {
    fn from(item: &NewOrderItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total: item.line_total(),
        }
    }
}

/// Delivery address, stored as a JSON document on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "India".to_string()
}

impl ShippingAddress {
    /// Check that the required lines are filled in.
    ///
    /// # Errors
    ///
    /// Returns the name of the first blank required field.
    pub fn validate(&self) -> Result<(), &'static str> {
        let required = [
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(*field),
            None => Ok(()),
        }
    }
}

/// A fully priced order ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<NewOrderItem>,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// A priced line waiting to be persisted.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl NewOrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order listing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    /// Restrict to one customer's orders.
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.is_none_or(|id| order.user_id == Some(id))
            && self.status.is_none_or(|status| order.status == status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            postal_code: "560001".to_string(),
            country: default_country(),
        }
    }

    #[test]
    fn test_address_validation() {
        assert!(address().validate().is_ok());

        let mut blank_city = address();
        blank_city.city = "  ".to_string();
        assert_eq!(blank_city.validate(), Err("city"));
    }

    #[test]
    fn test_address_country_defaults_to_india() {
        let parsed: ShippingAddress = serde_json::from_str(
            r#"{"line1":"4 Park St","city":"Kolkata","state":"WB","postal_code":"700016"}"#,
        )
        .unwrap();
        assert_eq!(parsed.country, "India");
    }

    #[test]
    fn test_line_total() {
        let item = NewOrderItem {
            product_id: ProductId::new(1),
            product_name: "Aloe Gel".to_string(),
            unit_price: Decimal::new(24_950, 2),
            quantity: 3,
        };
        assert_eq!(item.line_total(), Decimal::new(74_850, 2));
    }
}
