//! Status enums for orders, payments, and users.
//!
//! All enums serialize as `snake_case` strings on the wire and map to
//! `PostgreSQL` enum types in the `kaaya` schema with the `postgres` feature.

use serde::{Deserialize, Serialize};

/// Generate `Display`, `FromStr`, and `ALL` for a `snake_case` status enum.
macro_rules! status_strings {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire / database representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("invalid {}: {other}", $label)),
                }
            }
        }
    };
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "kaaya.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

status_strings!(OrderStatus, "order status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether the order still reserves stock (anything but cancelled).
    #[must_use]
    pub const fn holds_stock(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Payment status for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "kaaya.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

status_strings!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "kaaya.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    Cod,
    Card,
    Upi,
}

status_strings!(PaymentMethod, "payment method", {
    Cod => "cod",
    Card => "card",
    Upi => "upi",
});

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "kaaya.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper account.
    #[default]
    Customer,
    /// Back-office access to catalog, menu, orders, and settings.
    Admin,
}

status_strings!(UserRole, "user role", {
    Customer => "customer",
    Admin => "admin",
});

impl UserRole {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_from_str_is_case_insensitive() {
        assert_eq!(
            "Shipped".parse::<OrderStatus>().unwrap(),
            OrderStatus::Shipped
        );
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        assert!(!OrderStatus::Cancelled.holds_stock());
        assert!(OrderStatus::Delivered.holds_stock());
    }

    #[test]
    fn test_all_round_trips_through_display() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.to_string().parse::<PaymentStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_role_error_message() {
        let err = "owner".parse::<UserRole>().unwrap_err();
        assert_eq!(err, "invalid user role: owner");
    }
}
