//! Store-wide settings.
//!
//! Persisted as one key/value row per top-level field so that a partial
//! update touches only the keys it names.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kaaya_core::CurrencyCode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    pub store_name: String,
    pub tagline: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub currency: CurrencyCode,
    /// Flat shipping fee charged below the free-shipping threshold.
    pub shipping_fee: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
    /// Banner text shown above the site header.
    pub announcement: Option<String>,
    /// When set, the storefront refuses new orders.
    pub maintenance_mode: bool,
    pub social: SocialLinks,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "KaayaLife".to_string(),
            tagline: Some("Rooted in Ayurveda, made for everyday".to_string()),
            contact_email: None,
            contact_phone: None,
            currency: CurrencyCode::INR,
            shipping_fee: Decimal::new(79, 0),
            free_shipping_threshold: Decimal::new(999, 0),
            announcement: None,
            maintenance_mode: false,
            social: SocialLinks::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocialLinks {
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub youtube: Option<String>,
}

impl StoreSettings {
    /// Shipping fee for an order with the given subtotal.
    #[must_use]
    pub fn shipping_fee_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal.is_zero() || subtotal >= self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.shipping_fee
        }
    }

    /// Overlay stored key/value rows on top of the defaults.
    ///
    /// Keys that are no longer part of the settings schema are skipped and
    /// returned so the caller can log them.
    ///
    /// # Errors
    ///
    /// Returns an error if a known key holds a value of the wrong shape.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(Self, Vec<String>), serde_json::Error> {
        let mut merged = Self::default().to_map()?;
        let mut unknown = Vec::new();
        for (key, value) in entries {
            if merged.contains_key(&key) {
                merged.insert(key, value);
            } else {
                unknown.push(key);
            }
        }
        let settings = serde_json::from_value(Value::Object(merged))?;
        Ok((settings, unknown))
    }

    /// Serialize into a JSON object keyed by field name.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_fee_threshold() {
        let settings = StoreSettings::default();
        assert_eq!(settings.shipping_fee_for(Decimal::new(500, 0)), Decimal::new(79, 0));
        assert_eq!(settings.shipping_fee_for(Decimal::new(999, 0)), Decimal::ZERO);
        assert_eq!(settings.shipping_fee_for(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_from_entries_overlays_defaults() {
        let (settings, unknown) = StoreSettings::from_entries([
            ("store_name".to_string(), Value::from("Kaaya Demo")),
            ("legacy_banner".to_string(), Value::from(true)),
        ])
        .unwrap();
        assert_eq!(settings.store_name, "Kaaya Demo");
        assert_eq!(settings.free_shipping_threshold, Decimal::new(999, 0));
        assert_eq!(unknown, ["legacy_banner"]);
    }

    #[test]
    fn test_from_entries_rejects_wrong_shape() {
        let result =
            StoreSettings::from_entries([("maintenance_mode".to_string(), Value::from("soon"))]);
        assert!(result.is_err());
    }
}
