//! The `{ success, data, message, pagination }` response envelope.
//!
//! Every `/api/*` handler answers with this shape, including errors
//! (`success: false` with a `message`).

use serde::{Deserialize, Serialize};

use super::pagination::{Page, Pagination};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: None,
        }
    }

    /// Successful response carrying `data` and a human-readable message.
    #[must_use]
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            pagination: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// Successful list response with pagination metadata.
    #[must_use]
    pub fn paginated(page: Page<T>) -> Self {
        Self {
            success: true,
            data: Some(page.items),
            message: None,
            pagination: Some(page.pagination),
        }
    }
}

impl ApiResponse<()> {
    /// Successful response with only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            pagination: None,
        }
    }

    /// Failed response with a message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            pagination: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::pagination::PageRequest;

    #[test]
    fn test_error_omits_data() {
        let json = serde_json::to_value(ApiResponse::error("Category not found")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "message": "Category not found" })
        );
    }

    #[test]
    fn test_paginated_includes_pagination() {
        let page = Page::from_vec(vec!["a", "b", "c"], PageRequest::new(Some(1), Some(2)));
        let json = serde_json::to_value(ApiResponse::paginated(page)).unwrap();
        assert_eq!(json["data"], serde_json::json!(["a", "b"]));
        assert_eq!(json["pagination"]["total"], 3);
        assert!(json.get("message").is_none());
    }
}
