//! Page requests and the pagination block returned with list responses.

use serde::{Deserialize, Serialize};

/// Default page size for catalog listings.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A clamped page request.
///
/// Out-of-range values are clamped rather than rejected: page 0 becomes 1 and
/// a limit above [`MAX_PAGE_SIZE`] becomes [`MAX_PAGE_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Row offset for `OFFSET` clauses and slice skipping.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// Build the metadata for `request` over a result set of `total` rows.
    #[must_use]
    pub fn new(request: PageRequest, total: u64) -> Self {
        let limit = u64::from(request.limit());
        let total_pages = u32::try_from(total.div_ceil(limit)).unwrap_or(u32::MAX);
        Self {
            page: request.page(),
            limit: request.limit(),
            total,
            total_pages,
            has_next: request.page() < total_pages,
            has_prev: request.page() > 1,
        }
    }
}

/// One page of results plus its pagination block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Slice an in-memory result set down to the requested page.
    #[must_use]
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let items = all
            .into_iter()
            .skip(offset)
            .take(request.limit() as usize)
            .collect();
        Self {
            items,
            pagination: Pagination::new(request, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        let req = PageRequest::new(Some(0), Some(500));
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), MAX_PAGE_SIZE);

        let req = PageRequest::new(None, Some(0));
        assert_eq!(req.limit(), 1);
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_pagination_flags() {
        let p = Pagination::new(PageRequest::new(Some(2), Some(5)), 11);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_prev);

        let p = Pagination::new(PageRequest::new(Some(1), Some(5)), 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_prev);
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let p = Pagination::new(PageRequest::default(), 30);
        let json = serde_json::to_value(p).unwrap_or_default();
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["hasNext"], true);
        assert_eq!(json["hasPrev"], false);
    }

    #[test]
    fn test_page_from_vec() {
        let page = Page::from_vec((1..=7).collect::<Vec<_>>(), PageRequest::new(Some(2), Some(3)));
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.pagination.total, 7);
    }
}
