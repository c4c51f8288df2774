//! Page arithmetic for listings.
//!
//! Requests for a page that is not a number get the first page. Requests
//! outside `1..=num_pages` get the last page.

use serde::Serialize;

/// A resolved page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// Total number of pages, at least 1.
    pub num_pages: usize,
    /// Total number of items across all pages.
    pub total: usize,
    pub per_page: usize,
}

impl Page {
    /// Resolve the requested page for `total` items.
    pub fn resolve(requested: Option<&str>, total: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let num_pages = total.div_ceil(per_page).max(1);

        let number = match requested.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n >= 1 && (n as usize) <= num_pages => n as usize,
            Some(Ok(_)) => num_pages,
        };

        Self {
            number,
            num_pages,
            total,
            per_page,
        }
    }

    /// Row offset for `LIMIT ... OFFSET ...`.
    pub fn offset(&self) -> usize {
        (self.number - 1) * self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_valid_page() {
        let page = Page::resolve(Some("2"), 12, 5);
        assert_eq!(page.number, 2);
        assert_eq!(page.num_pages, 3);
        assert_eq!(page.offset(), 5);
        assert!(page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn test_non_integer_page_is_first() {
        assert_eq!(Page::resolve(Some("abc"), 12, 5).number, 1);
        assert_eq!(Page::resolve(None, 12, 5).number, 1);
    }

    #[test]
    fn test_out_of_range_page_is_last() {
        assert_eq!(Page::resolve(Some("999"), 10, 5).number, 2);
        assert_eq!(Page::resolve(Some("0"), 10, 5).number, 2);
        assert_eq!(Page::resolve(Some("-3"), 10, 5).number, 2);
    }

    #[test]
    fn test_empty_listing_has_one_page() {
        let page = Page::resolve(Some("4"), 0, 5);
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.offset(), 0);
        assert!(!page.has_next());
    }
}
