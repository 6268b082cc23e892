use rocket::FromForm;
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
/// Form range bounds are `isize`.
pub const MAX_PAGE_SIZE: isize = 100;

/// Pagination query parameters, e.g. `?page_num=2&page_size=20`.
/// Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromForm)]
pub struct PaginationRequest {
    #[field(default = 1, validate = range(1..))]
    page_num: u64,
    #[field(default = DEFAULT_PAGE_SIZE, validate = range(1..=MAX_PAGE_SIZE))]
    page_size: u64,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginationRequest {
    pub fn new(page_num: u64, page_size: u64) -> Self {
        Self {
            page_num,
            page_size,
        }
    }

    pub fn page_num(&self) -> u64 {
        self.page_num
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of items before this page.
    pub fn skip(&self) -> u64 {
        self.page_num
            .saturating_sub(1)
            .saturating_mul(self.page_size)
    }

    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationResult {
    pub page_num: u64,
    pub page_size: u64,
    pub total: u64,
}

/// One page of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

#[cfg(test)]
mod tests {
    use rocket::form::Form;

    use super::*;

    #[test]
    fn skip_counts_earlier_pages() {
        assert_eq!(PaginationRequest::default().skip(), 0);
        assert_eq!(PaginationRequest::new(3, 20).skip(), 40);
    }

    #[test]
    fn page_size_is_bounded() {
        let parse = |query: &'static str| Form::<PaginationRequest>::parse(query);
        assert_eq!(parse("").unwrap(), PaginationRequest::default());
        assert_eq!(
            parse("page_num=2&page_size=100").unwrap(),
            PaginationRequest::new(2, 100)
        );
        assert!(parse("page_size=0").is_err());
        assert!(parse("page_size=101").is_err());
        assert!(parse("page_num=0").is_err());
    }
}
