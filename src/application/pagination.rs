//! Numbered pagination for feeds.

use std::num::NonZeroU32;

use serde::Serialize;

/// Posts per feed page.
pub const PAGE_SIZE: u32 = 10;

/// A 1-based page number taken from `?page=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageNumber(NonZeroU32);

impl PageNumber {
    pub const FIRST: PageNumber = PageNumber(NonZeroU32::MIN);

    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Missing, zero, negative or non-numeric input all mean the first page.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.trim().parse::<u32>().ok())
            .and_then(Self::new)
            .unwrap_or(Self::FIRST)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

impl std::fmt::Display for PageNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: PageNumber,
    pub size: u32,
}

impl PageRequest {
    pub fn new(number: PageNumber, size: u32) -> Self {
        Self {
            number,
            size: size.max(1),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number.get() - 1) * i64::from(self.size)
    }
}

/// One page of results plus enough counts to draw a paginator.
#[derive(Debug, Clone, Serialize)]
pub struct NumberedPage<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub page_size: u32,
    pub total_count: u64,
}

impl<T> NumberedPage<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        Self {
            items,
            number: request.number.get(),
            page_size: request.size,
            total_count,
        }
    }

    /// An empty listing still has one (empty) page.
    pub fn total_pages(&self) -> u32 {
        let size = u64::from(self.page_size.max(1));
        let pages = self.total_count.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> NumberedPage<U> {
        NumberedPage {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            page_size: self.page_size,
            total_count: self.total_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_falls_back_to_first_page() {
        assert_eq!(PageNumber::parse(None), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(Some("0")), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(Some("-3")), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(Some("abc")), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(Some("3")).get(), 3);
    }

    #[test]
    fn request_offsets() {
        let request = PageRequest::new(PageNumber::parse(Some("3")), PAGE_SIZE);
        assert_eq!(request.offset(), 20);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn page_counts() {
        let request = PageRequest::new(PageNumber::FIRST, PAGE_SIZE);
        let page = NumberedPage::new(vec![1; 10], request, 13);
        assert_eq!(page.total_pages(), 2);
        assert!(page.has_next());
        assert!(!page.has_previous());

        let empty: NumberedPage<u8> = NumberedPage::new(Vec::new(), request, 0);
        assert_eq!(empty.total_pages(), 1);
        assert!(!empty.has_next());
    }
}
