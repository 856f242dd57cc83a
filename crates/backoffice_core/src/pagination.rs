use std::{fmt, num::NonZeroU32, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `per_page` sent when the user picks "All". The backend is never asked for
/// an unpaginated listing; it gets one very large page instead.
pub const ALL_PAGE_SIZE: u32 = 99_999;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("page size must be positive, 0 or -1 (all); got {0}")]
    InvalidPageSize(i64),
    #[error("unrecognized page size '{0}'")]
    Unparseable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSize {
    Fixed(NonZeroU32),
    All,
}

impl PageSize {
    pub fn fixed(size: u32) -> Result<Self, PaginationError> {
        NonZeroU32::new(size)
            .map(PageSize::Fixed)
            .ok_or(PaginationError::InvalidPageSize(0))
    }

    /// Page-size pickers report "All" as `0`; older screens used `-1`.
    pub fn from_ui(value: i64) -> Result<Self, PaginationError> {
        match value {
            0 | -1 => Ok(PageSize::All),
            n if n > 0 => u32::try_from(n)
                .ok()
                .and_then(NonZeroU32::new)
                .map(PageSize::Fixed)
                .ok_or(PaginationError::InvalidPageSize(n)),
            n => Err(PaginationError::InvalidPageSize(n)),
        }
    }

    pub fn per_page(self) -> u32 {
        match self {
            PageSize::Fixed(size) => size.get(),
            PageSize::All => ALL_PAGE_SIZE,
        }
    }

    pub fn is_all(self) -> bool {
        matches!(self, PageSize::All)
    }

    /// Choices offered by page-size pickers.
    pub fn options() -> Vec<PageSize> {
        [10, 25, 50, 100]
            .into_iter()
            .filter_map(|n| PageSize::fixed(n).ok())
            .chain([PageSize::All])
            .collect()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Fixed(NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN))
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSize::Fixed(size) => write!(f, "{size}"),
            PageSize::All => f.write_str("all"),
        }
    }
}

impl FromStr for PageSize {
    type Err = PaginationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("all") {
            return Ok(PageSize::All);
        }
        let value = raw
            .parse::<i64>()
            .map_err(|_| PaginationError::Unparseable(raw.to_string()))?;
        PageSize::from_ui(value)
    }
}

/// Current page and page size of one list screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    current_page: u32,
    page_size: PageSize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(PageSize::default())
    }
}

impl Pagination {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            current_page: 1,
            page_size,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// Moves to `page` (clamped to 1). Page size is left alone.
    pub fn set_page(&mut self, page: u32) {
        self.current_page = page.max(1);
    }

    /// Changing the page size always starts over at page 1.
    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.page_size = page_size;
        self.current_page = 1;
    }

    pub fn reset_page(&mut self) {
        self.current_page = 1;
    }

    /// Page number that goes on the wire; "All" always asks for page 1.
    pub fn request_page(&self) -> u32 {
        if self.page_size.is_all() {
            1
        } else {
            self.current_page
        }
    }

    pub fn per_page(&self) -> u32 {
        self.page_size.per_page()
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.request_page() - 1) * u64::from(self.per_page())
    }

    pub fn total_pages(&self, total: u64) -> u32 {
        if total == 0 {
            return 1;
        }
        let pages = total.div_ceil(u64::from(self.per_page()));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_previous(&self) -> bool {
        self.request_page() > 1
    }

    pub fn has_next(&self, total: u64) -> bool {
        self.request_page() < self.total_pages(total)
    }
}

/// Window of `items` a server returns for `page`/`page_size`: at most
/// `page_size` rows starting at `(page - 1) * page_size`.
pub fn slice_page<T>(items: &[T], page: u32, page_size: PageSize) -> &[T] {
    let per_page = page_size.per_page() as usize;
    let page = if page_size.is_all() { 1 } else { page.max(1) };
    let start = (page as usize - 1).saturating_mul(per_page);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
