pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("page must be at least 1")]
    PageOutOfRange,
    #[error("page size must be between 1 and {max}, got {actual}")]
    PageSizeOutOfRange { actual: usize, max: usize },
}

/// A 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: usize,
    page_size: usize,
}

impl Pagination {
    pub fn new(page: usize, page_size: usize) -> Result<Self, PageError> {
        Self::with_max(page, page_size, MAX_PAGE_SIZE)
    }

    pub fn with_max(page: usize, page_size: usize, max: usize) -> Result<Self, PageError> {
        if page == 0 {
            return Err(PageError::PageOutOfRange);
        }
        if page_size == 0 || page_size > max {
            return Err(PageError::PageSizeOutOfRange {
                actual: page_size,
                max,
            });
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Number of pages for `total` items; an empty listing still has one page.
    pub fn page_count(&self, total: usize) -> usize {
        if total == 0 {
            1
        } else {
            total.div_ceil(self.page_size)
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
