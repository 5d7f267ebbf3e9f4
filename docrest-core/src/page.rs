//! Pagination parameters carried by a query descriptor.

use serde::{Deserialize, Serialize};

/// Parameters for paginating through large result sets.
///
/// Pages are 1-indexed on the find path (page 1 is the first page).
///
/// # Example
///
/// ```ignore
/// use docrest_core::page::PaginationParams;
///
/// let params = PaginationParams::new(2, 50);
/// assert_eq!(params.offset(), 50);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// The page number.
    pub page: u64,
    /// Number of items per page.
    pub limit: u64,
}

impl PaginationParams {
    /// Creates new pagination parameters.
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }

    /// The number of items to skip on the find path: `(page - 1) * limit`.
    ///
    /// Page `0` is treated as page `1`.
    pub fn offset(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.limit)
    }

    /// The number of items to skip on the raw aggregation path: `page * limit`.
    ///
    /// The aggregation flavor counts pages from zero.
    pub fn aggregate_skip(&self) -> u64 {
        self.page.saturating_mul(self.limit)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}
