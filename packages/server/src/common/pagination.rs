//! Offset pagination for list endpoints.
//!
//! ```rust,ignore
//! let page = params.validate();
//! let posts = Post::find_all(&page, pool).await?;
//! ```

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Raw `?limit=&offset=` query arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Pagination arguments after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl PageParams {
    /// Clamp to `1..=MAX_LIMIT` and a non-negative offset.
    pub fn validate(&self) -> Page {
        Page {
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        PageParams::default().validate()
    }
}

/// Page metadata echoed back to clients.
#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub limit: i64,
    pub offset: i64,
    pub count: usize,
}

impl PageInfo {
    pub fn new(page: Page, count: usize) -> Self {
        Self {
            limit: page.limit,
            offset: page.offset,
            count,
        }
    }
}
