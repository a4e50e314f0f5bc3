//! Pagination types shared by listing operations

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;

/// Offset-based pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Number of rows to skip
    #[serde(default)]
    pub skip: i64,
    /// Maximum number of rows to return
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl Page {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }

    /// First page with the configured default size
    pub fn first(config: &PaginationConfig) -> Self {
        Self {
            skip: 0,
            limit: config.default_limit,
        }
    }

    /// Clamp the limit into `1..=max_limit` and the offset to non-negative
    pub fn clamped(self, config: &PaginationConfig) -> Self {
        Self {
            skip: self.skip.max(0),
            limit: self.limit.clamp(1, config.max_limit.max(1)),
        }
    }

    pub fn offset(&self) -> i64 {
        self.skip
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }
}

/// One page of results together with the unpaginated total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            items,
            total,
            skip: page.skip,
            limit: page.limit,
        }
    }

    /// Check if rows remain after this page
    pub fn has_next(&self) -> bool {
        self.skip + (self.items.len() as i64) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped() {
        let config = PaginationConfig {
            default_limit: 10,
            max_limit: 50,
        };

        assert_eq!(Page::new(5, 500).clamped(&config), Page::new(5, 50));
        assert_eq!(Page::new(0, 0).clamped(&config), Page::new(0, 1));
        assert_eq!(Page::new(-3, 5).clamped(&config), Page::new(0, 5));
        assert_eq!(Page::first(&config), Page::new(0, 10));
    }

    #[test]
    fn test_has_next() {
        let result = PagedResult::new(vec![1, 2], 5, Page::new(0, 2));
        assert!(result.has_next());

        let result = PagedResult::new(vec![5], 5, Page::new(4, 2));
        assert!(!result.has_next());
    }

    #[test]
    fn test_deserialize_defaults() {
        let page: Page = serde_json::from_str("{}").unwrap();
        assert_eq!(page, Page::default());
    }
}
