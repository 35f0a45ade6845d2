//! Pagination and ordering requests

use serde::{Deserialize, Serialize};

/// Offset/limit pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Page {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl Page {
    pub fn new(offset: Option<usize>, limit: Option<usize>) -> Self {
        Self { offset, limit }
    }

    pub fn limit(limit: usize) -> Self {
        Self {
            offset: None,
            limit: Some(limit),
        }
    }

    /// Apply the window to an in-memory result set
    pub fn apply<T>(&self, mut rows: Vec<T>) -> Vec<T> {
        let offset = self.offset.unwrap_or(0);
        if offset > 0 {
            rows = if offset >= rows.len() {
                Vec::new()
            } else {
                rows.split_off(offset)
            };
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Single-field ordering request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_apply() {
        let rows = vec![1, 2, 3, 4, 5];
        assert_eq!(Page::new(Some(1), Some(2)).apply(rows.clone()), vec![2, 3]);
        assert_eq!(Page::limit(2).apply(rows.clone()), vec![1, 2]);
        assert_eq!(Page::new(Some(10), None).apply(rows.clone()), Vec::<i32>::new());
        assert_eq!(Page::default().apply(rows.clone()), rows);
    }
}
