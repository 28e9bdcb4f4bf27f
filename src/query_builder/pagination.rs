use crate::models::Page;

/// Represents LIMIT/OFFSET parameters for SQL queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Translate a first-result / max-results window; a zero offset is omitted.
    ///
    /// Out-of-range windows are clamped to an empty result rather than
    /// producing SQL the database would reject.
    pub fn from_page(page: Page) -> Self {
        if !page.is_valid() {
            return Self {
                limit: Some(0),
                offset: None,
            };
        }
        Self {
            limit: Some(page.max_results),
            offset: (page.first_result > 0).then_some(page.first_result),
        }
    }

    /// Convert to SQL string
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_first_page() {
        let pagination = Pagination::from_page(Page::first(20_000));
        assert_eq!(pagination.to_sql(), " LIMIT 20000");
    }

    #[test]
    fn test_from_offset_page() {
        let pagination = Pagination::from_page(Page::new(40, 10));
        assert_eq!(pagination.to_sql(), " LIMIT 10 OFFSET 40");
    }

    #[test]
    fn test_invalid_page_selects_nothing() {
        assert_eq!(Pagination::from_page(Page::new(-1, 10)).to_sql(), " LIMIT 0");
        assert_eq!(Pagination::from_page(Page::new(0, 0)).to_sql(), " LIMIT 0");
    }
}
