use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    form::Form,
};

/// Highest page that still yields an offset representable as `i64`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Page-number pagination, `page` starting from 1.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Reads `page` and `limit`; anything missing or unparsable falls back
    /// to the defaults.
    pub fn from_form(form: &Form, default_page_size: i64) -> Self {
        let page = form.get_number::<i64>("page").filter(|p| *p > 0).unwrap_or(1);
        let page_size = form
            .get_number::<i64>("limit")
            .filter(|l| *l > 0)
            .unwrap_or(default_page_size);

        Self::new(page, page_size)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub page: i64,
    pub page_size: i64,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, pagination: Pagination) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows, pagination);
        }

        let seen = pagination.offset().saturating_add(pagination.page_size);
        let next_page = (seen < total_rows).then_some(pagination.page + 1);
        let prev_page = (pagination.page > 1).then_some(pagination.page - 1);

        Self {
            rows,
            total_rows,
            page: pagination.page,
            page_size: pagination.page_size,
            next_page,
            prev_page,
        }
    }

    /// An empty page. `total_rows` is kept so a caller that paged past the
    /// end can still see how many rows exist.
    pub fn no_rows(total_rows: i64, pagination: Pagination) -> Self {
        Self {
            rows: vec![],
            total_rows,
            page: pagination.page,
            page_size: pagination.page_size,
            next_page: None,
            prev_page: (pagination.page > 1).then_some(pagination.page - 1),
        }
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            rows: self.rows.into_iter().map(f).collect(),
            total_rows: self.total_rows,
            page: self.page,
            page_size: self.page_size,
            next_page: self.next_page,
            prev_page: self.prev_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[rstest]
    #[case(&[], 1, 6)]
    #[case(&[("page", "3"), ("limit", "10")], 3, 10)]
    #[case(&[("page", "zero"), ("limit", "-1")], 1, 6)]
    #[case(&[("page", "0")], 1, 6)]
    #[case(&[("limit", "1000")], 1, 100)]
    #[case(&[("page", "9223372036854775807")], MAX_PAGE, 6)]
    fn reads_page_and_limit(
        #[case] pairs: &[(&str, &str)],
        #[case] page: i64,
        #[case] page_size: i64,
    ) {
        let pagination = Pagination::from_form(&form(pairs), DEFAULT_PAGE_SIZE);
        assert_eq!(pagination, Pagination { page, page_size });
    }

    #[rstest]
    fn offset_follows_page() {
        assert_eq!(Pagination::new(3, 10).offset(), 20);
        assert_eq!(Pagination::new(1, 10).offset(), 0);
    }

    #[rstest]
    fn huge_page_keeps_offset_in_range() {
        let pagination = Pagination::new(i64::MAX, MAX_PAGE_SIZE);
        assert!(pagination.offset() >= 0);

        let page = PageContext::from_rows(vec![1], 10, pagination);
        assert_eq!(page.next_page, None);
        assert_eq!(page.prev_page, Some(MAX_PAGE - 1));
    }

    #[rstest]
    fn links_neighbouring_pages() {
        let page = PageContext::from_rows(vec![1, 2], 5, Pagination::new(2, 2));
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.prev_page, Some(1));

        let last = PageContext::from_rows(vec![5], 5, Pagination::new(3, 2));
        assert_eq!(last.next_page, None);
    }

    #[rstest]
    fn empty_page_has_no_next() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, Pagination::default());
        assert!(page.rows.is_empty());
        assert_eq!(page.next_page, None);
        assert_eq!(page.prev_page, None);
    }
}
