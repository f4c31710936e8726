//! Envelopes and query parameters shared by the booking endpoints

use carrent_core::traits::Pagination;
use serde::{Deserialize, Serialize};
use validator::Validate;

const DEFAULT_PER_PAGE: i64 = 20;

/// Body of state-changing endpoints: the resource plus a human-readable note
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse<T> {
    pub data: T,
    pub message: String,
}

impl<T> ActionResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
        }
    }
}

/// `?page=&per_page=`; both optional
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "per_page must be between 1 and 100"))]
    pub per_page: Option<i64>,
}

impl From<&PageQuery> for Pagination {
    fn from(query: &PageQuery) -> Self {
        Pagination::new(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}
