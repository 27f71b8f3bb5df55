use serde::Serialize;

use crate::error::{CatalogError, CatalogResult};
use crate::models::Paged;

/// TMDB refuses pages past this one.
pub const MAX_PAGE: u32 = 500;

pub fn validate_page(page: u32) -> CatalogResult<u32> {
    if page == 0 || page > MAX_PAGE {
        return Err(CatalogError::InvalidRequest(format!(
            "page must be between 1 and {MAX_PAGE}, got {page}"
        )));
    }
    Ok(page)
}

/// Prev/next state of a paginated view once the total is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pager {
    pub page: u32,
    pub total_pages: u32,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl Pager {
    pub fn new(page: u32, total_pages: u32) -> Self {
        let total_pages = total_pages.min(MAX_PAGE);
        let prev_page = (page > 1).then(|| page - 1);
        let next_page = (page < total_pages).then(|| page + 1);
        Self {
            page,
            total_pages,
            prev_page,
            next_page,
        }
    }

    pub fn of<T>(paged: &Paged<T>) -> Self {
        Self::new(paged.page, paged.total_pages)
    }

    pub fn prev(&self) -> Option<Pager> {
        self.prev_page.map(|p| Pager::new(p, self.total_pages))
    }

    pub fn next(&self) -> Option<Pager> {
        self.next_page.map(|p| Pager::new(p, self.total_pages))
    }

    /// Rejects a page the known total says does not exist.
    pub fn check(&self, page: u32) -> CatalogResult<u32> {
        validate_page(page)?;
        if self.total_pages > 0 && page > self.total_pages {
            return Err(CatalogError::InvalidRequest(format!(
                "page {page} is past the last page ({})",
                self.total_pages
            )));
        }
        Ok(page)
    }
}
