//! Page-cursor loop over paginated list endpoints

use std::future::Future;

use super::common::{ApiQueryParams, ListDocument};
use super::error::ApiError;

/// Page size requested from list endpoints
pub const PAGE_SIZE: u32 = 100;

/// Upper bound on pages fetched by one loop
pub const MAX_PAGES: u32 = 1000;

/// Adds `page[number]` and `page[size]` to a query
pub fn page_params(params: ApiQueryParams, page: u32) -> ApiQueryParams {
    params.add("page[number]", page).add("page[size]", PAGE_SIZE)
}

/// Fetches pages starting at page 1 until `current-page >= total-pages`
/// and returns every item in API order. A response without pagination meta
/// is treated as the only page. Fails when the cursor does not advance or
/// when more than [`MAX_PAGES`] pages are requested.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<ListDocument<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    let mut fetched = 0;

    loop {
        if fetched >= MAX_PAGES {
            return Err(ApiError::Pagination(format!(
                "stopped after {} pages",
                MAX_PAGES
            )));
        }

        let document = fetch(page).await?;
        fetched += 1;
        let pagination = document.pagination();
        items.extend(document.data);

        let Some(pagination) = pagination else {
            break;
        };
        if pagination.current_page >= pagination.total_pages {
            break;
        }

        let next = pagination
            .next_page
            .unwrap_or(pagination.current_page + 1);
        if next <= pagination.current_page {
            return Err(ApiError::Pagination(format!(
                "next page {} does not advance past page {}",
                next, pagination.current_page
            )));
        }
        page = next;
    }

    Ok(items)
}
