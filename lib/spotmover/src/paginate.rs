use serde::Deserialize;
use std::future::Future;
use tracing::debug;

use crate::error::Result;

/// One page of a remote listing. `next` points at the following page and is
/// absent on the last one.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total: Option<usize>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next: None,
            total: None,
        }
    }
}

/// Collects every item of a listing, starting from its first page and
/// requesting `next_page` until the catalog reports no further page. Page
/// sizes are whatever the catalog hands back.
pub async fn fetch_all<T, F, Fut>(first: Page<T>, mut next_page: F) -> Result<Vec<T>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = first.items;
    if let Some(total) = first.total {
        items.reserve(total.saturating_sub(items.len()));
    }

    let mut next = first.next;
    while let Some(cursor) = next {
        debug!("Fetching next page: {}", cursor);
        let page = next_page(cursor).await?;
        items.extend(page.items);
        next = page.next;
    }

    Ok(items)
}
