//! In-memory catalog for tests and the simulator.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::{BoxFuture, CatalogClient, CatalogError, CatalogPage};
use crate::feed::FeedItem;

/// Serves a fixed item list in pages; cursors are decimal offsets.
#[derive(Debug)]
pub struct InMemoryCatalog {
    items: Vec<FeedItem>,
    page_size: usize,
    latency: Option<Duration>,

    /// Errors returned by the next fetches, in order.
    failures: Mutex<VecDeque<CatalogError>>,

    fetches: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<FeedItem>, page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
            latency: None,
            failures: Mutex::new(VecDeque::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Catalog of `count` generated items with ids `item-0`, `item-1`, ...
    pub fn generated(count: usize, page_size: usize) -> Self {
        let items = (0..count)
            .map(|i| {
                FeedItem::new(format!("item-{i}"), format!("https://cdn.example/{i}/master.m3u8"))
                    .with_thumbnail(format!("https://cdn.example/{i}/poster.jpg"))
            })
            .collect();
        Self::new(items, page_size)
    }

    /// Delay every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next fetch fail with `error`.
    pub fn fail_next(&self, error: CatalogError) {
        self.failures.lock().push_back(error);
    }

    /// Number of fetches served (including failures).
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn page_at(&self, cursor: Option<&str>) -> Result<CatalogPage, CatalogError> {
        let offset = match cursor {
            None => 0,
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| CatalogError::InvalidResponse(format!("unknown cursor {c:?}")))?,
        };
        let end = (offset + self.page_size).min(self.items.len());
        let items = self.items.get(offset..end).unwrap_or_default().to_vec();
        let has_more = end < self.items.len();
        let next_cursor = has_more.then(|| end.to_string());
        Ok(CatalogPage::new(items, next_cursor, has_more))
    }
}

impl CatalogClient for InMemoryCatalog {
    fn fetch_page(
        &self,
        cursor: Option<String>,
    ) -> BoxFuture<'_, Result<CatalogPage, CatalogError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if let Some(error) = self.failures.lock().pop_front() {
                return Err(error);
            }
            self.page_at(cursor.as_deref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pages_through_items() {
        let catalog = InMemoryCatalog::generated(5, 2);

        let first = catalog.fetch_page(None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));
        assert!(first.has_more);

        let last = catalog.fetch_page(Some("4".into())).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
        assert!(last.next_cursor.is_none());
        assert_eq!(catalog.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let catalog = InMemoryCatalog::generated(5, 2);
        catalog.fail_next(CatalogError::Http { status: 500 });

        assert_eq!(
            catalog.fetch_page(None).await,
            Err(CatalogError::Http { status: 500 })
        );
        assert!(catalog.fetch_page(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_cursor() {
        let catalog = InMemoryCatalog::generated(1, 1);
        assert!(matches!(
            catalog.fetch_page(Some("abc".into())).await,
            Err(CatalogError::InvalidResponse(_))
        ));
    }
}
