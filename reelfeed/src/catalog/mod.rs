//! Upstream content catalog.
//!
//! The catalog is paginated by an opaque cursor. The controller decides
//! *when* to fetch (see [`PageRequest`]); a [`CatalogClient`] performs the
//! fetch off the event loop and the result is fed back as an event.
//!
//! Failures are surfaced to the UI as [`CatalogError`] and are never retried
//! automatically.

mod memory;

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use thiserror::Error;

use crate::feed::FeedItem;

pub use memory::InMemoryCatalog;

/// Boxed future returned by dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One page of catalog results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogPage {
    pub items: Vec<FeedItem>,

    /// Cursor for the following page.
    #[serde(default)]
    pub next_cursor: Option<String>,

    /// Whether more pages exist.
    pub has_more: bool,
}

impl CatalogPage {
    pub fn new(items: Vec<FeedItem>, next_cursor: Option<String>, has_more: bool) -> Self {
        Self {
            items,
            next_cursor,
            has_more,
        }
    }
}

/// A fetch the controller wants performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Cursor to pass to the catalog (`None` for the first page).
    pub cursor: Option<String>,
}

/// Errors from a catalog fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The catalog answered with a non-success status.
    #[error("Catalog returned HTTP {status}")]
    Http { status: u16 },

    /// The request did not complete.
    #[error("Catalog request failed: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("Invalid catalog response: {0}")]
    InvalidResponse(String),

    /// The fetch was abandoned because the feed shut down.
    #[error("Catalog fetch cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::InvalidResponse(err.to_string())
    }
}

/// Client for the paginated content catalog.
///
/// Uses [`BoxFuture`] so the client can be held as `Arc<dyn CatalogClient>`.
pub trait CatalogClient: Send + Sync {
    /// Fetch the page starting at `cursor` (`None` for the first page).
    fn fetch_page(
        &self,
        cursor: Option<String>,
    ) -> BoxFuture<'_, Result<CatalogPage, CatalogError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_deserializes_without_cursor() {
        let json = r#"{
            "items": [{"id": "a", "sources": [{"url": "https://cdn/a.m3u8"}]}],
            "has_more": false
        }"#;
        let page: CatalogPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_cursor.is_none());
        assert!(!page.has_more);
    }

    #[test]
    fn test_invalid_json_maps_to_invalid_response() {
        let err: CatalogError = serde_json::from_str::<CatalogPage>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, CatalogError::InvalidResponse(_)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            CatalogError::Http { status: 503 }.to_string(),
            "Catalog returned HTTP 503"
        );
    }
}
