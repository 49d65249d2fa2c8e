//! Feed content model.
//!
//! A feed is an append-only sequence of [`FeedItem`]s addressed by
//! [`FeedPosition`]. Items are immutable once appended: the sequence is never
//! reordered and an item is never replaced in place.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Index into the feed sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct FeedPosition(pub usize);

impl FeedPosition {
    /// Creates a new position.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Position `delta` items away, or `None` if it would fall before 0.
    pub fn offset(&self, delta: isize) -> Option<Self> {
        self.0.checked_add_signed(delta).map(Self)
    }

    /// Absolute distance between two positions.
    pub fn distance(&self, other: FeedPosition) -> usize {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for FeedPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for FeedPosition {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Unique identifier of a feed item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an item id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One candidate stream for a feed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Manifest or progressive URL handed to the decoding engine.
    pub url: String,

    /// MIME type advertised by the catalog, if any.
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl MediaSource {
    /// Creates a source with no MIME hint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: None,
        }
    }

    /// Sets the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Immutable content payload for one feed position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Unique id across the whole feed.
    pub id: ItemId,

    /// Candidate sources in preference order.
    pub sources: Vec<MediaSource>,

    /// Poster image shown before first frame and as the exhausted fallback.
    #[serde(default)]
    pub thumbnail_url: Option<String>,

    /// Free-form metadata (caption, author, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl FeedItem {
    /// Creates an item with a single source.
    pub fn new(id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(id),
            sources: vec![MediaSource::new(source_url)],
            thumbnail_url: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds another candidate source after the existing ones.
    pub fn with_source(mut self, source: MediaSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Sets the poster image.
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Source to use for the given candidate index, wrapping around.
    pub fn source(&self, candidate: usize) -> Option<&MediaSource> {
        if self.sources.is_empty() {
            None
        } else {
            self.sources.get(candidate % self.sources.len())
        }
    }
}

/// The ordered, append-only item sequence.
#[derive(Debug, Default)]
pub struct FeedSequence {
    items: Vec<FeedItem>,
    ids: HashSet<ItemId>,
}

impl FeedSequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loaded items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been loaded yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at a position.
    pub fn get(&self, position: FeedPosition) -> Option<&FeedItem> {
        self.items.get(position.index())
    }

    /// Position of the item with the given id.
    pub fn position_of(&self, id: &ItemId) -> Option<FeedPosition> {
        if !self.ids.contains(id) {
            return None;
        }
        self.items
            .iter()
            .position(|item| &item.id == id)
            .map(FeedPosition)
    }

    /// Last valid position, if any.
    pub fn last_position(&self) -> Option<FeedPosition> {
        self.items.len().checked_sub(1).map(FeedPosition)
    }

    /// Appends items, skipping ids that are already present.
    ///
    /// Returns the number of items actually appended.
    pub fn append(&mut self, items: Vec<FeedItem>) -> usize {
        let mut appended = 0;
        for item in items {
            if self.ids.contains(&item.id) {
                tracing::warn!(item_id = %item.id, "Dropping duplicate feed item");
                continue;
            }
            self.ids.insert(item.id.clone());
            self.items.push(item);
            appended += 1;
        }
        appended
    }
}
