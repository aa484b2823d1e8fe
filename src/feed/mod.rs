//! Podcast feed handling: reading, normalizing, regenerating and fetching.
//!
//! - **Model**: the canonical [`PodcastFeed`] / [`Episode`] values and the
//!   editor's [`FeedEdit`] payload
//! - **Normalizing**: RSS/Atom bytes to a [`PodcastFeed`], substituting
//!   defaults instead of rejecting incomplete feeds
//! - **Serializing**: a [`PodcastFeed`] back to an RSS 2.0 document
//! - **Fetching**: downloading a feed by URL for the HTTP layer
//!
//! # Architecture
//!
//! - [`source`] - tolerant `quick-xml` scan into loosely-typed records
//! - [`normalizer`] - field resolution and default substitution
//! - [`serializer`] - RSS 2.0 writer
//! - [`model`] - shared value types
//! - [`fetcher`] - HTTP download with retries and size limits
//!
//! Everything except the fetcher is synchronous and free of I/O.
//!
//! # Example
//!
//! ```
//! use podcast_feed_editor::feed::{normalize, serialize};
//!
//! let feed = normalize(br#"<rss version="2.0"><channel><title>Show</title></channel></rss>"#)?;
//! assert_eq!(feed.title, "Show");
//!
//! let xml = serialize(&feed)?;
//! assert!(xml.starts_with("<?xml"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod fetcher;
pub mod model;
pub mod normalizer;
pub mod serializer;
pub mod source;

pub use fetcher::{build_client, FetchError, Fetcher};
pub use model::{
    Episode, EpisodeEdit, FeedEdit, PodcastFeed, DEFAULT_EPISODE_TITLE, DEFAULT_PODCAST_TITLE,
};
pub use normalizer::{normalize, resolve_image};
pub use serializer::{serialize, SerializeError, ENCLOSURE_TYPE};
pub use source::{ImageField, ParseError};
