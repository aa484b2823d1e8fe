//! Canonical podcast model shared by the normalizer, the editor API and the
//! serializer.
//!
//! The serde representation of [`PodcastFeed`] is the transport record the
//! editor client reads: `{title, description, image, episodes: [{title,
//! description, link, published, image, enclosure_url}]}`. Absent optional
//! values are written as `null`, never omitted.

use serde::{Deserialize, Serialize};

/// Title substituted when a feed has no usable title.
pub const DEFAULT_PODCAST_TITLE: &str = "Untitled podcast";

/// Title substituted when an episode has no usable title.
pub const DEFAULT_EPISODE_TITLE: &str = "Untitled episode";

/// One feed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Never empty; see [`DEFAULT_EPISODE_TITLE`].
    pub title: String,
    pub description: String,
    /// Empty when the source had no link.
    pub link: String,
    /// Raw date text as found in the source. Never parsed.
    pub published: Option<String>,
    pub image: Option<String>,
    pub enclosure_url: Option<String>,
}

/// A podcast show and its episodes in feed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastFeed {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub episodes: Vec<Episode>,
}

impl Default for PodcastFeed {
    fn default() -> Self {
        Self {
            title: DEFAULT_PODCAST_TITLE.to_string(),
            description: String::new(),
            image: None,
            episodes: Vec::new(),
        }
    }
}

impl Default for Episode {
    fn default() -> Self {
        Self {
            title: DEFAULT_EPISODE_TITLE.to_string(),
            description: String::new(),
            link: String::new(),
            published: None,
            image: None,
            enclosure_url: None,
        }
    }
}

/// Returns the value unless it is absent or blank.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Edit payload submitted by the editor client.
///
/// Every field is optional; unknown fields (the client sends bookkeeping
/// such as `id` and `skip`) are ignored. Non-string values are rejected by
/// deserialization, so nothing loosely typed reaches [`PodcastFeed`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub episodes: Vec<EpisodeEdit>,
}

/// Per-episode part of a [`FeedEdit`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EpisodeEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub image: Option<String>,
    pub enclosure_url: Option<String>,
}

impl FeedEdit {
    /// Builds a new canonical feed, substituting the same defaults the
    /// normalizer uses.
    ///
    /// - blank titles become [`DEFAULT_PODCAST_TITLE`] / [`DEFAULT_EPISODE_TITLE`]
    /// - absent descriptions and links become `""`
    /// - blank `image`, `enclosure_url` and `published` become `None`
    pub fn into_feed(self) -> PodcastFeed {
        PodcastFeed {
            title: non_empty(self.title).unwrap_or_else(|| DEFAULT_PODCAST_TITLE.to_string()),
            description: self.description.unwrap_or_default(),
            image: non_empty(self.image),
            episodes: self.episodes.into_iter().map(EpisodeEdit::into_episode).collect(),
        }
    }
}

impl EpisodeEdit {
    pub fn into_episode(self) -> Episode {
        Episode {
            title: non_empty(self.title).unwrap_or_else(|| DEFAULT_EPISODE_TITLE.to_string()),
            description: self.description.unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            published: non_empty(self.published),
            image: non_empty(self.image),
            enclosure_url: non_empty(self.enclosure_url),
        }
    }
}
