//! Turns raw feed bytes into the canonical [`PodcastFeed`].
//!
//! Missing or malformed optional fields never fail the parse; they resolve to
//! the defaults documented on each field of the model.

use super::model::{non_empty, Episode, PodcastFeed, DEFAULT_EPISODE_TITLE, DEFAULT_PODCAST_TITLE};
use super::source::{read_feed, ImageField, ParseError, SourceRecord};

/// Parses RSS or Atom bytes into a [`PodcastFeed`].
///
/// # Errors
///
/// Returns [`ParseError`] only when the input cannot be read as a feed at
/// all (not XML, or a non-feed root element).
pub fn normalize(raw: &[u8]) -> Result<PodcastFeed, ParseError> {
    let source = read_feed(raw)?;
    let channel = source.channel;

    Ok(PodcastFeed {
        title: non_empty(channel.title).unwrap_or_else(|| DEFAULT_PODCAST_TITLE.to_string()),
        description: non_empty(channel.subtitle)
            .or_else(|| non_empty(channel.description))
            .unwrap_or_default(),
        image: resolve_image(&channel.image, &channel.itunes_image),
        episodes: source.entries.into_iter().map(normalize_entry).collect(),
    })
}

fn normalize_entry(entry: SourceRecord) -> Episode {
    let image = resolve_image(&entry.image, &entry.itunes_image);
    // Only the first enclosure is kept, even when it carries no URL.
    let enclosure_url = entry
        .enclosures
        .into_iter()
        .next()
        .and_then(|enclosure| enclosure.href);

    Episode {
        title: non_empty(entry.title).unwrap_or_else(|| DEFAULT_EPISODE_TITLE.to_string()),
        description: entry.summary.unwrap_or_default(),
        link: entry.link.unwrap_or_default(),
        published: entry.published,
        image,
        enclosure_url,
    }
}

/// Picks the artwork URL: `image` (href, then plain URL) before
/// `itunes_image` (href, then plain URL).
pub fn resolve_image(image: &ImageField, itunes_image: &ImageField) -> Option<String> {
    image_url(image).or_else(|| image_url(itunes_image))
}

fn image_url(field: &ImageField) -> Option<String> {
    match field {
        ImageField::Href(url) | ImageField::PlainUrl(url) => non_empty(Some(url.clone())),
        ImageField::Absent => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn href(url: &str) -> ImageField {
        ImageField::Href(url.to_string())
    }

    fn plain(url: &str) -> ImageField {
        ImageField::PlainUrl(url.to_string())
    }

    #[test]
    fn test_resolve_image_prefers_image_over_itunes() {
        assert_eq!(resolve_image(&href("A"), &plain("B")), Some("A".to_string()));
        assert_eq!(resolve_image(&plain("A"), &href("B")), Some("A".to_string()));
    }

    #[test]
    fn test_resolve_image_falls_back_to_itunes() {
        assert_eq!(
            resolve_image(&ImageField::Absent, &plain("B")),
            Some("B".to_string())
        );
        assert_eq!(
            resolve_image(&ImageField::Absent, &href("B")),
            Some("B".to_string())
        );
    }

    #[test]
    fn test_resolve_image_absent() {
        assert_eq!(resolve_image(&ImageField::Absent, &ImageField::Absent), None);
    }

    #[test]
    fn test_defaults_for_empty_channel_and_entry() {
        let feed = normalize(b"<rss><channel><item/></channel></rss>").unwrap();

        assert_eq!(feed.title, "Untitled podcast");
        assert_eq!(feed.description, "");
        assert_eq!(feed.image, None);
        assert_eq!(
            feed.episodes,
            vec![Episode {
                title: "Untitled episode".to_string(),
                description: String::new(),
                link: String::new(),
                published: None,
                image: None,
                enclosure_url: None,
            }]
        );
    }

    #[test]
    fn test_channel_description_prefers_subtitle() {
        let feed = normalize(
            br#"<feed xmlns="http://www.w3.org/2005/Atom"><subtitle>Sub</subtitle></feed>"#,
        )
        .unwrap();
        assert_eq!(feed.description, "Sub");

        let feed = normalize(
            br#"<rss><channel><description>Desc</description></channel></rss>"#,
        )
        .unwrap();
        assert_eq!(feed.description, "Desc");
    }

    #[test]
    fn test_guid_and_content_only_episode() {
        let feed = normalize(
            br#"<rss xmlns:content="http://purl.org/rss/1.0/modules/content/"><channel>
<item><guid>https://e.x/ep1</guid><content:encoded>Notes</content:encoded></item>
</channel></rss>"#,
        )
        .unwrap();

        assert_eq!(feed.episodes[0].link, "https://e.x/ep1");
        assert_eq!(feed.episodes[0].description, "Notes");
    }

    #[test]
    fn test_entry_image_fallback_order() {
        let feed = normalize(
            br#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><channel>
<item><image href="A"/><itunes:image>B</itunes:image></item>
<item><itunes:image>B</itunes:image></item>
<item><title>no art</title></item>
</channel></rss>"#,
        )
        .unwrap();

        let images: Vec<Option<&str>> = feed.episodes.iter().map(|e| e.image.as_deref()).collect();
        assert_eq!(images, vec![Some("A"), Some("B"), None]);
    }

    #[test]
    fn test_channel_image_block_beats_itunes_image() {
        let feed = normalize(
            br#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><channel>
<itunes:image href="https://e.x/itunes.jpg"/>
<image><url>https://e.x/rss.jpg</url></image>
</channel></rss>"#,
        )
        .unwrap();
        assert_eq!(feed.image.as_deref(), Some("https://e.x/rss.jpg"));
    }

    #[test]
    fn test_enclosure_first_wins() {
        let feed = normalize(
            br#"<rss><channel><item>
<enclosure url="X" type="audio/mpeg"/>
<enclosure url="Y" type="audio/mpeg"/>
</item></channel></rss>"#,
        )
        .unwrap();
        assert_eq!(feed.episodes[0].enclosure_url.as_deref(), Some("X"));
    }

    #[test]
    fn test_first_enclosure_without_url_yields_none() {
        let feed = normalize(
            br#"<rss><channel><item><enclosure/><enclosure url="Y"/></item></channel></rss>"#,
        )
        .unwrap();
        assert_eq!(feed.episodes[0].enclosure_url, None);
    }

    #[test]
    fn test_link_and_published_pass_through() {
        let feed = normalize(
            br#"<rss><channel><item>
<link>https://e.x/ep?a=1&amp;b=2</link>
<pubDate>sometime last week</pubDate>
</item></channel></rss>"#,
        )
        .unwrap();
        assert_eq!(feed.episodes[0].link, "https://e.x/ep?a=1&b=2");
        assert_eq!(feed.episodes[0].published.as_deref(), Some("sometime last week"));
    }

    #[test]
    fn test_episode_order_preserved() {
        let feed = normalize(
            br#"<rss><channel>
<item><title>3</title></item><item><title>1</title></item><item><title>2</title></item>
</channel></rss>"#,
        )
        .unwrap();
        let titles: Vec<&str> = feed.episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_end_to_end_example() {
        let feed = normalize(
            br#"<rss version="2.0"><channel><item>
<title>Ep1</title>
<enclosure url="http://cdn/ep1.mp3" type="audio/mpeg"/>
</item></channel></rss>"#,
        )
        .unwrap();

        assert_eq!(
            feed,
            PodcastFeed {
                title: "Untitled podcast".to_string(),
                description: String::new(),
                image: None,
                episodes: vec![Episode {
                    title: "Ep1".to_string(),
                    description: String::new(),
                    link: String::new(),
                    published: None,
                    image: None,
                    enclosure_url: Some("http://cdn/ep1.mp3".to_string()),
                }],
            }
        );
    }

    #[test]
    fn test_not_a_feed_is_an_error() {
        assert!(matches!(
            normalize(b"<html><body/></html>"),
            Err(ParseError::NotAFeed(_))
        ));
        assert_eq!(normalize(b"just text"), Err(ParseError::Empty));
    }
}
