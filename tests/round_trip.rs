//! Integration tests for regenerating feeds: documents written by the
//! serializer read back to the same feed, and real-world shaped feeds survive
//! a normalize → serialize → normalize cycle.

use podcast_feed_editor::feed::{normalize, serialize, Episode, PodcastFeed, SerializeError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Trimmed text mixing XML-reserved characters, multi-byte UTF-8 and interior
/// tabs and newlines. The reader trims values, so both ends are non-blank.
fn text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9&<>'\"éß日本🎙]\
     ([A-Za-z0-9 \t\n&<>'\"éß日本🎙\u{a0}]{0,30}\
     [A-Za-z0-9&<>'\"éß日本🎙])?"
}

/// Characters outside the XML 1.0 `Char` production that a `str` can hold.
fn illegal_char() -> impl Strategy<Value = char> {
    prop_oneof![
        proptest::char::range('\u{0}', '\u{8}'),
        Just('\u{b}'),
        Just('\u{c}'),
        proptest::char::range('\u{e}', '\u{1f}'),
        Just('\u{fffe}'),
        Just('\u{ffff}'),
    ]
}

fn optional_text() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), text()]
}

fn url() -> impl Strategy<Value = String> {
    "https://[a-z]{1,10}\\.example/[a-z0-9]{0,10}(\\?a=[0-9]{1,3}&b=[a-z]{1,3})?"
}

fn episode() -> impl Strategy<Value = Episode> {
    (
        text(),
        optional_text(),
        prop_oneof![Just(String::new()), url()],
        proptest::option::of(url()),
    )
        .prop_map(|(title, description, link, enclosure_url)| Episode {
            title,
            description,
            link,
            published: None,
            image: None,
            enclosure_url,
        })
}

fn feed() -> impl Strategy<Value = PodcastFeed> {
    (
        text(),
        optional_text(),
        proptest::option::of(url()),
        proptest::collection::vec(episode(), 0..6),
    )
        .prop_map(|(title, description, image, episodes)| PodcastFeed {
            title,
            description,
            image,
            episodes,
        })
}

proptest! {
    #[test]
    fn serialized_feed_reads_back_unchanged(feed in feed()) {
        let xml = serialize(&feed).unwrap();
        let reread = normalize(xml.as_bytes()).unwrap();
        prop_assert_eq!(reread, feed);
    }

    #[test]
    fn serialize_is_stable_after_one_cycle(feed in feed()) {
        let first = serialize(&feed).unwrap();
        let second = serialize(&normalize(first.as_bytes()).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn illegal_characters_are_rejected(
        mut feed in feed(),
        bad in illegal_char(),
        at in 0usize..3,
    ) {
        let expected = match (at, feed.episodes.first_mut()) {
            (1, Some(episode)) => {
                episode.title.push(bad);
                "episodes[0].title"
            }
            (2, Some(episode)) => {
                episode.description.insert(0, bad);
                "episodes[0].description"
            }
            _ => {
                feed.description.push(bad);
                "description"
            }
        };

        match serialize(&feed) {
            Err(SerializeError::InvalidChar { field, code }) => {
                prop_assert_eq!(field, expected);
                prop_assert_eq!(code, u32::from(bad));
            }
            other => prop_assert!(false, "expected InvalidChar, got {:?}", other),
        }
    }
}

#[test]
fn test_podcast_feed_regenerates_as_rss2() {
    let source = br#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Tech Talk</title>
    <itunes:subtitle>Short and sweet</itunes:subtitle>
    <description>Weekly tech news</description>
    <itunes:image href="https://example.com/cover.jpg"/>
    <item>
      <title>Episode 1</title>
      <itunes:summary>First episode</itunes:summary>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
      <itunes:image href="https://example.com/ep1.jpg"/>
      <enclosure url="https://example.com/ep1.mp3" type="audio/x-m4a" length="1"/>
    </item>
  </channel>
</rss>"#;

    let feed = normalize(source).unwrap();
    let xml = serialize(&feed).unwrap();

    assert_eq!(
        xml,
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<rss version="2.0"><channel>"#,
            r#"<title>Tech Talk</title><description>Short and sweet</description>"#,
            r#"<image><url>https://example.com/cover.jpg</url><title>Tech Talk</title><link></link></image>"#,
            r#"<item><title>Episode 1</title><description>First episode</description>"#,
            r#"<enclosure url="https://example.com/ep1.mp3" type="audio/mpeg"/></item>"#,
            r#"</channel></rss>"#
        )
    );

    // Publication date and episode artwork are not written back.
    let reread = normalize(xml.as_bytes()).unwrap();
    assert_eq!(reread.episodes[0].published, None);
    assert_eq!(reread.episodes[0].image, None);
    assert_eq!(reread.title, feed.title);
    assert_eq!(reread.image, feed.image);
}

#[test]
fn test_atom_feed_regenerates_as_rss2() {
    let source = br#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Cast</title>
  <subtitle>An Atom podcast</subtitle>
  <logo>https://example.com/logo.png</logo>
  <entry>
    <title>Pilot</title>
    <summary>The first one</summary>
    <link rel="alternate" href="https://example.com/pilot"/>
    <link rel="enclosure" href="https://example.com/pilot.mp3" type="audio/mpeg"/>
    <published>2024-01-01T00:00:00Z</published>
  </entry>
</feed>"#;

    let feed = normalize(source).unwrap();
    let xml = serialize(&feed).unwrap();

    assert!(xml.contains("<title>Atom Cast</title><description>An Atom podcast</description>"));
    assert!(xml.contains("<url>https://example.com/logo.png</url>"));
    assert!(xml.contains(
        "<item><title>Pilot</title><description>The first one</description>\
         <link>https://example.com/pilot</link>\
         <enclosure url=\"https://example.com/pilot.mp3\" type=\"audio/mpeg\"/></item>"
    ));
}
