//! Regenerates an RSS 2.0 document from a [`PodcastFeed`].

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use thiserror::Error;

use super::model::{Episode, PodcastFeed};

/// MIME type written on every enclosure. The asset type is not inspected.
pub const ENCLOSURE_TYPE: &str = "audio/mpeg";

/// Writing the document failed.
///
/// `InvalidChar` is raised before anything is written when a field holds a
/// character XML 1.0 cannot carry. The other variants come from the
/// in-memory writer and only surface on a broken invariant.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// C0 controls other than tab, LF and CR, and U+FFFE/U+FFFF.
    #[error("{field} contains character U+{code:04X}, which XML 1.0 does not allow")]
    InvalidChar { field: String, code: u32 },

    #[error("Failed to write RSS document: {0}")]
    Write(#[from] std::io::Error),

    #[error("Generated RSS contains invalid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Serializes `feed` as an RSS 2.0 document with a UTF-8 XML declaration.
///
/// Element order is fixed: `title`, `description`, the optional `image`
/// block, then one `item` per episode. Inside an item, `link` is written only
/// when non-empty and `enclosure` only when an enclosure URL is set, always
/// last. The output is deterministic for a given feed.
///
/// Characters are never dropped or replaced: a feed holding an XML-illegal
/// character fails with [`SerializeError::InvalidChar`] naming the field.
pub fn serialize(feed: &PodcastFeed) -> Result<String, SerializeError> {
    check_feed(feed)?;

    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", &feed.title)?;
    write_text_element(&mut writer, "description", &feed.description)?;

    if let Some(ref image) = feed.image {
        writer.write_event(Event::Start(BytesStart::new("image")))?;
        write_text_element(&mut writer, "url", image)?;
        write_text_element(&mut writer, "title", &feed.title)?;
        write_text_element(&mut writer, "link", "")?;
        writer.write_event(Event::End(BytesEnd::new("image")))?;
    }

    for episode in &feed.episodes {
        write_item(&mut writer, episode)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

fn write_item(writer: &mut Writer<Cursor<Vec<u8>>>, episode: &Episode) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;
    write_text_element(writer, "title", &episode.title)?;
    write_text_element(writer, "description", &episode.description)?;

    if !episode.link.is_empty() {
        write_text_element(writer, "link", &episode.link)?;
    }

    if let Some(ref url) = episode.enclosure_url {
        let mut enclosure = BytesStart::new("enclosure");
        enclosure.push_attribute(("url", url.as_str()));
        enclosure.push_attribute(("type", ENCLOSURE_TYPE));
        writer.write_event(Event::Empty(enclosure))?;
    }

    writer.write_event(Event::End(BytesEnd::new("item")))
}

fn check_feed(feed: &PodcastFeed) -> Result<(), SerializeError> {
    check_text("title", &feed.title)?;
    check_text("description", &feed.description)?;
    if let Some(ref image) = feed.image {
        check_text("image", image)?;
    }
    for (i, episode) in feed.episodes.iter().enumerate() {
        let field = |name: &str| format!("episodes[{i}].{name}");
        check_text(field("title"), &episode.title)?;
        check_text(field("description"), &episode.description)?;
        check_text(field("link"), &episode.link)?;
        if let Some(ref url) = episode.enclosure_url {
            check_text(field("enclosure_url"), url)?;
        }
    }
    Ok(())
}

fn check_text(field: impl Into<String>, text: &str) -> Result<(), SerializeError> {
    match text.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(SerializeError::InvalidChar {
            field: field.into(),
            code: u32::from(c),
        }),
        None => Ok(()),
    }
}

/// The XML 1.0 `Char` production. Surrogates cannot occur in a `str`.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Writes `<name>text</name>`, keeping the start/end pair for empty text.
fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    if !text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))
}
