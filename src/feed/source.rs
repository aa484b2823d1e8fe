//! Tolerant RSS/Atom reader producing loosely-typed records.
//!
//! The reader walks the document once with `quick-xml` and collects one
//! channel record plus one record per `<item>`/`<entry>`. Every field of a
//! [`SourceRecord`] may be absent; deciding what an absent field means is the
//! normalizer's job, not this module's.
//!
//! Supported roots: `<rss>` (0.9x/2.0), `<feed>` (Atom) and `<rdf:RDF>`
//! (RSS 1.0, where items are siblings of the channel).
//!
//! Once a feed root has been seen, the reader never rejects input: an XML
//! error part way through stops the scan and keeps what was read so far.
//!
//! Documents are decoded with the charset from their BOM or XML declaration
//! (UTF-8 when neither is present). Only ASCII-compatible charsets are
//! supported; UTF-16 input is not.

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use thiserror::Error;

/// The input could not be read as a feed at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// No root element was found (empty input or plain text).
    #[error("No feed found: the document is empty or is not XML")]
    Empty,
    /// The root element is not `rss`, `feed` or `RDF`.
    #[error("Not an RSS or Atom feed: root element is <{0}>")]
    NotAFeed(String),
    /// The XML broke before a root element could be read.
    #[error("Malformed XML: {0}")]
    Xml(String),
}

/// An image reference as it appeared in the source.
///
/// Feeds in the wild carry artwork either as a mapping (`<image><url>`,
/// `<itunes:image href>`, Atom `<logo>`) or as a bare URL in element text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageField {
    #[default]
    Absent,
    /// Element text holding the URL directly.
    PlainUrl(String),
    /// A mapping that carried an `href` (or an RSS `<url>` child).
    Href(String),
}

/// One enclosure reference; `href` is `None` when the element had no URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub href: Option<String>,
}

/// Loosely-typed channel or entry record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub image: ImageField,
    pub itunes_image: ImageField,
    /// Document order.
    pub enclosures: Vec<Enclosure>,
}

/// Channel record plus entry records in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFeed {
    pub channel: SourceRecord,
    pub entries: Vec<SourceRecord>,
}

/// Reads `bytes` into a [`SourceFeed`].
///
/// # Errors
///
/// Fails only when no feed root can be established; see [`ParseError`].
///
/// # Security
///
/// quick-xml (0.37) never expands `<!ENTITY>` declarations, so documents with
/// a DOCTYPE cannot pull in external content. Unknown entities in text are
/// kept as raw text.
pub fn read_feed(bytes: &[u8]) -> Result<SourceFeed, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut scanner = Scanner::default();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf);
        // Refined by the XML declaration, so fetched per event.
        let decoder = reader.decoder();
        match event {
            Ok(Event::Start(e)) => scanner.start(&e, decoder)?,
            Ok(Event::Empty(e)) => {
                scanner.start(&e, decoder)?;
                scanner.end();
            }
            Ok(Event::End(_)) => scanner.end(),
            Ok(Event::Text(e)) if scanner.capturing() => scanner.text(&text_content(&e)),
            Ok(Event::CData(e)) if scanner.capturing() => {
                let text = match decoder.decode(&e) {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                scanner.text(&text)
            }
            Ok(Event::Eof) => break,
            Err(e) if scanner.dialect.is_none() => return Err(ParseError::Xml(e.to_string())),
            // Degrade: keep everything read before the breakage.
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    scanner.finish()
}

fn text_content(e: &BytesText<'_>) -> String {
    match e.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(e).into_owned(),
    }
}

fn attribute(e: &BytesStart<'_>, decoder: Decoder, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(Result::ok)
        .find(|attr| attr.key.local_name().as_ref() == key)
        .map(|attr| match attr.decode_and_unescape_value(decoder) {
            Ok(value) => value.trim().to_string(),
            Err(_) => String::from_utf8_lossy(&attr.value).trim().to_string(),
        })
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Rss,
    Atom,
    Rdf,
}

impl Dialect {
    fn from_root(local: &[u8]) -> Option<Self> {
        match local {
            b"rss" => Some(Self::Rss),
            b"feed" => Some(Self::Atom),
            b"RDF" => Some(Self::Rdf),
            _ => None,
        }
    }

    fn entry_element(self) -> &'static [u8] {
        match self {
            Self::Atom => b"entry",
            Self::Rss | Self::Rdf => b"item",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    Core,
    Itunes,
    Dc,
    /// RSS content module (`content:encoded`).
    Content,
    Other,
}

struct ElementName<'a> {
    ns: Ns,
    local: &'a [u8],
}

impl<'a> ElementName<'a> {
    fn of(e: &'a BytesStart<'_>) -> Self {
        let qname = e.name();
        let ns = match qname.prefix() {
            None => Ns::Core,
            Some(prefix) => match prefix.as_ref() {
                b"atom" => Ns::Core,
                b"itunes" => Ns::Itunes,
                b"dc" => Ns::Dc,
                b"content" => Ns::Content,
                _ => Ns::Other,
            },
        };
        Self {
            ns,
            local: qname.local_name().into_inner(),
        }
    }

    fn is_core(&self, local: &[u8]) -> bool {
        self.ns == Ns::Core && self.local == local
    }
}

/// A field value tagged with the rank of the alias that produced it.
/// Lower ranks win; equal ranks keep the first value seen.
struct Ranked<T>(Option<(u8, T)>);

impl<T> Default for Ranked<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> Ranked<T> {
    fn offer(&mut self, rank: u8, value: T) {
        if self.0.as_ref().map_or(true, |(held, _)| rank < *held) {
            self.0 = Some((rank, value));
        }
    }

    fn into_inner(self) -> Option<T> {
        self.0.map(|(_, value)| value)
    }
}

#[derive(Default)]
struct RecordBuilder {
    title: Ranked<String>,
    subtitle: Ranked<String>,
    description: Ranked<String>,
    summary: Ranked<String>,
    link: Ranked<String>,
    published: Ranked<String>,
    image: Ranked<ImageField>,
    itunes_image: Ranked<ImageField>,
    enclosures: Vec<Enclosure>,
}

impl RecordBuilder {
    fn text_slot(&mut self, field: TextField) -> &mut Ranked<String> {
        match field {
            TextField::Title => &mut self.title,
            TextField::Subtitle => &mut self.subtitle,
            TextField::Description => &mut self.description,
            TextField::Summary => &mut self.summary,
            TextField::Link => &mut self.link,
            TextField::Published => &mut self.published,
        }
    }

    fn finish(self) -> SourceRecord {
        SourceRecord {
            title: self.title.into_inner(),
            subtitle: self.subtitle.into_inner(),
            description: self.description.into_inner(),
            summary: self.summary.into_inner(),
            link: self.link.into_inner(),
            published: self.published.into_inner(),
            image: self.image.into_inner().unwrap_or_default(),
            itunes_image: self.itunes_image.into_inner().unwrap_or_default(),
            enclosures: self.enclosures,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TextField {
    Title,
    Subtitle,
    Description,
    Summary,
    Link,
    Published,
}

enum Target {
    Text(TextField, u8),
    Image { itunes: bool, rank: u8 },
    /// Atom `<logo>`: the text is the href of the feed image.
    Logo,
}

/// An element whose content is being collected into a field.
struct Capture {
    depth: usize,
    target: Target,
    text: String,
    href: Option<String>,
    url_text: String,
    in_url: bool,
}

impl Capture {
    fn new(depth: usize, target: Target) -> Self {
        Self {
            depth,
            target,
            text: String::new(),
            href: None,
            url_text: String::new(),
            in_url: false,
        }
    }

    fn image(depth: usize, itunes: bool, href: Option<String>) -> Self {
        Self {
            href,
            ..Self::new(depth, Target::Image { itunes, rank: 0 })
        }
    }

    fn enter(&mut self, depth: usize, name: &ElementName<'_>) {
        if matches!(self.target, Target::Image { .. })
            && depth == self.depth + 1
            && name.is_core(b"url")
        {
            self.in_url = true;
        }
    }

    fn leave(&mut self, depth: usize) {
        if self.in_url && depth == self.depth + 1 {
            self.in_url = false;
        }
    }

    fn push_text(&mut self, depth: usize, text: &str) {
        match self.target {
            Target::Image { .. } if self.in_url => self.url_text.push_str(text),
            // Text of other children of an image block (title, link) is not the URL.
            Target::Image { .. } if depth != self.depth => {}
            _ => self.text.push_str(text),
        }
    }

    fn commit(self, record: &mut RecordBuilder) {
        let text = self.text.trim();
        match self.target {
            Target::Text(field, rank) => {
                if !text.is_empty() {
                    record.text_slot(field).offer(rank, text.to_string());
                }
            }
            Target::Logo => {
                if !text.is_empty() {
                    record.image.offer(1, ImageField::Href(text.to_string()));
                }
            }
            Target::Image { itunes, rank } => {
                let url_text = self.url_text.trim();
                let field = if let Some(href) = self.href {
                    ImageField::Href(href)
                } else if !url_text.is_empty() {
                    ImageField::Href(url_text.to_string())
                } else if !text.is_empty() {
                    ImageField::PlainUrl(text.to_string())
                } else {
                    ImageField::Absent
                };
                if field != ImageField::Absent {
                    let slot = if itunes {
                        &mut record.itunes_image
                    } else {
                        &mut record.image
                    };
                    slot.offer(rank, field);
                }
            }
        }
    }
}

fn begin_channel_field(
    name: &ElementName<'_>,
    e: &BytesStart<'_>,
    decoder: Decoder,
    depth: usize,
) -> Option<Capture> {
    let text = |field, rank| Some(Capture::new(depth, Target::Text(field, rank)));
    match (name.ns, name.local) {
        (Ns::Core, b"title") => text(TextField::Title, 0),
        (Ns::Core, b"subtitle" | b"tagline") => text(TextField::Subtitle, 0),
        (Ns::Itunes, b"subtitle") => text(TextField::Subtitle, 1),
        (Ns::Core, b"description") => text(TextField::Description, 0),
        (Ns::Itunes, b"summary") => text(TextField::Description, 1),
        (Ns::Core, b"image") => Some(Capture::image(depth, false, attribute(e, decoder, b"href"))),
        (Ns::Itunes, b"image") => Some(Capture::image(depth, true, attribute(e, decoder, b"href"))),
        (Ns::Core, b"logo") => Some(Capture::new(depth, Target::Logo)),
        _ => None,
    }
}

fn begin_entry_field(
    record: &mut RecordBuilder,
    name: &ElementName<'_>,
    e: &BytesStart<'_>,
    decoder: Decoder,
    depth: usize,
) -> Option<Capture> {
    let text = |field, rank| Some(Capture::new(depth, Target::Text(field, rank)));
    match (name.ns, name.local) {
        (Ns::Core, b"title") => text(TextField::Title, 0),
        (Ns::Core, b"description" | b"summary") => text(TextField::Summary, 0),
        (Ns::Itunes, b"summary") => text(TextField::Summary, 1),
        // Full body, used only when no summary was given.
        (Ns::Core, b"content") | (Ns::Content, b"encoded") => text(TextField::Summary, 2),
        (Ns::Core, b"pubDate" | b"published" | b"issued") => text(TextField::Published, 0),
        (Ns::Dc, b"date") => text(TextField::Published, 1),
        (Ns::Core, b"link") => match attribute(e, decoder, b"href") {
            // RSS: the link is the element text.
            None => text(TextField::Link, 0),
            // Atom: rel decides what the href points at.
            Some(href) => {
                match attribute(e, decoder, b"rel").as_deref() {
                    None | Some("alternate") => record.link.offer(0, href),
                    Some("enclosure") => record.enclosures.push(Enclosure { href: Some(href) }),
                    Some(_) => {}
                }
                None
            }
        },
        // A permalink guid stands in for a missing link.
        (Ns::Core, b"guid") => match attribute(e, decoder, b"isPermaLink") {
            Some(flag) if flag.eq_ignore_ascii_case("false") => None,
            _ => text(TextField::Link, 1),
        },
        (Ns::Core, b"enclosure") => {
            record.enclosures.push(Enclosure {
                href: attribute(e, decoder, b"url"),
            });
            None
        }
        (Ns::Core, b"image") => Some(Capture::image(depth, false, attribute(e, decoder, b"href"))),
        (Ns::Itunes, b"image") => Some(Capture::image(depth, true, attribute(e, decoder, b"href"))),
        _ => None,
    }
}

#[derive(Default)]
struct Scanner {
    dialect: Option<Dialect>,
    depth: usize,
    /// Depth of the element whose children are channel fields.
    channel_depth: Option<usize>,
    channel: RecordBuilder,
    entry: Option<(usize, RecordBuilder)>,
    entries: Vec<SourceRecord>,
    capture: Option<Capture>,
}

impl Scanner {
    fn capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn start(&mut self, e: &BytesStart<'_>, decoder: Decoder) -> Result<(), ParseError> {
        self.depth += 1;
        let name = ElementName::of(e);

        let Some(dialect) = self.dialect else {
            let dialect = Dialect::from_root(name.local).ok_or_else(|| {
                ParseError::NotAFeed(String::from_utf8_lossy(e.name().as_ref()).into_owned())
            })?;
            if dialect == Dialect::Atom {
                self.channel_depth = Some(self.depth);
            }
            self.dialect = Some(dialect);
            return Ok(());
        };

        if let Some(capture) = &mut self.capture {
            capture.enter(self.depth, &name);
            return Ok(());
        }

        if let Some((entry_depth, record)) = &mut self.entry {
            if self.depth == *entry_depth + 1 {
                self.capture = begin_entry_field(record, &name, e, decoder, self.depth);
            }
            return Ok(());
        }

        if name.is_core(dialect.entry_element()) {
            self.entry = Some((self.depth, RecordBuilder::default()));
        } else if self.channel_depth == Some(self.depth - 1) {
            self.capture = begin_channel_field(&name, e, decoder, self.depth);
        } else if dialect != Dialect::Atom && self.depth == 2 && name.is_core(b"channel") {
            self.channel_depth = Some(self.depth);
        } else if dialect == Dialect::Rdf && self.depth == 2 && name.is_core(b"image") {
            // RSS 1.0 keeps the channel image next to the channel.
            self.capture = begin_channel_field(&name, e, decoder, self.depth);
        }
        Ok(())
    }

    fn end(&mut self) {
        let depth = self.depth;
        self.depth = self.depth.saturating_sub(1);

        if let Some(capture) = &mut self.capture {
            if depth > capture.depth {
                capture.leave(depth);
                return;
            }
            if let Some(capture) = self.capture.take() {
                self.commit(capture);
            }
            return;
        }

        if let Some((entry_depth, _)) = &self.entry {
            if *entry_depth == depth {
                if let Some((_, record)) = self.entry.take() {
                    self.entries.push(record.finish());
                }
            }
            return;
        }

        if self.channel_depth == Some(depth) {
            self.channel_depth = None;
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(capture) = &mut self.capture {
            capture.push_text(self.depth, text);
        }
    }

    fn commit(&mut self, capture: Capture) {
        match &mut self.entry {
            Some((_, record)) => capture.commit(record),
            None => capture.commit(&mut self.channel),
        }
    }

    fn finish(mut self) -> Result<SourceFeed, ParseError> {
        if self.dialect.is_none() {
            return Err(ParseError::Empty);
        }
        if let Some(capture) = self.capture.take() {
            self.commit(capture);
        }
        if let Some((_, record)) = self.entry.take() {
            self.entries.push(record.finish());
        }
        Ok(SourceFeed {
            channel: self.channel.finish(),
            entries: self.entries,
        })
    }
}
