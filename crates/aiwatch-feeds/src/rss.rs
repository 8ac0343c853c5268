//! RSS 2.0 and Atom parsing.
//!
//! The document is fetched in one round trip, then decoded entry by entry as
//! the returned sequence is pulled, so a large feed never has to be fully
//! materialized before matching starts.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::FeedError;
use crate::fetch::EndpointFetcher;
use crate::parser::{Parser, RawEntries, RawEntry};

pub struct RssParser {
    fetcher: Arc<EndpointFetcher>,
}

impl RssParser {
    #[must_use]
    pub fn new(fetcher: Arc<EndpointFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Parser for RssParser {
    fn source_type(&self) -> &str {
        "rss"
    }

    async fn fetch(&self, endpoint: &str) -> Result<RawEntries, FeedError> {
        let bytes = self.fetcher.fetch_bytes(endpoint).await?;
        Ok(Box::new(XmlEntries::new(endpoint, bytes)))
    }
}

/// Child elements of an `<item>`/`<entry>` whose text we keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Guid,
    Title,
    Link,
    Summary,
    Content,
    Published,
    Updated,
    Category,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"guid" | b"id" => Some(Field::Guid),
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" | b"summary" => Some(Field::Summary),
            b"content:encoded" | b"content" => Some(Field::Content),
            b"pubDate" | b"published" | b"dc:date" | b"issued" => Some(Field::Published),
            b"updated" | b"modified" => Some(Field::Updated),
            b"category" | b"dc:subject" => Some(Field::Category),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct EntryBuilder {
    guid: String,
    title: String,
    link: String,
    summary: String,
    content: String,
    published: String,
    updated: String,
    categories: Vec<String>,
    category: String,
}

impl EntryBuilder {
    fn buffer(&mut self, field: Field) -> &mut String {
        match field {
            Field::Guid => &mut self.guid,
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::Category => &mut self.category,
        }
    }

    fn append(&mut self, field: Field, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let buf = self.buffer(field);
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(text);
    }

    fn close(&mut self, field: Field) {
        if field == Field::Category {
            let label = std::mem::take(&mut self.category);
            if !label.is_empty() {
                self.categories.push(label);
            }
        }
    }

    /// Atom puts links and categories in attributes of empty elements.
    fn absorb_attributes(&mut self, element: &BytesStart<'_>) {
        match element.name().as_ref() {
            b"link" => {
                let rel = attribute(element, "rel");
                let is_alternate = rel.as_deref().is_none_or(|r| r == "alternate");
                if is_alternate && self.link.is_empty() {
                    if let Some(href) = attribute(element, "href") {
                        self.link = href;
                    }
                }
            }
            b"category" => {
                if let Some(term) = attribute(element, "term") {
                    if !term.trim().is_empty() {
                        self.categories.push(term);
                    }
                }
            }
            _ => {}
        }
    }

    fn build(self) -> RawEntry {
        let some = |s: String| if s.is_empty() { None } else { Some(s) };
        let body = if self.summary.is_empty() {
            self.content
        } else {
            self.summary
        };
        let published = if self.published.is_empty() {
            self.updated
        } else {
            self.published
        };
        RawEntry {
            guid: some(self.guid),
            url: some(self.link),
            title: some(self.title),
            body: some(body),
            published: some(published),
            categories: self.categories,
        }
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(std::borrow::Cow::into_owned))
}

fn is_entry_element(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

/// Pull-based iterator over the `<item>` (RSS) or `<entry>` (Atom) elements
/// of one XML document.
pub struct XmlEntries {
    endpoint: String,
    reader: Reader<Cursor<Vec<u8>>>,
    buf: Vec<u8>,
    finished: bool,
}

impl XmlEntries {
    #[must_use]
    pub fn new(endpoint: &str, document: Vec<u8>) -> Self {
        let mut reader = Reader::from_reader(Cursor::new(document));
        reader.config_mut().trim_text(true);
        Self {
            endpoint: endpoint.to_string(),
            reader,
            buf: Vec::new(),
            finished: false,
        }
    }

    fn parse_error(&mut self, reason: String) -> FeedError {
        self.finished = true;
        FeedError::Parse {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }

    fn next_entry(&mut self) -> Result<Option<RawEntry>, FeedError> {
        let mut entry: Option<EntryBuilder> = None;
        // Nesting depth below the entry element, and the field captured at depth 1.
        let mut depth = 0usize;
        let mut field: Option<Field> = None;

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => return Err(self.parse_error(e.to_string())),
            };

            match event {
                Event::Start(e) => match entry.as_mut() {
                    None if is_entry_element(e.name().as_ref()) => {
                        entry = Some(EntryBuilder::default());
                        depth = 0;
                        field = None;
                    }
                    None => {}
                    Some(builder) => {
                        depth += 1;
                        if depth == 1 {
                            builder.absorb_attributes(&e);
                            field = Field::from_name(e.name().as_ref());
                        }
                    }
                },
                Event::Empty(e) => {
                    if let Some(builder) = entry.as_mut() {
                        if depth == 0 {
                            builder.absorb_attributes(&e);
                        }
                    }
                }
                Event::End(e) => {
                    let Some(builder) = entry.as_mut() else {
                        continue;
                    };
                    if depth == 0 {
                        if is_entry_element(e.name().as_ref()) {
                            return Ok(entry.map(EntryBuilder::build));
                        }
                        return Err(self.parse_error("unbalanced entry element".to_string()));
                    }
                    if depth == 1 {
                        if let Some(f) = field.take() {
                            builder.close(f);
                        }
                    }
                    depth -= 1;
                }
                Event::Text(e) => {
                    if let (Some(builder), Some(f)) = (entry.as_mut(), field) {
                        let text = e
                            .unescape()
                            .map(std::borrow::Cow::into_owned)
                            .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                        builder.append(f, &text);
                    }
                }
                Event::CData(e) => {
                    if let (Some(builder), Some(f)) = (entry.as_mut(), field) {
                        builder.append(f, &String::from_utf8_lossy(&e));
                    }
                }
                Event::Eof => {
                    self.finished = true;
                    if entry.is_some() {
                        return Err(self.parse_error("document ended inside an entry".to_string()));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl Iterator for XmlEntries {
    type Item = Result<RawEntry, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.next_entry().transpose()
    }
}
