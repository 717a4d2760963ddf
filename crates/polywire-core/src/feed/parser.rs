use chrono::{DateTime, Utc};
use feed_rs::parser;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::models::FeedEntry;
use crate::{Error, Result};

/// Entries read from one feed document
#[derive(Debug, Default)]
pub struct ParsedEntries {
    pub entries: Vec<FeedEntry>,
    /// The document was not well-formed; entries were recovered best-effort
    pub malformed: bool,
}

/// Parse RSS/Atom/JSON feed content into entries.
///
/// Documents the strict parser rejects go through a lenient scan that keeps
/// every complete `<item>`/`<entry>` read before the damage.
pub fn parse_entries(content: &[u8]) -> Result<ParsedEntries> {
    // Empty ids mark entries without a native identifier
    let strict = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(content);

    match strict {
        Ok(feed) => {
            let mut entries: Vec<FeedEntry> =
                feed.entries.into_iter().map(entry_from_model).collect();
            attach_raw_dates(content, &mut entries);
            Ok(ParsedEntries {
                entries,
                malformed: false,
            })
        }
        Err(strict_err) => {
            let entries = parse_lenient(content);
            if entries.is_empty() {
                return Err(Error::FeedParse(strict_err.to_string()));
            }
            tracing::debug!(
                "Strict parse failed ({}), recovered {} entries",
                strict_err,
                entries.len()
            );
            Ok(ParsedEntries {
                entries,
                malformed: true,
            })
        }
    }
}

fn entry_from_model(entry: feed_rs::model::Entry) -> FeedEntry {
    let id = Some(entry.id).filter(|id| !id.trim().is_empty());

    let link = entry.links.first().map(|l| l.href.clone());

    let title = entry.title.map(|t| t.content);

    let summary = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body));

    let author = entry.authors.first().map(|a| a.name.clone());

    let published_at = entry.published.or(entry.updated);

    let tags = entry
        .categories
        .into_iter()
        .filter_map(|c| {
            if c.term.trim().is_empty() {
                c.label
            } else {
                Some(c.term)
            }
        })
        .collect();

    FeedEntry {
        id,
        link,
        title,
        summary,
        author,
        published: published_at.map(|dt| dt.to_rfc2822()),
        published_at,
        tags,
    }
}

/// Replace rendered publish dates with the text the document carries.
///
/// Entries are paired by position, so a document whose raw scan disagrees
/// with the strict parser on the entry count keeps the rendered dates.
fn attach_raw_dates(content: &[u8], entries: &mut [FeedEntry]) {
    let raw = raw_dates(content);
    if raw.len() != entries.len() {
        tracing::debug!(
            "Raw date scan found {} entries, parser found {}; keeping rendered dates",
            raw.len(),
            entries.len()
        );
        return;
    }
    for (entry, published) in entries.iter_mut().zip(raw) {
        if let Some(published) = published {
            entry.published = Some(published);
        }
    }
}

/// Publish date text of every entry, in document order
fn raw_dates(content: &[u8]) -> Vec<Option<String>> {
    if content.trim_ascii_start().first() == Some(&b'{') {
        return json_feed_dates(content);
    }
    parse_lenient(content)
        .into_iter()
        .map(|entry| entry.published)
        .collect()
}

fn json_feed_dates(content: &[u8]) -> Vec<Option<String>> {
    let Ok(doc) = serde_json::from_slice::<serde_json::Value>(content) else {
        return Vec::new();
    };
    let Some(items) = doc.get("items").and_then(|items| items.as_array()) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| {
            item.get("date_published")
                .or_else(|| item.get("date_modified"))
                .and_then(|date| date.as_str())
                .map(|date| date.trim().to_string())
                .filter(|date| !date.is_empty())
        })
        .collect()
}

/// Parse a publish date in the formats feeds commonly use
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn is_entry_tag(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Entry under construction in the lenient scan
#[derive(Default)]
struct PartialEntry {
    entry: FeedEntry,
    /// Local names of open elements below the entry element
    path: Vec<Vec<u8>>,
    text: String,
}

impl PartialEntry {
    fn open(&mut self, e: &BytesStart) {
        let name = e.local_name().as_ref().to_vec();
        self.apply_attributes(&name, e);
        self.path.push(name);
        self.text.clear();
    }

    fn apply_attributes(&mut self, name: &[u8], e: &BytesStart) {
        match name {
            b"link" => {
                let rel = attr_value(e, b"rel");
                if matches!(rel.as_deref(), None | Some("alternate")) && self.entry.link.is_none() {
                    self.entry.link = attr_value(e, b"href");
                }
            }
            b"category" => {
                if let Some(term) = attr_value(e, b"term").filter(|t| !t.is_empty()) {
                    self.entry.tags.push(term);
                }
            }
            _ => {}
        }
    }

    fn close(&mut self) {
        let Some(name) = self.path.pop() else {
            return;
        };
        let text = std::mem::take(&mut self.text).trim().to_string();
        if text.is_empty() {
            return;
        }
        let parent = self.path.last().map(Vec::as_slice);
        let entry = &mut self.entry;

        match (name.as_slice(), parent) {
            (b"guid" | b"id", None) => entry.id = Some(text),
            (b"link", None) if entry.link.is_none() => entry.link = Some(text),
            (b"title", None) => entry.title = Some(text),
            (b"description" | b"summary", None) => entry.summary = Some(text),
            (b"encoded" | b"content", None) if entry.summary.is_none() => {
                entry.summary = Some(text)
            }
            (b"author" | b"creator", None) => entry.author = Some(text),
            (b"name", Some(b"author")) => entry.author = Some(text),
            (b"pubDate" | b"published" | b"date", None) => entry.published = Some(text),
            (b"updated", None) if entry.published.is_none() => entry.published = Some(text),
            (b"category", None) => entry.tags.push(text),
            _ => {}
        }
    }

    fn finish(mut self) -> FeedEntry {
        self.entry.published_at = self.entry.published.as_deref().and_then(parse_date);
        self.entry
    }
}

/// Best-effort scan of a damaged document, stopping at the first XML error
pub fn parse_lenient(content: &[u8]) -> Vec<FeedEntry> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<PartialEntry> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match current.as_mut() {
                Some(partial) => partial.open(&e),
                None if is_entry_tag(e.local_name().as_ref()) => {
                    current = Some(PartialEntry::default());
                }
                None => {}
            },
            Ok(Event::Empty(e)) => {
                if let Some(partial) = current.as_mut() {
                    let name = e.local_name().as_ref().to_vec();
                    partial.apply_attributes(&name, &e);
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(partial) = current.as_mut() {
                    match t.unescape() {
                        Ok(text) => partial.text.push_str(&text),
                        Err(_) => partial.text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(partial) = current.as_mut() {
                    partial.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => {
                if let Some(partial) = current.as_mut() {
                    if partial.path.is_empty() && is_entry_tag(e.local_name().as_ref()) {
                        if let Some(done) = current.take() {
                            entries.push(done.finish());
                        }
                    } else {
                        partial.close();
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(
                    "Lenient scan stopped at byte {}: {}",
                    reader.buffer_position(),
                    e
                );
                break;
            }
            _ => {}
        }
    }

    entries
}
