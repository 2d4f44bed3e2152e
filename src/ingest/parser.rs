// src/ingest/parser.rs
//! Tolerant RSS 2.0 / RDF / Atom reader.
//!
//! Walks the document with the quick-xml pull parser and collects the direct
//! children of every `<item>` / `<entry>` that we care about. Anything else is
//! skipped, so odd extensions (`media:*`, `dc:*`) never break a feed. A
//! `<source>` only counts when it carries plain text; the Atom form with
//! `<id>`/`<title>` children is dropped so the link host names the source. A document without an `rss`, `feed` or `RDF` root, or one
//! that is not well-formed XML, is reported as an error; callers decide whether
//! that counts as a failure.

use anyhow::{anyhow, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One entry as it appeared in the feed, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    PubDate,
    Published,
    Updated,
    Source,
}

fn field_for(name: &[u8]) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"link" => Some(Field::Link),
        b"pubDate" => Some(Field::PubDate),
        b"published" => Some(Field::Published),
        b"updated" => Some(Field::Updated),
        b"source" => Some(Field::Source),
        _ => None,
    }
}

fn is_entry(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

fn is_feed_root(local: &[u8]) -> bool {
    local == b"rss" || local == b"feed" || local == b"RDF" || local == b"channel"
}

#[derive(Debug, Default)]
struct EntryBuilder {
    depth: usize,
    field: Option<(Field, usize)>,
    field_nested: bool,
    text: String,
    title: Option<String>,
    link_text: Option<String>,
    alternate_href: Option<String>,
    any_href: Option<String>,
    pub_date: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    source: Option<String>,
}

impl EntryBuilder {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            ..Default::default()
        }
    }

    fn note_link_attrs(&mut self, e: &BytesStart<'_>) {
        let mut href = None;
        let mut rel = None;
        for attr in e.attributes().flatten() {
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            match attr.key.as_ref() {
                b"href" => href = Some(value.trim().to_string()),
                b"rel" => rel = Some(value),
                _ => {}
            }
        }
        let Some(href) = href.filter(|h| !h.is_empty()) else {
            return;
        };
        let is_alternate = matches!(rel.as_deref(), None | Some("alternate"));
        if is_alternate && self.alternate_href.is_none() {
            self.alternate_href = Some(href);
        } else if self.any_href.is_none() {
            self.any_href = Some(href);
        }
    }

    fn finish_field(&mut self, field: Field) {
        let text = std::mem::take(&mut self.text);
        let text = text.trim();
        let nested = std::mem::take(&mut self.field_nested);
        self.field = None;
        if text.is_empty() || (nested && field == Field::Source) {
            return;
        }
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link_text,
            Field::PubDate => &mut self.pub_date,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::Source => &mut self.source,
        };
        if slot.is_none() {
            *slot = Some(text.to_string());
        }
    }

    fn build(self) -> RawEntry {
        RawEntry {
            title: self.title,
            link: self.link_text.or(self.alternate_href).or(self.any_href),
            published: self.pub_date.or(self.published).or(self.updated),
            source: self.source,
        }
    }
}

/// Parse a feed body into raw entries.
pub fn parse_feed(xml: &str) -> Result<Vec<RawEntry>> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&cleaned);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut saw_root = false;
    let mut current: Option<EntryBuilder> = None;
    let mut out = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = e.name();
                if is_feed_root(e.local_name().as_ref()) {
                    saw_root = true;
                }
                match current.as_mut() {
                    None => {
                        if is_entry(name.as_ref()) {
                            current = Some(EntryBuilder::new(depth));
                        }
                    }
                    Some(b) => {
                        if b.field.is_some() {
                            b.field_nested = true;
                        } else if depth == b.depth + 1 {
                            if let Some(f) = field_for(name.as_ref()) {
                                if f == Field::Link {
                                    b.note_link_attrs(&e);
                                }
                                b.text.clear();
                                b.field_nested = false;
                                b.field = Some((f, depth));
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(b) = current.as_mut() {
                    if b.field.is_some() {
                        b.field_nested = true;
                    } else if depth == b.depth && e.name().as_ref() == b"link" {
                        b.note_link_attrs(&e);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(b) = current.as_mut().filter(|b| b.field.is_some()) {
                    let s = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    push_text(&mut b.text, &s);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(b) = current.as_mut().filter(|b| b.field.is_some()) {
                    push_text(&mut b.text, &String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(_)) => {
                if let Some(mut b) = current.take() {
                    if let Some((f, d)) = b.field {
                        if d == depth {
                            b.finish_field(f);
                        }
                    }
                    if depth == b.depth {
                        out.push(b.build());
                    } else {
                        current = Some(b);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow!(
                    "malformed xml at byte {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(anyhow!("no rss, atom or rdf root element"));
    }
    Ok(out)
}

fn push_text(buf: &mut String, s: &str) {
    if !buf.is_empty() && !s.is_empty() {
        buf.push(' ');
    }
    buf.push_str(s);
}

/// Feeds often embed HTML named entities that XML does not define.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
