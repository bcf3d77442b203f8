use crate::SitemapError;
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Root element of a sitemap document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapKind {
    /// `<sitemapindex>`: entries point at further sitemap documents
    Index,
    /// `<urlset>`: entries point at pages
    Urlset,
}

/// One `<url>` or `<sitemap>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
}

/// A parsed sitemap document
#[derive(Debug, Clone)]
pub struct SitemapDocument {
    pub kind: SitemapKind,
    pub entries: Vec<SitemapEntry>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Loc,
    Lastmod,
}

/// Parses a sitemap or sitemap index
///
/// Element names are matched on their local part, so namespaced documents
/// parse the same as plain ones. Entries without a `<loc>` are skipped.
///
/// # Arguments
///
/// * `xml` - The document text
/// * `url` - Where the document came from, used in error messages
///
/// # Returns
///
/// * `Ok(SitemapDocument)` - The root kind and all entries in document order
/// * `Err(SitemapError::Parse)` - Malformed XML, a truncated document, or an
///   unknown root element
pub fn parse_sitemap(xml: &str, url: &str) -> Result<SitemapDocument, SitemapError> {
    let parse_error = |message: String| SitemapError::Parse {
        url: url.to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut kind: Option<SitemapKind> = None;
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut field = Field::None;
    let mut loc = String::new();
    let mut lastmod = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                match depth {
                    0 => kind = Some(root_kind(name).map_err(&parse_error)?),
                    1 => {
                        loc.clear();
                        lastmod.clear();
                    }
                    2 => {
                        field = match name {
                            b"loc" => Field::Loc,
                            b"lastmod" => Field::Lastmod,
                            _ => Field::None,
                        }
                    }
                    _ => {}
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    kind = Some(root_kind(e.local_name().as_ref()).map_err(&parse_error)?);
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                match depth {
                    1 => {
                        let loc_value = loc.trim();
                        if !loc_value.is_empty() {
                            entries.push(SitemapEntry {
                                loc: loc_value.to_string(),
                                lastmod: parse_lastmod(lastmod.trim()),
                            });
                        }
                    }
                    2 => field = Field::None,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| parse_error(err.to_string()))?;
                push_field(field, &text, &mut loc, &mut lastmod);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                push_field(field, &text, &mut loc, &mut lastmod);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(parse_error(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(parse_error("document ended before its root element was closed".to_string()));
    }

    let kind = kind.ok_or_else(|| parse_error("no root element".to_string()))?;
    Ok(SitemapDocument { kind, entries })
}

fn root_kind(name: &[u8]) -> Result<SitemapKind, String> {
    match name {
        b"sitemapindex" => Ok(SitemapKind::Index),
        b"urlset" => Ok(SitemapKind::Urlset),
        other => Err(format!(
            "unexpected root element <{}>",
            String::from_utf8_lossy(other)
        )),
    }
}

fn push_field(field: Field, text: &str, loc: &mut String, lastmod: &mut String) {
    match field {
        Field::Loc => loc.push_str(text),
        Field::Lastmod => lastmod.push_str(text),
        Field::None => {}
    }
}

/// Parses a `<lastmod>` value
///
/// Accepts RFC 3339 timestamps, W3C datetimes without seconds and bare
/// `YYYY-MM-DD` dates. Anything else is `None`.
pub fn parse_lastmod(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z") {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
