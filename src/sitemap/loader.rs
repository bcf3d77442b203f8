use crate::crawler::HttpFetcher;
use crate::sitemap::parser::{parse_sitemap, SitemapDocument, SitemapEntry, SitemapKind};
use crate::{FetchError, SitemapError};
use flate2::read::GzDecoder;
use futures::stream::{self, BoxStream, StreamExt};
use regex::Regex;
use std::collections::VecDeque;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Fetches sitemap documents and streams their entries
///
/// A `sitemapindex` root is expanded exactly one level deep. Nested
/// documents are only requested as the stream is polled.
#[derive(Debug, Clone)]
pub struct SitemapLoader {
    fetcher: HttpFetcher,
    nested_filter: Option<Regex>,
}

impl SitemapLoader {
    /// Creates a loader
    ///
    /// # Arguments
    ///
    /// * `fetcher` - HTTP fetcher used for every document
    /// * `nested_filter` - When set, only nested sitemaps whose URL matches are followed
    pub fn new(fetcher: HttpFetcher, nested_filter: Option<Regex>) -> Self {
        Self {
            fetcher,
            nested_filter,
        }
    }

    /// Fetches and parses a single document, inflating gzip payloads
    pub async fn fetch_document(&self, url: &str) -> Result<SitemapDocument, SitemapError> {
        let raw = self.fetcher.get(url).await?;
        let xml = decode_body(url, raw.body)?;
        let doc = parse_sitemap(&xml, url)?;

        tracing::debug!(
            "Parsed sitemap {} ({:?}, {} entries)",
            url,
            doc.kind,
            doc.entries.len()
        );
        Ok(doc)
    }

    /// Opens a sitemap and returns a lazy stream of its page entries
    ///
    /// The root document is fetched eagerly so an unusable root is reported
    /// here rather than through the stream. A nested document that fails to
    /// fetch or parse yields one `Err` item and the stream moves on to its
    /// siblings. Calling `open` again restarts from the root.
    ///
    /// # Returns
    ///
    /// * `Ok(stream)` - Entries in document order
    /// * `Err(SitemapError)` - The root could not be fetched or parsed
    pub async fn open(
        &self,
        url: &str,
    ) -> Result<BoxStream<'_, Result<SitemapEntry, SitemapError>>, SitemapError> {
        let root = self.fetch_document(url).await?;

        let mut expansion = Expansion {
            loader: self,
            pending: VecDeque::new(),
            ready: VecDeque::new(),
        };

        match root.kind {
            SitemapKind::Urlset => expansion.ready.extend(root.entries),
            SitemapKind::Index => {
                let total = root.entries.len();
                expansion.pending.extend(
                    root.entries
                        .into_iter()
                        .map(|entry| entry.loc)
                        .filter(|loc| self.accepts_nested(loc)),
                );
                tracing::info!(
                    "Sitemap index {} lists {} documents, following {}",
                    url,
                    total,
                    expansion.pending.len()
                );
            }
        }

        Ok(stream::unfold(expansion, Expansion::next).boxed())
    }

    fn accepts_nested(&self, loc: &str) -> bool {
        self.nested_filter
            .as_ref()
            .map_or(true, |filter| filter.is_match(loc))
    }
}

struct Expansion<'a> {
    loader: &'a SitemapLoader,
    pending: VecDeque<String>,
    ready: VecDeque<SitemapEntry>,
}

impl<'a> Expansion<'a> {
    async fn next(mut self) -> Option<(Result<SitemapEntry, SitemapError>, Self)> {
        loop {
            if let Some(entry) = self.ready.pop_front() {
                return Some((Ok(entry), self));
            }

            let nested = self.pending.pop_front()?;
            match self.loader.fetch_document(&nested).await {
                Ok(doc) if doc.kind == SitemapKind::Urlset => self.ready.extend(doc.entries),
                Ok(_) => {
                    tracing::warn!("Skipping nested sitemap index {}", nested);
                }
                Err(err) => {
                    tracing::warn!("Nested sitemap {} failed: {}", nested, err);
                    return Some((Err(err), self));
                }
            }
        }
    }
}

/// Decodes a sitemap body, inflating it first when it is gzip-compressed
///
/// `.xml.gz` files served as `application/gzip` or `application/x-gzip` are
/// recognised by the gzip magic number, which also covers servers that send
/// them as `application/octet-stream`.
fn decode_body(url: &str, body: Vec<u8>) -> Result<String, FetchError> {
    if !body.starts_with(&GZIP_MAGIC) {
        return String::from_utf8(body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        });
    }

    let mut decoder = GzDecoder::new(&body[..]);
    let mut xml = String::new();
    decoder
        .read_to_string(&mut xml)
        .map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: format!("gzip: {}", e),
        })?;
    Ok(xml)
}
