//! Feed scanner
//!
//! Fetches the feed index and turns `[live]`-tagged entries into
//! [`CandidateThread`]s. Both RSS 2.0 (`<item>`) and Atom (`<entry>`)
//! documents are understood. The scanner never retries: a failed fetch is
//! returned to the caller, whose next scheduled scan is the retry.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use crate::errors::{FeedError, FeedResult};
use crate::models::{CandidateThread, ThreadWatermark};
use crate::utils::http_client::HttpFetcher;
use crate::utils::time::{epoch_seconds, parse_feed_date};
use crate::utils::url::UrlUtils;

fn live_title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[live\] (.*)").expect("static regex"))
}

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

/// Whether a plain-text title carries the live tag
///
/// The match is case-sensitive but not anchored: `[live] ` anywhere in the
/// title counts, so "Recap of [live] Event X" is a live title too.
pub fn is_live_title(title: &str) -> bool {
    live_title_regex().is_match(title)
}

/// Reduce a feed title to plain text: drop tags, decode entities, collapse whitespace
pub fn strip_markup(text: &str) -> String {
    let without_tags = markup_regex().replace_all(text, "").replace("&nbsp;", " ");
    let decoded = quick_xml::escape::unescape(&without_tags)
        .map(|s| s.into_owned())
        .unwrap_or(without_tags);
    decoded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First candidate strictly newer than the watermark, in feed order
pub fn detect_new<'a>(
    candidates: &'a [CandidateThread],
    watermark: &ThreadWatermark,
) -> Option<&'a CandidateThread> {
    candidates
        .iter()
        .find(|candidate| watermark.is_exceeded_by(candidate.observed_timestamp))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Updated,
    Published,
}

#[derive(Debug, Default)]
struct RawEntry {
    title: Option<String>,
    link: Option<String>,
    updated: Option<String>,
    published: Option<String>,
}

impl RawEntry {
    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Updated => &mut self.updated,
            Field::Published => &mut self.published,
        };
        if slot.is_none() && !value.trim().is_empty() {
            *slot = Some(value);
        }
    }
}

fn field_for(name: &[u8]) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"link" => Some(Field::Link),
        b"updated" => Some(Field::Updated),
        b"published" | b"pubDate" => Some(Field::Published),
        _ => None,
    }
}

fn href_of(element: &BytesStart<'_>) -> FeedResult<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| FeedError::parse(format!("Invalid attribute: {e}")))?;
        if attr.key.local_name().as_ref() == b"href" {
            let value = attr
                .unescape_value()
                .map_err(|e| FeedError::parse(format!("Invalid href value: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Parse a feed document into live candidates, in feed order
pub fn parse_feed(content: &str, metadata_suffix: &str) -> FeedResult<Vec<CandidateThread>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut raw_entries = Vec::new();
    let mut current: Option<RawEntry> = None;
    // Field being captured and the element name that closes it
    let mut capture: Option<(Field, Vec<u8>)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.local_name().as_ref().to_vec();
                match name.as_slice() {
                    b"item" | b"entry" => {
                        current = Some(RawEntry::default());
                        capture = None;
                    }
                    _ if capture.is_none() => {
                        if let (Some(entry), Some(field)) = (current.as_mut(), field_for(&name)) {
                            if field == Field::Link {
                                if let Some(href) = href_of(e)? {
                                    entry.set(Field::Link, href);
                                }
                            }
                            capture = Some((field, name));
                            text.clear();
                        }
                    }
                    _ => {}
                }
            }

            Ok(Event::Empty(ref e)) => {
                if let Some(entry) = current.as_mut() {
                    if e.local_name().as_ref() == b"link" {
                        if let Some(href) = href_of(e)? {
                            entry.set(Field::Link, href);
                        }
                    }
                }
            }

            Ok(Event::Text(e)) => {
                if capture.is_some() {
                    let value = e
                        .unescape()
                        .map_err(|e| FeedError::parse(format!("Invalid text: {e}")))?;
                    text.push_str(&value);
                }
            }

            Ok(Event::CData(e)) => {
                if capture.is_some() {
                    let value = std::str::from_utf8(&e)
                        .map_err(|e| FeedError::parse(format!("Invalid UTF-8 in CDATA: {e}")))?;
                    text.push_str(value);
                }
            }

            Ok(Event::End(ref e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if matches!(name, b"item" | b"entry") {
                    if let Some(entry) = current.take() {
                        raw_entries.push(entry);
                    }
                    capture = None;
                } else if capture.as_ref().is_some_and(|(_, open)| open.as_slice() == name) {
                    if let (Some((field, _)), Some(entry)) = (capture.take(), current.as_mut()) {
                        entry.set(field, std::mem::take(&mut text));
                    }
                }
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(FeedError::parse(format!(
                    "XML error at position {}: {e}",
                    reader.error_position()
                )));
            }

            _ => {}
        }
    }

    let mut candidates = Vec::new();
    for entry in raw_entries {
        let title = strip_markup(entry.title.as_deref().unwrap_or_default());
        if !is_live_title(&title) {
            debug!("Skipping feed entry without live tag: {}", title);
            continue;
        }

        let Some(link) = entry.link.map(|l| l.trim().to_string()) else {
            warn!("Skipping live feed entry without a link: {}", title);
            continue;
        };

        let date = entry
            .updated
            .or(entry.published)
            .ok_or_else(|| FeedError::invalid_timestamp(format!("<missing> for '{title}'")))?;
        let observed = parse_feed_date(&date).ok_or_else(|| FeedError::invalid_timestamp(&date))?;

        candidates.push(CandidateThread {
            metadata_url: UrlUtils::metadata_url(&link, metadata_suffix),
            title,
            link,
            observed_timestamp: epoch_seconds(observed),
        });
    }

    Ok(candidates)
}

/// Polls one feed source through an injected fetcher
#[derive(Clone)]
pub struct FeedScanner {
    fetcher: Arc<dyn HttpFetcher>,
    feed_url: String,
    metadata_suffix: String,
}

impl FeedScanner {
    pub fn new<U: Into<String>, S: Into<String>>(
        fetcher: Arc<dyn HttpFetcher>,
        feed_url: U,
        metadata_suffix: S,
    ) -> Self {
        Self {
            fetcher,
            feed_url: feed_url.into(),
            metadata_suffix: metadata_suffix.into(),
        }
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Fetch the feed and return its live candidates in feed order
    pub async fn scan(&self) -> FeedResult<Vec<CandidateThread>> {
        let content = self.fetcher.fetch_text(&self.feed_url).await?;
        let candidates = parse_feed(&content, &self.metadata_suffix)?;
        info!(
            "Scanned feed {}: {} live candidate(s)",
            UrlUtils::obfuscate_credentials(&self.feed_url),
            candidates.len()
        );
        Ok(candidates)
    }
}
