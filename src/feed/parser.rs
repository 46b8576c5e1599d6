//! Feed document parsing
//!
//! Turns one RSS document into canonical entries. Items are never rejected
//! for a missing date (ingestion time is used); only items with no identity
//! at all are skipped. Only RSS 2.0 (and RSS 0.9x) channels are read; an
//! Atom document is a parse error, so that source yields nothing.

use super::entry::{resolve_identity, Entry};
use chrono::{DateTime, NaiveDate, Utc};
use rss::{Channel, Item};
use thiserror::Error;
use tracing::debug;

/// Journal name used when a channel has no title
pub const UNKNOWN_JOURNAL: &str = "Unknown Journal";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid RSS document: {0}")]
    Rss(#[from] rss::Error),
}

/// Entries parsed from one source document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub journal: String,
    pub entries: Vec<Entry>,
    /// Items dropped because they carried neither id nor link
    pub skipped: usize,
}

/// Parse an RSS document, stamping undated items with `ingested_at`.
pub fn parse_feed(body: &[u8], ingested_at: DateTime<Utc>) -> Result<ParsedFeed, ParseError> {
    let channel = Channel::read_from(body)?;
    let journal = match channel.title().trim() {
        "" => UNKNOWN_JOURNAL.to_string(),
        title => title.to_string(),
    };

    let mut entries = Vec::with_capacity(channel.items().len());
    let mut skipped = 0;
    for item in channel.items() {
        match parse_item(item, &journal, ingested_at) {
            Some(entry) => entries.push(entry),
            None => {
                skipped += 1;
                debug!(journal = %journal, title = ?item.title(), "item without id or link skipped");
            }
        }
    }

    Ok(ParsedFeed {
        journal,
        entries,
        skipped,
    })
}

fn parse_item(item: &Item, journal: &str, ingested_at: DateTime<Utc>) -> Option<Entry> {
    let link = item.link().unwrap_or_default().trim().to_string();
    let identity = resolve_identity(item.guid().map(|g| g.value()), &link)?;

    let published_at = item
        .pub_date()
        .and_then(parse_date)
        .or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.dates().iter().find_map(|d| parse_date(d)))
        })
        .unwrap_or(ingested_at);

    let summary = item
        .description()
        .or_else(|| item.content())
        .unwrap_or_default()
        .to_string();

    Some(Entry {
        title: item.title().unwrap_or_default().trim().to_string(),
        link,
        published_at,
        summary,
        journal: journal.to_string(),
        identity,
    })
}

/// Parse the date formats seen in journal feeds: RFC 2822, RFC 3339, bare dates.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
