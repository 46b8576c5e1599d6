//! RSS 2.0 export of the corpus

use super::entry::{strip_illegal_xml_chars, Entry};
use crate::storage::{write_text_atomic, StorageError};
use chrono::Utc;
use rss::{Channel, Guid, Item};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("rss encoding failed: {0}")]
    Rss(#[from] rss::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Build the aggregated channel for `entries` (already sorted and capped).
pub fn build_channel(entries: &[Entry]) -> Channel {
    let items: Vec<Item> = entries.iter().map(to_item).collect();

    let mut channel = Channel::default();
    channel.set_title("My Customized Papers");
    channel.set_link("https://github.com/paperfeed/paperfeed");
    channel.set_description("Aggregated research papers");
    channel.set_language(Some("en-US".to_string()));
    channel.set_last_build_date(Some(Utc::now().to_rfc2822()));
    channel.set_items(items);
    channel
}

fn to_item(entry: &Entry) -> Item {
    let mut guid = Guid::default();
    guid.set_value(entry.identity.clone());
    guid.set_permalink(false);

    let mut item = Item::default();
    item.set_title(Some(strip_illegal_xml_chars(&entry.display_title())));
    item.set_link(Some(entry.link.clone()));
    item.set_description(Some(strip_illegal_xml_chars(&entry.summary)));
    item.set_author(Some(strip_illegal_xml_chars(&entry.journal)));
    item.set_guid(Some(guid));
    item.set_pub_date(Some(entry.published_at.to_rfc2822()));
    item
}

/// Rewrite the RSS export at `path`.
pub fn write_rss(path: &Path, entries: &[Entry]) -> Result<(), ExportError> {
    let bytes = build_channel(entries).write_to(Vec::new())?;
    write_text_atomic(path, &String::from_utf8_lossy(&bytes))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::parse_feed;

    fn entry(id: &str, title: &str) -> Entry {
        Entry {
            title: title.into(),
            link: format!("https://j.example/{}", id),
            published_at: Utc::now(),
            summary: "abstract\u{01} text".into(),
            journal: "J".into(),
            identity: id.into(),
        }
    }

    #[test]
    fn export_reads_back_with_identity_as_guid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered_feed.xml");
        write_rss(&path, &[entry("a", "First"), entry("b", "Second")]).unwrap();

        let body = std::fs::read(&path).unwrap();
        let parsed = parse_feed(&body, Utc::now()).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].identity, "a");
        assert_eq!(parsed.entries[0].title, "[J] First");
        assert_eq!(parsed.entries[0].summary, "abstract text");
    }
}
