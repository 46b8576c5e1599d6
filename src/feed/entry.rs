//! Entry: one canonical paper notice

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One paper notice derived from a feed item.
///
/// `identity` is the only deduplication key: a later item with the same
/// identity is the same paper even if its title or summary changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    /// Raw markup as delivered by the source
    pub summary: String,
    pub journal: String,
    pub identity: String,
}

impl Entry {
    /// Title as shown in generated feeds: `[journal] title`.
    pub fn display_title(&self) -> String {
        if self.journal.is_empty() {
            self.title.clone()
        } else {
            format!("[{}] {}", self.journal, self.title)
        }
    }
}

/// Resolve an item's identity: the source id, else the link.
///
/// Returns `None` when neither is present.
pub fn resolve_identity(source_id: Option<&str>, link: &str) -> Option<String> {
    source_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .or_else(|| Some(link.trim()).filter(|l| !l.is_empty()))
        .map(String::from)
}

/// Remove control characters XML 1.0 does not allow (tab, LF and CR stay).
pub fn strip_illegal_xml_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| !matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}'))
        .collect()
}

fn tag_pattern() -> Option<&'static Regex> {
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").ok()).as_ref()
}

/// Plain text of a markup fragment: tags removed, common entities decoded,
/// whitespace collapsed.
pub fn strip_markup(markup: &str) -> String {
    let text = match tag_pattern() {
        Some(tags) => tags.replace_all(markup, " ").into_owned(),
        None => markup.to_string(),
    };
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_source_id() {
        assert_eq!(
            resolve_identity(Some("doi:10.1/abc"), "https://x.example/a"),
            Some("doi:10.1/abc".to_string())
        );
    }

    #[test]
    fn identity_falls_back_to_link() {
        assert_eq!(
            resolve_identity(Some("   "), "https://x.example/a"),
            Some("https://x.example/a".to_string())
        );
        assert_eq!(
            resolve_identity(None, "https://x.example/b"),
            Some("https://x.example/b".to_string())
        );
    }

    #[test]
    fn identity_absent_without_id_or_link() {
        assert_eq!(resolve_identity(None, ""), None);
    }

    #[test]
    fn illegal_control_chars_are_removed() {
        let dirty = "Deep\u{0B} Learning\u{01}\tin\nRetail\r";
        assert_eq!(strip_illegal_xml_chars(dirty), "Deep Learning\tin\nRetail\r");
    }

    #[test]
    fn markup_is_reduced_to_text() {
        let html = "<p>Source: <em>Management Science</em></p>\n<jats:p>Ahead&nbsp;of print &amp; more</jats:p>";
        assert_eq!(strip_markup(html), "Source: Management Science Ahead of print & more");
    }

    #[test]
    fn display_title_prefixes_journal() {
        let entry = Entry {
            title: "A Study".into(),
            link: "https://x.example/a".into(),
            published_at: Utc::now(),
            summary: String::new(),
            journal: "Management Science".into(),
            identity: "a".into(),
        };
        assert_eq!(entry.display_title(), "[Management Science] A Study");
    }
}
