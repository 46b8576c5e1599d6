//! Feed ingestion: entry identity, document parsing, fetching and export

mod entry;
mod export;
mod fetch;
mod keywords;
mod parser;

pub use entry::{resolve_identity, strip_illegal_xml_chars, strip_markup, Entry};
pub use export::{build_channel, write_rss, ExportError};
pub use fetch::{fetch_source, FeedFetcher, FetchError, HttpFeedFetcher, RetryPolicy};
pub use keywords::KeywordQueries;
pub use parser::{parse_date, parse_feed, ParseError, ParsedFeed, UNKNOWN_JOURNAL};
