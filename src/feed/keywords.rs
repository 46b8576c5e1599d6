//! Keyword queries: `term AND term` conjunctions matched against title and summary

use super::entry::Entry;

/// A set of conjunctive queries; an entry matches when any query matches.
#[derive(Debug, Clone, Default)]
pub struct KeywordQueries {
    queries: Vec<Vec<String>>,
}

impl KeywordQueries {
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        let queries = lines
            .iter()
            .map(|line| {
                line.as_ref()
                    .split("AND")
                    .map(|term| term.trim().to_lowercase())
                    .filter(|term| !term.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|terms| !terms.is_empty())
            .collect();
        Self { queries }
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        let haystack = format!("{} {}", entry.title, entry.summary).to_lowercase();
        self.queries
            .iter()
            .any(|terms| terms.iter().all(|term| haystack.contains(term.as_str())))
    }

    /// Every distinct term, sorted case-insensitively.
    pub fn keywords<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for line in lines {
            for part in line.as_ref().split("AND") {
                let part = part.trim();
                if !part.is_empty() && !terms.iter().any(|t| t == part) {
                    terms.push(part.to_string());
                }
            }
        }
        terms.sort_by_key(|t| t.to_lowercase());
        terms
    }
}
