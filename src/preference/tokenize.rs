//! Title tokenization

/// Words carrying no topical signal in paper titles.
const STOP_WORDS: &[&str] = &[
    "about", "across", "after", "against", "all", "also", "among", "and", "any", "are", "around",
    "based", "been", "before", "being", "between", "beyond", "both", "but", "can", "case", "does",
    "doing", "down", "during", "each", "effect", "effects", "evidence", "for", "from", "further",
    "had", "has", "have", "how", "into", "its", "more", "most", "new", "not", "off", "once", "only",
    "other", "our", "out", "over", "own", "role", "same", "should", "some", "such", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "those", "through", "too",
    "toward", "towards", "under", "until", "upon", "using", "very", "via", "was", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "within", "without",
    "you", "your",
];

const MIN_TOKEN_LEN: usize = 3;

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

/// Lowercase, non-alphanumerics to spaces; drops short, stop-word and numeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .filter(|t| !t.chars().all(|c| c.is_numeric()))
        .filter(|t| !is_stop_word(t))
        .map(String::from)
        .collect()
}

/// Adjacent-pair bigrams over already filtered tokens.
pub fn bigrams(tokens: &[String]) -> Vec<String> {
    tokens.windows(2).map(|w| format!("{} {}", w[0], w[1])).collect()
}
