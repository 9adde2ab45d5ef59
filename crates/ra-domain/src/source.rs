use serde::{Deserialize, Serialize};

/// A retrieved document, keyed by canonical URL.
///
/// `number` is assigned on first insertion into an agent's source table and
/// never changes afterwards; numbers are dense and monotonically increasing
/// within one table. A URL appears at most once per table — re-inserting an
/// already-known URL updates `full_content`/`char_count` in place and
/// leaves `number` untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub number: u32,
    pub url: String,
    pub title: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    pub char_count: usize,
}

impl Source {
    pub fn new(number: u32, url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        let snippet = snippet.into();
        Self {
            number,
            url: url.into(),
            title: title.into(),
            char_count: snippet.len(),
            snippet,
            full_content: None,
        }
    }

    /// Replace the full content and recompute `char_count` from it.
    pub fn set_full_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        self.char_count = content.len();
        self.full_content = Some(content);
    }
}

/// The outcome of one `web_search` tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// URLs of the sources this search surfaced, in the order returned by
    /// the provider. Resolve against the owning context's source table for
    /// full `Source` records.
    pub source_urls: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_full_content_updates_char_count() {
        let mut s = Source::new(1, "https://example.com", "Example", "a short snippet");
        assert_eq!(s.char_count, "a short snippet".len());
        s.set_full_content("a much longer body of text");
        assert_eq!(s.char_count, "a much longer body of text".len());
        assert_eq!(s.full_content.as_deref(), Some("a much longer body of text"));
    }

    #[test]
    fn number_is_stable_across_content_updates() {
        let mut s = Source::new(7, "https://example.com", "Example", "snippet");
        s.set_full_content("new content");
        assert_eq!(s.number, 7);
    }
}
