//! Page extraction provider abstraction.
//!
//! A `PageExtractor` fetches one URL and reduces it to plain text, which the
//! `extract_page` tool feeds into `Source::set_full_content`.

use ra_domain::config::PageExtractConfig;
use ra_domain::error::{Error, Result};

use crate::util::from_reqwest;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fetches a single URL and returns its textual content, truncated to the
/// configured character budget.
#[async_trait::async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP + tag-stripping adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fetches a URL over HTTP and strips markup with a conservative
/// state-machine tag stripper, dropping `<script>`/`<style>` bodies
/// entirely and collapsing whitespace. Good enough for article-style pages;
/// anything requiring JS rendering is out of scope.
pub struct HttpPageExtractor {
    client: reqwest::Client,
    max_chars: usize,
}

impl HttpPageExtractor {
    pub fn new(timeout_ms: u64, max_chars: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .user_agent("research-agent/0.1")
            .build()
            .map_err(from_reqwest)?;
        Ok(Self { client, max_chars })
    }

    pub fn from_config(cfg: &PageExtractConfig) -> Result<Self> {
        Self::new(cfg.timeout_ms, cfg.max_chars)
    }
}

#[async_trait::async_trait]
impl PageExtractor for HttpPageExtractor {
    async fn extract(&self, url: &str) -> Result<String> {
        tracing::debug!(url = %url, "page extract request");

        let resp = self.client.get(url).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Provider {
                provider: "page_extract".into(),
                message: format!("HTTP {} fetching {}", status.as_u16(), url),
            });
        }

        let html = resp.text().await.map_err(from_reqwest)?;
        let text = strip_html(&html);
        Ok(truncate_chars(&text, self.max_chars))
    }
}

/// Strip HTML tags, dropping the contents of `<script>`/`<style>` blocks
/// entirely and collapsing runs of whitespace into single spaces.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut chars = html.chars().peekable();
    let mut in_tag = false;
    let mut skip_until: Option<&'static str> = None;
    let mut tag_buf = String::new();

    while let Some(c) = chars.next() {
        if skip_until.is_some() {
            tag_buf.push(c.to_ascii_lowercase());
            if let Some(needle) = skip_until {
                if tag_buf.ends_with(needle) {
                    skip_until = None;
                    tag_buf.clear();
                }
            }
            continue;
        }

        if c == '<' {
            in_tag = true;
            tag_buf.clear();
            continue;
        }
        if in_tag {
            if c == '>' {
                in_tag = false;
                let lower = tag_buf.to_ascii_lowercase();
                if lower.starts_with("script") {
                    skip_until = Some("</script>");
                } else if lower.starts_with("style") {
                    skip_until = Some("</style>");
                } else {
                    out.push(' ');
                }
                tag_buf.clear();
            } else {
                tag_buf.push(c);
            }
            continue;
        }
        out.push(c);
    }

    collapse_whitespace(&unescape_entities(&out))
}

fn unescape_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

/// Truncate to at most `max_chars` characters at a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_drops_tags() {
        let html = "<html><body><h1>Title</h1><p>Hello <b>world</b>.</p></body></html>";
        let text = strip_html(html);
        assert_eq!(text, "Title Hello world .");
    }

    #[test]
    fn strip_html_drops_script_and_style_bodies() {
        let html = "<p>keep</p><script>var x = 1 < 2;</script><style>.a{color:red}</style><p>also keep</p>";
        let text = strip_html(html);
        assert!(text.contains("keep"));
        assert!(text.contains("also keep"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color:red"));
    }

    #[test]
    fn strip_html_unescapes_entities() {
        let html = "<p>Tom &amp; Jerry &lt;3</p>";
        assert_eq!(strip_html(html), "Tom & Jerry <3");
    }

    #[test]
    fn collapse_whitespace_merges_runs() {
        assert_eq!(collapse_whitespace("a   b\n\nc\t d"), "a b c d");
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        let s = "hello world";
        assert_eq!(truncate_chars(s, 5), "hello");
        assert_eq!(truncate_chars(s, 100), "hello world");
    }
}
