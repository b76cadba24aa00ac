//! Web Fetcher (C3): retrieves a URL and extracts readable text, bounded
//! by timeout and size caps (spec §4.3). The HTTP client is built the
//! same way as `proxy::upstream::UpstreamClient` (rustls, pooled,
//! bounded timeout) — no retry middleware here, since a slow/broken page
//! should fail fast and let the Evidence Gatherer move to the next
//! candidate rather than burn its worker slot retrying.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::AppError;

const MAX_REDIRECTS: usize = 5;

pub struct WebFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

static SCRIPT_STYLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</\1>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static TITLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

impl WebFetcher {
    pub fn new(timeout_ms: u64, max_bytes: usize) -> Self {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_millis(timeout_ms))
            .connect_timeout(Duration::from_secs(5))
            .user_agent("symposium-fetcher/1.0")
            .build()
            .expect("failed to build fetcher HTTP client");
        Self { client, max_bytes }
    }

    /// Fetch `url` and return its extracted text. Times out per
    /// `FETCH_TIMEOUT_MS` (`fetch_timeout`), rejects responses over
    /// `max_bytes` (`too_large`), and maps non-2xx/blocked hosts to
    /// `fetch_blocked`.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, AppError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::FetchTimeout
                } else {
                    AppError::FetchBlocked(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(AppError::FetchBlocked(format!(
                "upstream returned {}",
                resp.status()
            )));
        }

        if let Some(len) = resp.content_length() {
            if len as usize > self.max_bytes {
                return Err(AppError::TooLarge);
            }
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|_| AppError::FetchTimeout)?;
        if bytes.len() > self.max_bytes {
            return Err(AppError::TooLarge);
        }

        let html = String::from_utf8_lossy(&bytes).into_owned();
        let title = TITLE_TAG
            .captures(&html)
            .map(|c| normalize_whitespace(&c[1]));
        let text = extract_text(&html);

        Ok(FetchedPage {
            url: url.to_string(),
            title,
            text,
        })
    }
}

fn extract_text(html: &str) -> String {
    let without_scripts = SCRIPT_STYLE_TAG.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_scripts, " ");
    normalize_whitespace(&without_tags)
}

fn normalize_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_and_strips_script_tags() {
        let html = "<html><head><title>Hi</title><script>evil()</script></head>\
                     <body><p>Hello <b>world</b></p></body></html>";
        let title = TITLE_TAG.captures(html).map(|c| normalize_whitespace(&c[1]));
        assert_eq!(title.as_deref(), Some("Hi"));
        let text = extract_text(html);
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn normalizes_repeated_whitespace() {
        assert_eq!(normalize_whitespace("  a   b\n\tc  "), "a b c");
    }
}
