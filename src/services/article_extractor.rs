// Article Text Extraction
// Fetches a web page and returns its paragraph text for text analysis

use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{info, warn};

use super::text_processor::truncate_chars;

pub const MAX_ARTICLE_CHARS: usize = 4000;
const FETCH_TIMEOUT_SECS: u64 = 10;

/// Join the text of every `<p>` element with newlines, truncated to `max_chars`.
pub fn paragraphs_from_html(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("p") {
        Ok(s) => s,
        Err(_) => return String::new(),
    };
    let paragraphs: Vec<String> = document
        .select(&selector)
        .map(|p| p.text().collect::<String>())
        .collect();
    truncate_chars(&paragraphs.join("\n"), max_chars)
}

/// Fetch `url` and extract its paragraph text. `None` on any fetch failure.
pub async fn extract_text_from_url(client: &Client, url: &str) -> Option<String> {
    let response = match client
        .get(url)
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!("[ARTICLE] Error fetching {}: {}", url, e);
            return None;
        }
    };

    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => {
            warn!("[ARTICLE] Error reading body of {}: {}", url, e);
            return None;
        }
    };

    let text = paragraphs_from_html(&body, MAX_ARTICLE_CHARS);
    info!("[ARTICLE] Extracted {} chars from {}", text.chars().count(), url);
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_joined_with_newlines() {
        let html = "<html><body><h1>Title</h1><p>First <b>para</b>.</p><div>skip</div><p>Second.</p></body></html>";
        assert_eq!(paragraphs_from_html(html, MAX_ARTICLE_CHARS), "First para.\nSecond.");
    }

    #[test]
    fn test_paragraphs_truncated() {
        let html = format!("<p>{}</p>", "a".repeat(5000));
        assert_eq!(paragraphs_from_html(&html, MAX_ARTICLE_CHARS).chars().count(), 4000);
    }

    #[test]
    fn test_no_paragraphs_is_empty() {
        assert_eq!(paragraphs_from_html("<div>nothing</div>", 100), "");
    }

    #[tokio::test]
    async fn test_unreachable_url_is_none() {
        let client = Client::new();
        assert!(extract_text_from_url(&client, "http://127.0.0.1:9/article").await.is_none());
    }
}
