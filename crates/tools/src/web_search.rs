//! Web search tool backed by DuckDuckGo's HTML endpoint.
//!
//! The results page is scraped for titles, links and snippets. Result links
//! point at a redirector; the real target is recovered from its `uddg`
//! query parameter.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};
use regex::Regex;
use reqwest::Url;
use tracing::debug;

pub const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_MAX_RESULTS: u64 = 10;
const SEARCH_TIMEOUT_SECS: u64 = 30;

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("result link pattern is valid")
});

static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)
        .expect("snippet pattern is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::with_endpoint(DUCKDUCKGO_HTML_URL)
    }

    /// Search against a different results page (same HTML layout).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .user_agent(concat!("ferrule/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns search results with titles, URLs and snippets."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Network
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 20,
                    "description": "Maximum results to return (default: 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let query = invocation.str_arg("query")?;
        let max_results = invocation.u64_arg("max_results", DEFAULT_MAX_RESULTS) as usize;

        let url = match Url::parse_with_params(&self.endpoint, &[("q", query)]) {
            Ok(url) => url,
            Err(e) => return Ok(ToolResult::error(format!("Search failed: {e}"))),
        };
        debug!(query = %query, max_results, "Searching the web");

        let page = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response.text().await,
            Ok(response) => {
                return Ok(ToolResult::error(format!(
                    "Search failed: HTTP {}",
                    response.status().as_u16()
                )));
            }
            Err(e) => Err(e),
        };
        let page = match page {
            Ok(page) => page,
            Err(e) => return Ok(ToolResult::error(format!("Search failed: {e}"))),
        };

        let hits: Vec<SearchHit> = parse_results(&page).into_iter().take(max_results).collect();
        if hits.is_empty() {
            return Ok(ToolResult::success(format!("No results found for: {query}"))
                .with_metadata("results", 0));
        }

        let mut lines = vec![format!("Search results for: {query}")];
        for (i, hit) in hits.iter().enumerate() {
            lines.push(format!("{}. Title: {}", i + 1, hit.title));
            lines.push(format!("   URL: {}", hit.url));
            if let Some(snippet) = &hit.snippet {
                lines.push(format!("   Snippet: {snippet}"));
            }
            lines.push(String::new());
        }

        Ok(ToolResult::success(lines.join("\n")).with_metadata("results", hits.len()))
    }
}

/// Pull result entries out of a DuckDuckGo HTML results page.
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    let snippets: Vec<String> = RESULT_SNIPPET
        .captures_iter(html)
        .map(|c| clean_text(&c[1]))
        .collect();

    RESULT_LINK
        .captures_iter(html)
        .enumerate()
        .map(|(i, c)| SearchHit {
            title: clean_text(&c[2]),
            url: resolve_link(&decode_entities(&c[1])),
            snippet: snippets.get(i).filter(|s| !s.is_empty()).cloned(),
        })
        .filter(|hit| !hit.title.is_empty())
        .collect()
}

/// Follow the redirector's `uddg` parameter when present.
fn resolve_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or(absolute)
}

fn clean_text(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, "");
    decode_entities(stripped.trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PAGE: &str = r#"
        <div class="result">
          <h2 class="result__title">
            <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdoc.rust-lang.org%2Fbook%2F&amp;rut=abc">The Rust <b>Programming</b> Language</a>
          </h2>
          <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">Learn <b>Rust</b> &amp; its ownership model.</a>
        </div>
        <div class="result">
          <h2 class="result__title">
            <a rel="nofollow" class="result__a" href="https://crates.io/">crates.io</a>
          </h2>
          <a class="result__snippet" href="https://crates.io/">The Rust package registry</a>
        </div>
    "#;

    fn invocation(args: serde_json::Value) -> ToolInvocation {
        ToolInvocation::new(args.as_object().cloned().unwrap(), std::env::temp_dir())
    }

    async fn serve_page(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/html/")
    }

    #[test]
    fn parses_titles_links_and_snippets() {
        let hits = parse_results(PAGE);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "The Rust Programming Language");
        assert_eq!(hits[0].url, "https://doc.rust-lang.org/book/");
        assert_eq!(
            hits[0].snippet.as_deref(),
            Some("Learn Rust & its ownership model.")
        );
        assert_eq!(hits[1].url, "https://crates.io/");
    }

    #[test]
    fn empty_page_has_no_hits() {
        assert!(parse_results("<html><body>nothing</body></html>").is_empty());
    }

    #[tokio::test]
    async fn formats_results_and_respects_max() {
        let url = serve_page(PAGE).await;
        let result = WebSearchTool::with_endpoint(url)
            .execute(invocation(json!({"query": "rust", "max_results": 1})))
            .await
            .unwrap();

        assert!(result.success, "{:?}", result.error);
        assert!(result.output.starts_with("Search results for: rust"));
        assert!(result.output.contains("1. Title: The Rust Programming Language"));
        assert!(!result.output.contains("crates.io"));
        assert_eq!(result.metadata["results"], 1);
    }

    #[tokio::test]
    async fn no_results_is_not_an_error() {
        let url = serve_page("<html></html>").await;
        let result = WebSearchTool::with_endpoint(url)
            .execute(invocation(json!({"query": "zzzz"})))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "No results found for: zzzz");
        assert_eq!(result.metadata["results"], 0);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_cleanly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WebSearchTool::with_endpoint(format!("http://{addr}/"))
            .execute(invocation(json!({"query": "rust"})))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Search failed:"));
    }
}
