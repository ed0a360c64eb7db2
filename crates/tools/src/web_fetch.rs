//! Web fetch tool: GET a URL and return the body as text.

use std::time::Duration;

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};
use tracing::debug;

use crate::fs_util::truncate_utf8;

/// Bodies longer than this are cut.
const MAX_BODY_BYTES: usize = 100 * 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("ferrule/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch content from a URL. Returns the response body as text."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Network
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch (must be http:// or https://)"
                },
                "timeout": {
                    "type": "integer",
                    "minimum": 5,
                    "maximum": 120,
                    "description": "Request timeout in seconds (default: 30)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let url = invocation.str_arg("url")?;
        let timeout_secs = invocation.u64_arg("timeout", DEFAULT_TIMEOUT_SECS);

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Ok(ToolResult::error(
                "URL must start with http:// or https://",
            ));
        }

        debug!(url = %url, timeout_secs, "Fetching URL");

        let response = match self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::error(format!("Request failed: {e}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::error(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("error")
            ))
            .with_metadata("status_code", status.as_u16()));
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::error(format!("Request failed: {e}"))),
        };
        let content_length = body.len();
        let text = String::from_utf8_lossy(&body);

        let cut = text.len() > MAX_BODY_BYTES;
        let output = if cut {
            format!(
                "{}\n... [content truncated]",
                truncate_utf8(&text, MAX_BODY_BYTES)
            )
        } else {
            text.into_owned()
        };

        let mut result = ToolResult::success(output)
            .with_metadata("status_code", status.as_u16())
            .with_metadata("content_length", content_length);
        if cut {
            result = result.truncated();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn invocation(args: serde_json::Value) -> ToolInvocation {
        ToolInvocation::new(args.as_object().cloned().unwrap(), std::env::temp_dir())
    }

    /// Serve one canned HTTP response on a random local port.
    async fn serve_once(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/page")
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let result = WebFetchTool::new()
            .execute(invocation(json!({"url": "file:///etc/passwd"})))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn fetches_body() {
        let url = serve_once("200 OK", "hello from the web".into()).await;
        let result = WebFetchTool::new()
            .execute(invocation(json!({"url": url})))
            .await
            .unwrap();
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output, "hello from the web");
        assert_eq!(result.metadata["status_code"], 200);
    }

    #[tokio::test]
    async fn large_body_is_truncated() {
        let url = serve_once("200 OK", "a".repeat(MAX_BODY_BYTES + 10)).await;
        let result = WebFetchTool::new()
            .execute(invocation(json!({"url": url})))
            .await
            .unwrap();
        assert!(result.truncated);
        assert!(result.output.ends_with("\n... [content truncated]"));
    }

    #[tokio::test]
    async fn http_error_status() {
        let url = serve_once("404 Not Found", String::new()).await;
        let result = WebFetchTool::new()
            .execute(invocation(json!({"url": url})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("HTTP 404: Not Found"));
    }
}
