//! Static fetcher: one plain GET, no JavaScript.
//!
//! This is the fast path for server-rendered pages. It never raises: any
//! network error or non-2xx status is reported as "no HTML", so the pipeline
//! can fall through to the browser without special-casing exceptions.

use anyhow::Result;
use std::time::Duration;
use tracing::debug;

/// Result of a static fetch attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticFetch {
    /// HTTP status code, if a response arrived at all.
    pub status: Option<u16>,
    /// Response body, only for 2xx responses with a non-empty body.
    pub html: Option<String>,
}

impl StaticFetch {
    /// True when the server answered with a status bot-protection layers use.
    pub fn looks_blocked(&self) -> bool {
        matches!(self.status, Some(403 | 429 | 503))
    }
}

/// Raw response from a single GET.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// HTTP client for the static fast path.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client that identifies as desktop Chrome.
    pub fn new(timeout_ms: u64, user_agent: &str) -> Self {
        let timeout = Duration::from_millis(timeout_ms);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            timeout,
        }
    }

    /// The response body of a single browser-like GET, or `None` when the
    /// request fails or times out, answers with a non-success status, or
    /// returns a blank body.
    pub async fn fetch_static(&self, url: &str) -> Option<String> {
        self.fetch(url).await.html
    }

    /// Fetch and keep the status code for callers that inspect it.
    pub async fn fetch(&self, url: &str) -> StaticFetch {
        match self.get(url).await {
            Ok(resp) if (200..300).contains(&resp.status) => {
                debug!(url, status = resp.status, bytes = resp.body.len(), "static fetch ok");
                StaticFetch {
                    status: Some(resp.status),
                    html: Some(resp.body).filter(|b| !b.trim().is_empty()),
                }
            }
            Ok(resp) => {
                debug!(url, status = resp.status, "static fetch rejected");
                StaticFetch {
                    status: Some(resp.status),
                    html: None,
                }
            }
            Err(e) => {
                debug!(url, "static fetch failed: {e:#}");
                StaticFetch::default()
            }
        }
    }

    /// Perform a single GET.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        match self.get_inner(&self.client, url).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e:#}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    self.get_inner(&self.h1_client, url).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn get_inner(&self, client: &reqwest::Client, url: &str) -> Result<HttpResponse> {
        let r = client
            .get(url)
            .header("accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header("accept-language", "en-US,en;q=0.9")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let body = r.text().await.unwrap_or_default();

        Ok(HttpResponse {
            final_url,
            status,
            body,
        })
    }
}
