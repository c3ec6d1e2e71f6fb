//! HTTP transport with retry on transient network failures.
//!
//! Only connection errors and timeouts are retried. Any HTTP status is a
//! valid outcome and is returned to the caller as-is.

use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use tracing::debug;

use super::retry::RetryPolicy;
use crate::error::{FetcherError, Result};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("cached-http-fetcher/", env!("CARGO_PKG_VERSION"));

/// A completed HTTP exchange, after redirects.
#[derive(Debug, Clone)]
pub struct Response {
    /// URL the caller asked for. Cache records are keyed by this.
    pub requested_url: String,
    /// URL that produced the response, after following redirects.
    pub final_url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    /// A header value as text, if present and valid.
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    pub fn etag(&self) -> Option<&str> {
        self.header(ETAG)
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.header(LAST_MODIFIED)
    }

    /// Whether redirects moved the request to another URL.
    pub fn was_redirected(&self) -> bool {
        self.requested_url != self.final_url
    }
}

/// Performs a GET and reports the outcome.
///
/// Implementations follow redirects and report the effective URL in
/// [`Response::final_url`].
pub trait Transport: Send + Sync {
    /// Fetch `url` with the given extra request headers.
    ///
    /// Returns `FetcherError::Transport` when no response could be obtained.
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<Response>;
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Per-attempt timeout, covering connect and body download.
    pub timeout: Duration,
    pub user_agent: String,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
    pub retry: RetryPolicy,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: USER_AGENT.to_string(),
            accept_invalid_certs: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    options: HttpOptions,
}

impl HttpTransport {
    /// Build a transport with the given options.
    pub fn new(options: HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .redirect(Policy::limited(10))
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| FetcherError::Other(anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, options })
    }

    /// Get the configured options.
    pub fn options(&self) -> &HttpOptions {
        &self.options
    }

    fn attempt(&self, url: &str, headers: &HeaderMap) -> reqwest::Result<Response> {
        let response = self.client.get(url).headers(headers.clone()).send()?;

        let final_url = response.url().to_string();
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.bytes()?.to_vec();

        Ok(Response {
            requested_url: url.to_string(),
            final_url,
            status,
            headers: response_headers,
            body,
        })
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<Response> {
        let retry = self.options.retry;
        let mut attempt = 1;

        loop {
            match self.attempt(url, headers) {
                Ok(response) => return Ok(response),
                Err(e) if is_transient(&e) && attempt < retry.max_attempts => {
                    let delay = retry.delay(&mut rand::thread_rng(), attempt);
                    debug!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempt, url, e, delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(FetcherError::Transport {
                        url: url.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::header::{HeaderValue, IF_NONE_MATCH};

    fn fast_transport(max_attempts: u32) -> HttpTransport {
        HttpTransport::new(HttpOptions {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(1)),
            ..HttpOptions::default()
        })
        .unwrap()
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}/gone", port)
    }

    #[test]
    fn default_options() {
        let options = HttpOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.user_agent, USER_AGENT);
        assert!(!options.accept_invalid_certs);
        assert_eq!(options.retry.max_attempts, 4);
    }

    #[test]
    fn get_returns_status_headers_and_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a.txt");
            then.status(200)
                .header("etag", "\"v1\"")
                .header("content-type", "text/plain")
                .body("hello");
        });

        let url = server.url("/a.txt");
        let response = fast_transport(4).get(&url, &HeaderMap::new()).unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, b"hello");
        assert_eq!(response.etag(), Some("\"v1\""));
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.requested_url, url);
        assert!(!response.was_redirected());
    }

    #[test]
    fn get_sends_user_agent_and_conditional_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/cond")
                .header("user-agent", USER_AGENT)
                .header("if-none-match", "\"v1\"");
            then.status(304);
        });

        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"v1\""));
        let response = fast_transport(4)
            .get(&server.url("/cond"), &headers)
            .unwrap();

        assert_eq!(response.status, StatusCode::NOT_MODIFIED);
        mock.assert();
    }

    #[test]
    fn error_statuses_are_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/broken");
            then.status(500).body("oops");
        });

        let response = fast_transport(4)
            .get(&server.url("/broken"), &HeaderMap::new())
            .unwrap();

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        mock.assert_calls(1);
    }

    #[test]
    fn redirects_are_followed_and_reported() {
        let origin = MockServer::start();
        let target = MockServer::start();
        target.mock(|when, then| {
            when.method(GET).path("/y");
            then.status(200).body("moved");
        });
        let target_url = target.url("/y");
        origin.mock(|when, then| {
            when.method(GET).path("/x");
            then.status(302).header("location", target_url.as_str());
        });

        let requested = origin.url("/x");
        let response = fast_transport(4)
            .get(&requested, &HeaderMap::new())
            .unwrap();

        assert_eq!(response.requested_url, requested);
        assert_eq!(response.final_url, target_url);
        assert!(response.was_redirected());
        assert_eq!(response.body, b"moved");
    }

    #[test]
    fn connection_failures_exhaust_retries() {
        let err = fast_transport(4)
            .get(&closed_port_url(), &HeaderMap::new())
            .unwrap_err();

        match err {
            FetcherError::Transport { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("expected Transport error, got {:?}", other),
        }
    }

    #[test]
    fn single_attempt_policy_does_not_retry() {
        let err = fast_transport(1)
            .get(&closed_port_url(), &HeaderMap::new())
            .unwrap_err();

        assert!(matches!(err, FetcherError::Transport { attempts: 1, .. }));
    }
}
