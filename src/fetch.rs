//! Multi-strategy page fetcher.
//!
//! Retrieval runs through an ordered list of transport strategies, stopping
//! at the first one that returns a 2xx response with a decodable body. A
//! strategy failure is logged and the chain proceeds; only when every
//! strategy is exhausted does the fetch report `FetchFailed`, which the
//! orchestrator treats as "zero links at this URL" rather than a fatal error.

use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};
use url::Url;

use crate::core::error::{ScoutError, ScoutResult};

/// Per-strategy attempt budget. Each strategy also carries its own client
/// timeouts; this is the outer bound.
const STRATEGY_TIMEOUT: Duration = Duration::from_secs(12);

/// User agents rotated by the browser-profile strategy. Cosmetic variety
/// only; selection order of the strategies themselves is fixed.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.2; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// Pick a random user agent string.
pub fn random_user_agent() -> &'static str {
    use rand::prelude::*;
    let mut rng = rand::rng();
    let index = rng.random_range(0..USER_AGENTS.len());
    USER_AGENTS[index]
}

/// One way of retrieving a page. Strategies must not panic; any failure is
/// an `Err` so the chain can move on.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn try_fetch(&self, url: &str) -> ScoutResult<String>;
}

/// Full-featured HTTP client presenting browser-like headers with a
/// randomized user agent.
struct BrowserClientStrategy {
    client: reqwest::Client,
}

impl BrowserClientStrategy {
    fn new() -> ScoutResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(STRATEGY_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchStrategy for BrowserClientStrategy {
    fn name(&self) -> &'static str {
        "browser-client"
    }

    async fn try_fetch(&self, url: &str) -> ScoutResult<String> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", random_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Pooled HTTP client wrapped in exponential-backoff retry. Network errors
/// and 5xx responses are transient; 4xx responses fail immediately.
struct PooledClientStrategy {
    client: reqwest::Client,
}

#[async_trait]
impl FetchStrategy for PooledClientStrategy {
    fn name(&self) -> &'static str {
        "pooled-retry"
    }

    async fn try_fetch(&self, url: &str) -> ScoutResult<String> {
        retry(
            ExponentialBackoffBuilder::new()
                .with_initial_interval(Duration::from_millis(200))
                .with_max_interval(Duration::from_secs(2))
                .with_max_elapsed_time(Some(Duration::from_secs(6)))
                .build(),
            || async {
                let response = self
                    .client
                    .get(url)
                    .header("User-Agent", "Mozilla/5.0 (compatible; LinkScout/1.0)")
                    .send()
                    .await
                    .map_err(|e| backoff::Error::transient(ScoutError::Http(e)))?;

                let status = response.status();
                if status.is_server_error() {
                    return Err(backoff::Error::transient(ScoutError::UnexpectedStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    }));
                }
                if !status.is_success() {
                    return Err(backoff::Error::permanent(ScoutError::UnexpectedStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    }));
                }
                response
                    .text()
                    .await
                    .map_err(|e| backoff::Error::permanent(ScoutError::Http(e)))
            },
        )
        .await
    }
}

/// Minimal raw-socket HTTP/1.0 GET. Plain `http` only; an `https` URL is
/// reported as unsupported so the chain can end cleanly.
struct PlainHttpStrategy;

#[async_trait]
impl FetchStrategy for PlainHttpStrategy {
    fn name(&self) -> &'static str {
        "plain-http"
    }

    async fn try_fetch(&self, url: &str) -> ScoutResult<String> {
        let parsed = Url::parse(url)?;
        if parsed.scheme() != "http" {
            return Err(ScoutError::Transport(format!(
                "scheme '{}' not supported by the raw-socket strategy",
                parsed.scheme()
            )));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| ScoutError::Transport("missing host".to_string()))?;
        let port = parsed.port_or_known_default().unwrap_or(80);

        let mut stream = TcpStream::connect((host, port)).await?;

        let target = match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_string(),
        };
        let request = format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: Mozilla/5.0 (compatible; LinkScout/1.0)\r\nAccept: text/html\r\nConnection: close\r\n\r\n",
            target, host
        );
        stream.write_all(request.as_bytes()).await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        let response = String::from_utf8_lossy(&raw);

        let (head, body) = response
            .split_once("\r\n\r\n")
            .ok_or_else(|| ScoutError::Transport("malformed HTTP response".to_string()))?;
        let status = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| ScoutError::Transport("malformed status line".to_string()))?;

        if !(200..300).contains(&status) {
            return Err(ScoutError::UnexpectedStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(body.to_string())
    }
}

/// Ordered strategy chain. Construction order is fixed and deterministic;
/// only the user agent within the first strategy is randomized.
pub struct Fetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl Fetcher {
    /// `pooled` is the process-wide shared client, reused so the retry
    /// strategy benefits from its connection pool.
    pub fn new(pooled: reqwest::Client) -> ScoutResult<Self> {
        Ok(Self {
            strategies: vec![
                Box::new(BrowserClientStrategy::new()?),
                Box::new(PooledClientStrategy { client: pooled }),
                Box::new(PlainHttpStrategy),
            ],
        })
    }

    /// Fetch `url`, trying each strategy in order. Returns the first
    /// successfully decoded body, or `FetchFailed` when the chain is
    /// exhausted.
    pub async fn fetch(&self, url: &str) -> ScoutResult<String> {
        for strategy in &self.strategies {
            match tokio::time::timeout(STRATEGY_TIMEOUT, strategy.try_fetch(url)).await {
                Ok(Ok(body)) => {
                    debug!("fetched {} via {}", url, strategy.name());
                    return Ok(body);
                }
                Ok(Err(e)) => {
                    warn!("fetch strategy {} failed for {}: {}", strategy.name(), url, e);
                }
                Err(_) => {
                    warn!("fetch strategy {} timed out for {}", strategy.name(), url);
                }
            }
        }
        Err(ScoutError::FetchFailed {
            url: url.to_string(),
        })
    }
}
