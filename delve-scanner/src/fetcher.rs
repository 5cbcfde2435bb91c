use crate::error::{Result, ScanError};
use crate::page::{HtmlPage, Page};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Retrieves a URL and turns the body into a [`Page`].
///
/// Implementations must give up promptly once `cancel` fires and must report
/// that as [`ScanError::Cancelled`] rather than as a fetch failure.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Box<dyn Page>>;
}

/// Plain HTTP GET fetcher with a fixed per-request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("Delve/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn get(&self, url: &str) -> Result<HtmlPage> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_decode() {
                ScanError::ParseError(format!("undecodable body from {}: {}", url, e))
            } else {
                ScanError::HttpError(e)
            }
        })?;
        HtmlPage::parse(url, &body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Box<dyn Page>> {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled(url.to_string()));
        }

        debug!("Fetching {}", url);
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Fetch of {} abandoned, crawl cancelled", url);
                Err(ScanError::Cancelled(url.to_string()))
            }
            page = self.get(url) => {
                let page: Box<dyn Page> = Box::new(page?);
                Ok(page)
            }
        }
    }
}
