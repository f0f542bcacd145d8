use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use scrape_core::ValidatedUrl;

use crate::{FailureKind, FetchError, FetchedPage};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Whole-request budget for one unit; there is no batch-wide deadline.
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            redirect_limit: 10,
            max_bytes: 5 * 1024 * 1024,
            user_agent: format!("image-scraper/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// One GET with redirects followed. No retries: a failure is final.
    async fn fetch(&self, url: &ValidatedUrl) -> Result<FetchedPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    // A fresh client per call keeps units free of shared connection state.
    fn build_client(&self, redirect_counter: Arc<AtomicUsize>) -> Result<reqwest::Client, FetchError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count > redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .user_agent(self.settings.user_agent.clone())
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Other, err.to_string()))
    }

    fn too_large(&self, url: &str, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::Other,
            format!(
                "response too large ({actual} bytes, limit {}) for url '{url}'",
                self.settings.max_bytes
            ),
        )
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &ValidatedUrl) -> Result<FetchedPage, FetchError> {
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let response = client
            .get(url.url().clone())
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, url.as_str()))?;

        let status = response.status();
        if !status.is_success() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("N/A");
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!(
                    "{status} for url '{}'; redirect location: '{location}'",
                    response.url()
                ),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(url.as_str(), content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| map_reqwest_error(err, url.as_str()))?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(url.as_str(), next_len));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            body,
            final_url,
            content_type,
            redirect_count: redirect_counter.load(Ordering::Relaxed),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error, url: &str) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Connection
    } else {
        FailureKind::Other
    };
    let mut detail = err.to_string();
    if err.url().is_none() {
        detail.push_str(&format!(" for url '{url}'"));
    }
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !detail.contains(&text) {
            detail.push_str(": ");
            detail.push_str(&text);
        }
        source = cause.source();
    }
    FetchError::new(kind, detail)
}
