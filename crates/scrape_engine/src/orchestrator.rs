use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use scrape_core::{
    plan, update, BatchResponse, Effect, Environment, InputError, Msg, ScrapeRequest, UnitId,
    User, ValidatedUrl,
};
use scrape_logging::{abbreviate, scrape_debug, scrape_error, scrape_info, scrape_warn};

use crate::cache::{cache_key, ResultCache};
use crate::decode::decode_markup;
use crate::extract::{HtmlImageExtractor, ImageExtractor};
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::history::{HistorySink, HistorySummary};

/// Endpoint identity mixed into every cache key.
pub const SCRAPE_ENDPOINT: &str = "scrape_urls";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    pub cache_ttl: Duration,
    pub cache_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            cache_ttl: Duration::from_secs(3600),
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    #[error("not allowed in {0}")]
    NotAllowed(Environment),
}

/// How one unit ended, as seen from inside its task.
enum UnitReport {
    FetchFailed(String),
    Extracted(Vec<String>),
    ExtractFailed(String),
}

/// Fans a batch out to one isolated task per URL and folds the outcomes back
/// into a single response, memoized in the result cache.
pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ImageExtractor>,
    cache: Arc<ResultCache>,
    cache_enabled: bool,
    history: Option<Arc<dyn HistorySink>>,
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        let cache = Arc::new(ResultCache::new(config.cache_ttl));
        Self::from_parts(
            Arc::new(ReqwestFetcher::new(config.fetch)),
            Arc::new(HtmlImageExtractor::new()),
            cache,
        )
        .with_cache_enabled(config.cache_enabled)
    }

    pub fn from_parts(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn ImageExtractor>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            cache,
            cache_enabled: true,
            history: None,
        }
    }

    pub fn with_history(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.history = Some(sink);
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn history(&self) -> Option<&Arc<dyn HistorySink>> {
        self.history.as_ref()
    }

    /// Scrapes every URL in `request`.
    ///
    /// Only an empty or oversized request fails the call; everything else is
    /// reported per URL inside the response.
    pub async fn scrape(
        &self,
        request: &ScrapeRequest,
        caller: Option<&User>,
    ) -> Result<BatchResponse, InputError> {
        request.check()?;

        let key = cache_key(SCRAPE_ENDPOINT, request);
        if self.cache_enabled {
            if let Some(hit) = self.cache.get(&key) {
                scrape_info!("cache hit for batch {}", abbreviate(&key));
                return Ok(hit);
            }
            scrape_debug!("cache miss for batch {}", abbreviate(&key));
        }

        scrape_info!(
            "scraping {} url(s) for batch {}",
            request.urls.len(),
            abbreviate(&key)
        );
        let response = self.run_batch(request).await?;

        if self.cache_enabled {
            self.cache.put(key, response.clone());
        }
        self.record_history(request, caller, &response);

        Ok(response)
    }

    /// Drops every cached batch. Refused in production.
    pub fn clear_cache(&self, environment: Environment) -> Result<(), AdminError> {
        if !environment.allows_admin() {
            scrape_warn!("refusing to clear cache in {}", environment);
            return Err(AdminError::NotAllowed(environment));
        }
        self.cache.clear();
        scrape_info!("result cache cleared");
        Ok(())
    }

    async fn run_batch(&self, request: &ScrapeRequest) -> Result<BatchResponse, InputError> {
        let (mut state, effects) = plan(request)?;

        let mut units: Vec<UnitId> = Vec::with_capacity(effects.len());
        let mut tasks = Vec::with_capacity(effects.len());
        for effect in effects {
            let Effect::Fetch { unit, url } = effect;
            state = update(state, Msg::FetchStarted { unit });
            units.push(unit);
            tasks.push(tokio::spawn(run_unit(
                self.fetcher.clone(),
                self.extractor.clone(),
                url,
            )));
        }

        let outcomes = join_all(tasks).await;
        for (unit, outcome) in units.into_iter().zip(outcomes) {
            let url = state.unit_url(unit).unwrap_or_default().to_string();
            let report = match outcome {
                Ok(report) => report,
                Err(join_err) => {
                    scrape_error!("unit for {} aborted: {}", url, join_err);
                    state = update(
                        state,
                        Msg::UnitAborted {
                            unit,
                            detail: "unit aborted unexpectedly".to_string(),
                        },
                    );
                    continue;
                }
            };
            state = match report {
                UnitReport::FetchFailed(detail) => {
                    scrape_warn!("fetch failed for {}: {}", url, detail);
                    update(state, Msg::FetchFailed { unit, detail })
                }
                UnitReport::Extracted(images) => {
                    scrape_debug!("{} image(s) found at {}", images.len(), url);
                    let state = update(state, Msg::FetchSucceeded { unit });
                    update(state, Msg::ImagesExtracted { unit, images })
                }
                UnitReport::ExtractFailed(detail) => {
                    scrape_warn!("extraction failed for {}: {}", url, detail);
                    let state = update(state, Msg::FetchSucceeded { unit });
                    update(state, Msg::ExtractFailed { unit, detail })
                }
            };
        }

        Ok(state.into_response())
    }

    fn record_history(&self, request: &ScrapeRequest, caller: Option<&User>, response: &BatchResponse) {
        let (Some(user), Some(sink)) = (caller, self.history.clone()) else {
            return;
        };
        if response.results.is_empty() {
            return;
        }

        let summary = HistorySummary {
            user_id: user.id.clone(),
            urls: request.urls.clone(),
            image_count: response.results.image_count(),
        };
        tokio::spawn(async move {
            let user_id = summary.user_id.clone();
            match sink.write(summary).await {
                Ok(entry) => scrape_debug!("history entry {} saved for {}", entry.id, user_id),
                Err(err) => scrape_error!("Failed to save history for {}: {}", user_id, err),
            }
        });
    }
}

async fn run_unit(
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ImageExtractor>,
    url: ValidatedUrl,
) -> UnitReport {
    let page = match fetcher.fetch(&url).await {
        Ok(page) => page,
        Err(err) => return UnitReport::FetchFailed(err.to_string()),
    };

    let markup = decode_markup(&page.body, page.content_type.as_deref());

    match extractor.extract(&markup, &page.final_url) {
        Ok(images) => UnitReport::Extracted(images),
        Err(err) => UnitReport::ExtractFailed(err.to_string()),
    }
}
