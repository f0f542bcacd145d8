//! Scrape engine: fetching, image extraction, caching and the batch orchestrator.
mod cache;
mod decode;
mod extract;
mod fetch;
mod history;
mod identity;
mod orchestrator;
mod persist;
mod types;

pub use cache::{cache_key, CacheStats, Clock, ManualClock, ResultCache, SystemClock};
pub use decode::decode_markup;
pub use extract::{ExtractError, HtmlImageExtractor, ImageExtractor};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use history::{
    utc_now_rfc3339, HistoryEntry, HistoryError, HistoryPage, HistorySink, HistorySummary,
    InMemoryHistorySink, JsonFileHistorySink, TimestampFn,
};
pub use identity::{
    bearer_token, optional_user, require_user, AuthError, IdentityProvider, StaticTokenIdentity,
};
pub use orchestrator::{AdminError, EngineConfig, Orchestrator, SCRAPE_ENDPOINT};
pub use persist::{ensure_store_dir, AtomicFileWriter, PersistError};
pub use types::{FailureKind, FetchError, FetchedPage};
