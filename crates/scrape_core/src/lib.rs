//! Scrape core: pure batch planning, per-URL state machine and wire types.
mod effect;
mod msg;
mod pagination;
mod request;
mod response;
mod state;
mod update;
mod user;

pub use effect::Effect;
pub use msg::Msg;
pub use pagination::{PageError, Pagination, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use request::{InputError, ScrapeRequest, ValidatedUrl, MAX_URLS};
pub use response::{BatchResponse, HealthResponse, ScrapeError, ScrapeResults};
pub use state::{BatchState, UnitId, UnitState, INVALID_URL_MESSAGE};
pub use update::{plan, update};
pub use user::{Environment, User};
