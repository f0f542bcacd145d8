use crate::{BatchResponse, ScrapeError, ScrapeResults};

pub type UnitId = usize;

pub const INVALID_URL_MESSAGE: &str = "Invalid URL format";

/// Lifecycle of one URL within a batch.
///
/// `Pending -> Fetching -> {FetchFailed | Fetched} -> {Done | ExtractFailed}`.
/// URLs that fail validation start (and stay) in `Invalid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Fetching,
    Fetched,
    Done(Vec<String>),
    Invalid,
    FetchFailed(String),
    ExtractFailed(String),
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitState::Done(_)
                | UnitState::Invalid
                | UnitState::FetchFailed(_)
                | UnitState::ExtractFailed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Unit {
    pub(crate) url: String,
    pub(crate) state: UnitState,
}

/// All units of a batch, kept in request order so the assembled response is
/// independent of the order in which units finish.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchState {
    pub(crate) units: Vec<Unit>,
}

impl BatchState {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit_state(&self, unit: UnitId) -> Option<&UnitState> {
        self.units.get(unit).map(|u| &u.state)
    }

    pub fn unit_url(&self, unit: UnitId) -> Option<&str> {
        self.units.get(unit).map(|u| u.url.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.units.iter().all(|u| u.state.is_terminal())
    }

    pub fn into_response(self) -> BatchResponse {
        let mut results = ScrapeResults::new();
        let mut errors = Vec::new();
        for unit in self.units {
            match unit.state {
                UnitState::Done(images) => results.insert(unit.url, images),
                UnitState::Invalid => errors.push(ScrapeError::new(unit.url, INVALID_URL_MESSAGE)),
                UnitState::FetchFailed(detail) => errors.push(ScrapeError::new(
                    unit.url,
                    format!("Failed to scrape: {detail}"),
                )),
                UnitState::ExtractFailed(detail) => errors.push(ScrapeError::new(
                    unit.url,
                    format!("Failed to extract images: {detail}"),
                )),
                UnitState::Pending | UnitState::Fetching | UnitState::Fetched => errors.push(
                    ScrapeError::new(unit.url, "Failed to scrape: unit did not complete"),
                ),
            }
        }
        BatchResponse { results, errors }
    }
}
