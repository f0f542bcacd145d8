use std::collections::HashSet;

use crate::state::Unit;
use crate::{BatchState, Effect, InputError, Msg, ScrapeRequest, UnitState, ValidatedUrl};

/// Validates the request and lays out one unit per distinct URL.
///
/// Invalid URLs are settled immediately; every valid URL yields one
/// `Effect::Fetch`. Repeated URLs are planned once, at their first position.
pub fn plan(request: &ScrapeRequest) -> Result<(BatchState, Vec<Effect>), InputError> {
    request.check()?;

    let mut seen = HashSet::new();
    let mut state = BatchState::default();
    let mut effects = Vec::with_capacity(request.urls.len());

    for raw in &request.urls {
        if !seen.insert(raw.as_str()) {
            continue;
        }
        let unit = state.units.len();
        match ValidatedUrl::parse(raw) {
            Some(url) => {
                state.units.push(Unit {
                    url: raw.clone(),
                    state: UnitState::Pending,
                });
                effects.push(Effect::Fetch { unit, url });
            }
            None => state.units.push(Unit {
                url: raw.clone(),
                state: UnitState::Invalid,
            }),
        }
    }

    Ok((state, effects))
}

/// Pure update function: applies a message to the batch.
///
/// Messages that do not match the unit's current state are ignored, so a
/// settled unit can never be moved into a second bucket.
pub fn update(mut state: BatchState, msg: Msg) -> BatchState {
    let unit = msg.unit();
    let current = state.units.get(unit).map(|u| &u.state);
    let next = match (current, msg) {
        (Some(UnitState::Pending), Msg::FetchStarted { .. }) => Some(UnitState::Fetching),
        (Some(UnitState::Fetching), Msg::FetchSucceeded { .. }) => Some(UnitState::Fetched),
        (Some(UnitState::Fetching), Msg::FetchFailed { detail, .. }) => {
            Some(UnitState::FetchFailed(detail))
        }
        (Some(UnitState::Fetched), Msg::ImagesExtracted { images, .. }) => {
            Some(UnitState::Done(images))
        }
        (Some(UnitState::Fetched), Msg::ExtractFailed { detail, .. }) => {
            Some(UnitState::ExtractFailed(detail))
        }
        (Some(UnitState::Pending | UnitState::Fetching), Msg::UnitAborted { detail, .. }) => {
            Some(UnitState::FetchFailed(detail))
        }
        (Some(UnitState::Fetched), Msg::UnitAborted { detail, .. }) => {
            Some(UnitState::ExtractFailed(detail))
        }
        _ => None,
    };

    if let Some(next) = next {
        state.units[unit].state = next;
    }
    state
}
