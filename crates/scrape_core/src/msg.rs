use crate::UnitId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The unit's request has been dispatched.
    FetchStarted { unit: UnitId },
    /// Markup arrived for the unit.
    FetchSucceeded { unit: UnitId },
    /// Network, timeout or status failure.
    FetchFailed { unit: UnitId, detail: String },
    /// Images resolved from the fetched markup.
    ImagesExtracted { unit: UnitId, images: Vec<String> },
    /// Decoding or parsing the markup failed.
    ExtractFailed { unit: UnitId, detail: String },
    /// The unit died at its isolation boundary (e.g. a panic inside the task).
    UnitAborted { unit: UnitId, detail: String },
}

impl Msg {
    pub fn unit(&self) -> UnitId {
        match self {
            Msg::FetchStarted { unit }
            | Msg::FetchSucceeded { unit }
            | Msg::FetchFailed { unit, .. }
            | Msg::ImagesExtracted { unit, .. }
            | Msg::ExtractFailed { unit, .. }
            | Msg::UnitAborted { unit, .. } => *unit,
        }
    }
}
