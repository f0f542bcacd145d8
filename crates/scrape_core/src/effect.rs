use crate::{UnitId, ValidatedUrl};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run fetch + extract for one validated URL.
    Fetch { unit: UnitId, url: ValidatedUrl },
}
