use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Upper bound on URLs accepted in one batch.
pub const MAX_URLS: usize = 10;

/// Inbound batch request: raw, unvalidated URL strings in caller order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub urls: Vec<String>,
}

impl ScrapeRequest {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    /// Rejects empty and oversized batches before any work is scheduled.
    pub fn check(&self) -> Result<(), InputError> {
        if self.urls.is_empty() {
            return Err(InputError::Empty);
        }
        if self.urls.len() > MAX_URLS {
            return Err(InputError::TooMany {
                count: self.urls.len(),
                max: MAX_URLS,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("no URLs provided")]
    Empty,
    #[error("too many URLs: {count} provided, at most {max} allowed")]
    TooMany { count: usize, max: usize },
}

/// A URL that passed the well-formedness check: absolute, `http`/`https`, with a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    raw: String,
    parsed: Url,
}

impl ValidatedUrl {
    pub fn parse(raw: &str) -> Option<Self> {
        let parsed = Url::parse(raw).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        match parsed.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return None,
        }
        Some(Self {
            raw: raw.to_string(),
            parsed,
        })
    }

    /// The string exactly as the caller supplied it; used as the result key.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.parsed
    }
}

impl fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
