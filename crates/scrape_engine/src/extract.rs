use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

const DEFAULT_MAX_IMAGES: usize = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("base url '{base}' is not absolute: {reason}")]
    InvalidBase { base: String, reason: String },
    #[error("selector error: {0}")]
    Selector(String),
}

pub trait ImageExtractor: Send + Sync {
    /// Absolute, de-duplicated image URLs in document order.
    fn extract(&self, markup: &str, base_url: &str) -> Result<Vec<String>, ExtractError>;
}

/// Collects `<img src>` references and resolves them against the page URL.
///
/// Missing, blank and unresolvable sources are skipped silently; the first
/// occurrence of each resolved URL wins.
#[derive(Debug, Clone)]
pub struct HtmlImageExtractor {
    max_images: usize,
}

impl HtmlImageExtractor {
    pub fn new() -> Self {
        Self::with_max_images(DEFAULT_MAX_IMAGES)
    }

    pub fn with_max_images(max_images: usize) -> Self {
        Self { max_images }
    }
}

impl Default for HtmlImageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageExtractor for HtmlImageExtractor {
    fn extract(&self, markup: &str, base_url: &str) -> Result<Vec<String>, ExtractError> {
        let base = Url::parse(base_url).map_err(|err| ExtractError::InvalidBase {
            base: base_url.to_string(),
            reason: err.to_string(),
        })?;
        let selector =
            Selector::parse("img").map_err(|err| ExtractError::Selector(err.to_string()))?;
        let document = Html::parse_document(markup);

        let mut seen = HashSet::new();
        let mut images = Vec::new();
        for element in document.select(&selector) {
            if images.len() >= self.max_images {
                break;
            }
            let Some(src) = element.value().attr("src") else {
                continue;
            };
            let Some(resolved) = resolve_source(src, &base) else {
                continue;
            };
            let resolved = String::from(resolved);
            if seen.insert(resolved.clone()) {
                images.push(resolved);
            }
        }
        Ok(images)
    }
}

fn resolve_source(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed
        .get(..11)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("javascript:"))
    {
        return None;
    }
    base.join(trimmed).ok()
}
