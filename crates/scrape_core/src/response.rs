use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Per-URL image lists in request order. Serializes as a JSON object whose
/// keys keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScrapeResults {
    entries: Vec<(String, Vec<String>)>,
}

impl ScrapeResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the images for `url`, keeping the original position on replace.
    pub fn insert(&mut self, url: impl Into<String>, images: Vec<String>) {
        let url = url.into();
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == url) {
            slot.1 = images;
        } else {
            self.entries.push((url, images));
        }
    }

    pub fn get(&self, url: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(key, _)| key == url)
            .map(|(_, images)| images.as_slice())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(url, _)| url.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(url, images)| (url.as_str(), images.as_slice()))
    }

    /// Sum of image counts across all successful URLs.
    pub fn image_count(&self) -> usize {
        self.entries.iter().map(|(_, images)| images.len()).sum()
    }
}

impl Serialize for ScrapeResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (url, images) in &self.entries {
            map.serialize_entry(url, images)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScrapeResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResultsVisitor;

        impl<'de> Visitor<'de> for ResultsVisitor {
            type Value = ScrapeResults;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of url to image url list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = ScrapeResults::new();
                while let Some((url, images)) = access.next_entry::<String, Vec<String>>()? {
                    results.insert(url, images);
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(ResultsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeError {
    pub url: String,
    pub error: String,
}

impl ScrapeError {
    pub fn new(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            error: error.into(),
        }
    }
}

/// Outcome of one batch: successes keyed by input URL plus inline per-URL errors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: ScrapeResults,
    pub errors: Vec<ScrapeError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    pub fn ok(version: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            version: version.into(),
        }
    }
}
