//! Write-behind record of scrape batches per authenticated user.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use scrape_core::Pagination;
use scrape_logging::{scrape_info, scrape_warn};
use serde::{Deserialize, Serialize};

use crate::persist::{AtomicFileWriter, PersistError};

/// What the orchestrator hands over after a batch with at least one success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub user_id: String,
    pub urls: Vec<String>,
    pub image_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub user_id: String,
    pub urls: Vec<String>,
    pub image_count: usize,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryEntry>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub pages: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[async_trait::async_trait]
pub trait HistorySink: Send + Sync {
    async fn write(&self, summary: HistorySummary) -> Result<HistoryEntry, HistoryError>;

    /// Entries for `user_id`, newest first.
    async fn read(&self, user_id: &str, page: Pagination) -> Result<HistoryPage, HistoryError>;
}

pub type TimestampFn = Arc<dyn Fn() -> String + Send + Sync>;

pub fn utc_now_rfc3339() -> TimestampFn {
    Arc::new(|| chrono::Utc::now().to_rfc3339())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryLog {
    next_id: u64,
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    fn append(&mut self, summary: HistorySummary, created_at: String) -> HistoryEntry {
        self.next_id += 1;
        let entry = HistoryEntry {
            id: self.next_id,
            user_id: summary.user_id,
            urls: summary.urls,
            image_count: summary.image_count,
            created_at,
        };
        self.entries.push(entry.clone());
        entry
    }

    fn page(&self, user_id: &str, page: Pagination) -> HistoryPage {
        let mine: Vec<&HistoryEntry> = self
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .collect();
        let total = mine.len();
        let items = mine
            .into_iter()
            .skip(page.offset())
            .take(page.page_size())
            .cloned()
            .collect();
        HistoryPage {
            items,
            total,
            page: page.page(),
            page_size: page.page_size(),
            pages: page.page_count(total),
        }
    }
}

/// Process-local history, lost on restart.
pub struct InMemoryHistorySink {
    log: Mutex<HistoryLog>,
    timestamp: TimestampFn,
}

impl InMemoryHistorySink {
    pub fn new() -> Self {
        Self::with_timestamp(utc_now_rfc3339())
    }

    pub fn with_timestamp(timestamp: TimestampFn) -> Self {
        Self {
            log: Mutex::new(HistoryLog::default()),
            timestamp,
        }
    }

    pub fn len(&self) -> usize {
        self.log.lock().map(|log| log.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryHistorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HistorySink for InMemoryHistorySink {
    async fn write(&self, summary: HistorySummary) -> Result<HistoryEntry, HistoryError> {
        let created_at = (self.timestamp)();
        let mut log = self
            .log
            .lock()
            .map_err(|err| HistoryError::Unavailable(err.to_string()))?;
        Ok(log.append(summary, created_at))
    }

    async fn read(&self, user_id: &str, page: Pagination) -> Result<HistoryPage, HistoryError> {
        let log = self
            .log
            .lock()
            .map_err(|err| HistoryError::Unavailable(err.to_string()))?;
        Ok(log.page(user_id, page))
    }
}

/// History kept in a single JSON document, rewritten atomically on every write.
pub struct JsonFileHistorySink {
    log: Mutex<HistoryLog>,
    writer: AtomicFileWriter,
    timestamp: TimestampFn,
}

impl JsonFileHistorySink {
    /// Opens the store at `path`. A missing file starts an empty history; an
    /// unreadable one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_with_timestamp(path, utc_now_rfc3339())
    }

    pub fn open_with_timestamp(path: impl Into<PathBuf>, timestamp: TimestampFn) -> Self {
        let path = path.into();
        let log = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<HistoryLog>(&text) {
                Ok(log) => {
                    scrape_info!(
                        "Loaded {} history entries from {:?}",
                        log.entries.len(),
                        path
                    );
                    log
                }
                Err(err) => {
                    scrape_warn!("Failed to parse history from {:?}: {}", path, err);
                    HistoryLog::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HistoryLog::default(),
            Err(err) => {
                scrape_warn!("Failed to read history from {:?}: {}", path, err);
                HistoryLog::default()
            }
        };

        Self {
            log: Mutex::new(log),
            writer: AtomicFileWriter::new(path),
            timestamp,
        }
    }
}

#[async_trait::async_trait]
impl HistorySink for JsonFileHistorySink {
    async fn write(&self, summary: HistorySummary) -> Result<HistoryEntry, HistoryError> {
        let created_at = (self.timestamp)();
        let mut log = self
            .log
            .lock()
            .map_err(|err| HistoryError::Unavailable(err.to_string()))?;

        // Persist a copy first so a failed write leaves memory and disk in agreement.
        let mut next = log.clone();
        let entry = next.append(summary, created_at);
        let content = serde_json::to_string_pretty(&next)?;
        self.writer.write(&content)?;
        *log = next;
        Ok(entry)
    }

    async fn read(&self, user_id: &str, page: Pagination) -> Result<HistoryPage, HistoryError> {
        let log = self
            .log
            .lock()
            .map_err(|err| HistoryError::Unavailable(err.to_string()))?;
        Ok(log.page(user_id, page))
    }
}
