use std::fmt;

/// Raw page as returned by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub body: Vec<u8>,
    /// Post-redirect URL; the base for resolving relative image sources.
    pub final_url: String,
    pub content_type: Option<String>,
    pub redirect_count: usize,
}

/// Failed fetch. Displays as `<kind>: <detail>`, except HTTP status failures,
/// whose detail already names the status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::HttpStatus(_) => f.write_str(&self.message),
            _ => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    HttpStatus(u16),
    Connection,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Connection => write!(f, "connection error"),
            FailureKind::Other => write!(f, "other error"),
        }
    }
}
