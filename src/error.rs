// src/error.rs
use std::path::PathBuf;

/// Failures surfaced by the scraping core.
///
/// A selector that matches nothing is *not* an error: extractors return an
/// empty `Vec`, an empty `String` or `None` instead.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The server answered, but not with a 2xx.
    #[error("fetch {url} failed with HTTP {status}")]
    Fetch { url: String, status: u16 },

    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("fetch {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("cannot access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted JSON state could not be read back or encoded.
    #[error("bad snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ScrapeError {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Fetch { url, .. } | Self::Transport { url, .. } => Some(url),
            _ => None,
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
