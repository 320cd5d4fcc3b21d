//! Durable set of contest codes that were already processed.
//!
//! Loaded fully at the start of a discovery run, rewritten in full at the end.
//! Single writer: no file locking, last full write wins.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{ScrapeError, ScrapeResult};

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    path: Option<PathBuf>,
    // Insertion order is kept so the file diffs stay readable.
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl Ledger {
    /// Load from a JSON array file. A missing file is an empty ledger;
    /// an unreadable or malformed one is an error (starting empty would
    /// shrink the ledger on the next persist).
    pub async fn load(path: impl Into<PathBuf>) -> ScrapeResult<Self> {
        let path = path.into();
        let raw = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(target: "discovery", path = %path.display(), "no ledger yet, starting empty");
                return Ok(Self {
                    path: Some(path),
                    ..Self::default()
                });
            }
            Err(source) => return Err(ScrapeError::Persistence { path, source }),
        };

        let ids: Vec<String> = if raw.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&raw).map_err(|source| ScrapeError::Snapshot {
                path: path.clone(),
                source,
            })?
        };

        let mut ledger = Self {
            path: Some(path),
            ..Self::default()
        };
        for id in ids {
            ledger.append(id);
        }
        Ok(ledger)
    }

    /// In-memory ledger that is never persisted (ledger-bypass runs).
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Mark `id` as seen. Returns `false` if it already was.
    pub fn append(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Undo an `append` made during the current run.
    pub fn remove(&mut self, id: &str) -> bool {
        if !self.seen.remove(id) {
            return false;
        }
        self.ids.retain(|x| x != id);
        true
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Overwrite the backing file with the full set. No-op for ephemeral ledgers.
    pub async fn persist(&self) -> ScrapeResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_json_array(path, &self.ids).await
    }
}

async fn write_json_array(path: &Path, ids: &[String]) -> ScrapeResult<()> {
    let body = serde_json::to_vec_pretty(ids).map_err(|source| ScrapeError::Snapshot {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .map_err(|source| ScrapeError::Persistence {
                path: dir.to_path_buf(),
                source,
            })?;
    }
    fs::write(path, body)
        .await
        .map_err(|source| ScrapeError::Persistence {
            path: path.to_path_buf(),
            source,
        })
}
