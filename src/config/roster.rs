// src/config/roster.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::submit::Registrant;

pub const ENV_ROSTER_PATH: &str = "ROSTER_PATH";

/// Load registrants from a JSON array file.
pub fn load_roster_from(path: &Path) -> Result<Vec<Registrant>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading roster from {}", path.display()))?;
    let roster: Vec<Registrant> = serde_json::from_str(&content)
        .with_context(|| format!("parsing roster {}", path.display()))?;
    Ok(roster
        .into_iter()
        .filter(|r| !r.email.trim().is_empty())
        .collect())
}

/// `$ROSTER_PATH` if set, else `fallback` (usually `ScraperConfig::roster_path`).
pub fn resolve_roster_path(fallback: &Path) -> PathBuf {
    std::env::var(ENV_ROSTER_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| fallback.to_path_buf())
}
