// src/config/scraper.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "SCRAPER_CONFIG_PATH";

const SITE: &str = "https://www.monopoli.gr";

fn default_categories() -> Vec<String> {
    vec![
        format!("{SITE}/diagonismoi/proskliseis-gia-theatro/page/"),
        format!("{SITE}/diagonismoi/proskliseis-gia-theatro/page/2/"),
        format!("{SITE}/diagonismoi/proskliseis-gia-theatro/page/3/"),
        format!("{SITE}/diagonismoi/proskliseis-gia-theatro/page/4/"),
        format!("{SITE}/diagonismoi/proskliseis-gia-synaylies-mousikes-skines/"),
        format!("{SITE}/diagonismos/"),
    ]
}
fn default_winners_url() -> String {
    format!("{SITE}/diagonismoi/winners/")
}
fn default_contest_form_url() -> String {
    format!("{SITE}/contest-form/")
}
fn default_max_concurrency() -> usize {
    5
}
fn default_discovery_concurrency() -> usize {
    1
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("state/processed_ids.json")
}
fn default_winners_path() -> PathBuf {
    PathBuf::from("state/winners.json")
}
fn default_roster_path() -> PathBuf {
    PathBuf::from("config/roster.json")
}
fn default_submit_delay_ms() -> u64 {
    500
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_cors_origin() -> String {
    "*".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Serve the snapshot file written by `update_winners`.
    #[default]
    File,
    /// Scrape on first request, keep the result for the process lifetime.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `"*"` for any origin, otherwise the single allowed origin.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    #[serde(default)]
    pub cache_mode: CacheMode,
    /// File mode only: scrape synchronously when no snapshot exists yet.
    #[serde(default)]
    pub scrape_on_miss: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cors_origin: default_cors_origin(),
            cache_mode: CacheMode::default(),
            scrape_on_miss: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Category pages scanned for listings, in this order.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_winners_url")]
    pub winners_url: String,
    /// Date lookups go to `<contest_form_url><code>/`; entries are POSTed here.
    #[serde(default = "default_contest_form_url")]
    pub contest_form_url: String,
    /// In-flight fetch bound for the winners archive.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// 1 keeps the per-link discovery loop sequential.
    #[serde(default = "default_discovery_concurrency")]
    pub discovery_concurrency: usize,
    /// Upper bound on archive pages walked.
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// Ignore (and do not update) the ledger for this run.
    #[serde(default)]
    pub bypass_ledger: bool,
    /// Un-mark codes whose date page had no dates, so they are retried.
    #[serde(default)]
    pub forget_dateless: bool,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_winners_path")]
    pub winners_path: PathBuf,
    #[serde(default = "default_roster_path")]
    pub roster_path: PathBuf,
    #[serde(default = "default_submit_delay_ms")]
    pub submit_delay_ms: u64,
    /// 0 disables the per-fetch timeout.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            winners_url: default_winners_url(),
            contest_form_url: default_contest_form_url(),
            max_concurrency: default_max_concurrency(),
            discovery_concurrency: default_discovery_concurrency(),
            max_pages: None,
            bypass_ledger: false,
            forget_dateless: false,
            ledger_path: default_ledger_path(),
            winners_path: default_winners_path(),
            roster_path: default_roster_path(),
            submit_delay_ms: default_submit_delay_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            server: ServerConfig::default(),
        }
    }
}

impl ScraperConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading scraper config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing scraper config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $SCRAPER_CONFIG_PATH
    /// 2) config/scraper.toml
    /// 3) config/scraper.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from("config/scraper.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/scraper.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    /// URL of the page holding the date selector for `code`.
    pub fn date_page_url(&self, code: &str) -> String {
        format!("{}{}/", with_trailing_slash(&self.contest_form_url), code)
    }

    /// Archive page `n` (1-based). Page 1 is the archive root.
    pub fn winners_page_url(&self, n: u32) -> String {
        let root = with_trailing_slash(&self.winners_url);
        if n <= 1 {
            root
        } else {
            format!("{root}page/{n}/")
        }
    }

    fn sanitized(mut self) -> Self {
        self.max_concurrency = self.max_concurrency.max(1);
        self.discovery_concurrency = self.discovery_concurrency.max(1);
        self.categories = self
            .categories
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if self.max_pages == Some(0) {
            self.max_pages = None;
        }
        self
    }
}

fn with_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<ScraperConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            // Unknown extension: JSON if it looks like an object, else TOML.
            if s.trim_start().starts_with('{') {
                Ok(serde_json::from_str(s)?)
            } else {
                Ok(toml::from_str(s)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = parse_config("", "toml").unwrap().sanitized();
        assert_eq!(cfg.categories.len(), 6);
        assert_eq!(cfg.max_concurrency, 5);
        assert_eq!(cfg.discovery_concurrency, 1);
        assert_eq!(cfg.server.cache_mode, CacheMode::File);
        assert_eq!(cfg.submit_delay_ms, 500);
    }

    #[test]
    fn sanitize_clamps_and_trims() {
        let toml = r#"
            categories = [" https://a.test/x/ ", "", "https://a.test/y/"]
            max_concurrency = 0
            discovery_concurrency = 0
            max_pages = 0
            [server]
            cors_origin = "https://app.test"
            cache_mode = "memory"
        "#;
        let cfg = parse_config(toml, "toml").unwrap().sanitized();
        assert_eq!(cfg.categories, vec!["https://a.test/x/", "https://a.test/y/"]);
        assert_eq!(cfg.max_concurrency, 1);
        assert_eq!(cfg.discovery_concurrency, 1);
        assert_eq!(cfg.max_pages, None);
        assert_eq!(cfg.server.cache_mode, CacheMode::Memory);
        assert_eq!(cfg.server.cors_origin, "https://app.test");
    }

    #[test]
    fn json_and_unknown_extension_parse() {
        let json = r#"{ "bypass_ledger": true, "max_pages": 3 }"#;
        let a = parse_config(json, "json").unwrap();
        let b = parse_config(json, "").unwrap();
        assert!(a.bypass_ledger && b.bypass_ledger);
        assert_eq!(b.max_pages, Some(3));
    }

    #[test]
    fn url_helpers() {
        let cfg = ScraperConfig {
            winners_url: "https://s.test/winners".into(),
            contest_form_url: "https://s.test/contest-form/".into(),
            ..ScraperConfig::default()
        };
        assert_eq!(cfg.winners_page_url(1), "https://s.test/winners/");
        assert_eq!(cfg.winners_page_url(4), "https://s.test/winners/page/4/");
        assert_eq!(cfg.date_page_url("841967"), "https://s.test/contest-form/841967/");
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // No files in CWD -> defaults
        let cfg = ScraperConfig::load_default().unwrap();
        assert_eq!(cfg.max_concurrency, 5);

        // Env wins
        let p = tmp.path().join("custom.json");
        fs::write(&p, r#"{"max_concurrency": 9}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        assert_eq!(ScraperConfig::load_default().unwrap().max_concurrency, 9);

        // Env pointing nowhere is an error
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml").display().to_string());
        assert!(ScraperConfig::load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
