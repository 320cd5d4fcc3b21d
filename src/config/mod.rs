pub mod roster;
pub mod scraper;

pub use scraper::{CacheMode, ScraperConfig, ServerConfig};
