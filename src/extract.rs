//! # HTML Extractor
//!
//! Selector rules for the contest site's fixed page structure. A selector that
//! matches nothing degrades to an empty result, never an error; when the site
//! changes its markup the pipelines simply see less.
//!
//! `scraper::Html` is not `Send`, so a [`Document`] must be built and consumed
//! between two suspension points. Callers parse, extract owned values and drop
//! the document before awaiting the next fetch.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{ScrapeError, ScrapeResult};

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

static PAGINATION: Lazy<Selector> = Lazy::new(|| sel(".nav-links a.page-numbers"));
static WINNERS_BOX: Lazy<Selector> = Lazy::new(|| sel(".winners_contest_box"));
static WINNERS_TEXT: Lazy<Selector> = Lazy::new(|| sel(".art_article_text.wrapptext p"));
static EVENT_TITLE: Lazy<Selector> = Lazy::new(|| sel(".art_info_main_ti"));
static CONTEST_BUTTON: Lazy<Selector> = Lazy::new(|| sel("a.diagonismos_btn"));
static DATE_INPUT: Lazy<Selector> = Lazy::new(|| sel(r#"input[name="date"]"#));
static DATE_SELECT: Lazy<Selector> = Lazy::new(|| sel(r#"select[name="date"]"#));
static OPTION: Lazy<Selector> = Lazy::new(|| sel("option"));

/// Listing link groups, unioned in this order.
static LISTING_GROUPS: Lazy<[Selector; 4]> = Lazy::new(|| {
    [
        sel(".diagonismos_book a"),
        sel(".diagonismos_theatro a"),
        sel(".category_item"),
        sel(".g_small_tile"),
    ]
});

static CONTEST_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"contest-form/(\d+)").unwrap());
static WINNER_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|\n").unwrap());
static LEADING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+").unwrap());

/// Both spellings appear on the winners pages (with and without accents).
const TITLE_PREFIXES: [&str; 2] = ["Νικητές Διαγωνισμού:", "Νικητες Διαγωνισμου:"];

/// Parsed page plus the URL it came from (for resolving relative hrefs).
pub struct Document {
    html: Html,
    base: Url,
}

/// Title and winner lines of one archived contest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventDetails {
    pub event_title: String,
    pub winners: Vec<String>,
}

impl Document {
    pub fn parse(html: &str, page_url: &str) -> ScrapeResult<Self> {
        let base = Url::parse(page_url).map_err(|e| ScrapeError::Parse {
            what: format!("page url {page_url}"),
            reason: e.to_string(),
        })?;
        Ok(Self {
            html: Html::parse_document(html),
            base,
        })
    }

    /// Candidate contest listings on a category page.
    pub fn listing_links(&self) -> Vec<String> {
        LISTING_GROUPS
            .iter()
            .flat_map(|group| self.hrefs(group))
            .collect()
    }

    /// Contest pages linked from one winners archive page.
    pub fn winners_links(&self) -> Vec<String> {
        self.hrefs(&WINNERS_BOX)
    }

    /// Highest numeric pagination label; 1 when there is none.
    pub fn total_pages(&self) -> u32 {
        self.html
            .select(&PAGINATION)
            .filter_map(|a| leading_number(&text_of(a)))
            .fold(1, u32::max)
    }

    pub fn event_title(&self) -> String {
        let raw = self
            .html
            .select(&EVENT_TITLE)
            .next()
            .map(text_of)
            .unwrap_or_default();
        clean_title(&raw)
    }

    pub fn winners(&self) -> Vec<String> {
        let Some(p) = self.html.select(&WINNERS_TEXT).next() else {
            return Vec::new();
        };
        split_winners(&text_with_breaks(p))
    }

    pub fn event_details(&self) -> EventDetails {
        EventDetails {
            event_title: self.event_title(),
            winners: self.winners(),
        }
    }

    /// Numeric contest code from the first entry button, if any.
    pub fn contest_code(&self) -> Option<String> {
        let href = self
            .html
            .select(&CONTEST_BUTTON)
            .next()?
            .value()
            .attr("href")?;
        contest_code_from_href(href)
    }

    /// Hidden date (when non-empty) followed by the `<select name="date">` options.
    pub fn available_dates(&self) -> Vec<String> {
        let hidden = self
            .html
            .select(&DATE_INPUT)
            .next()
            .and_then(|input| input.value().attr("value"))
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let options = self
            .html
            .select(&DATE_SELECT)
            .next()
            .map(|select| {
                select
                    .select(&OPTION)
                    .filter_map(|opt| {
                        let v = match opt.value().attr("value") {
                            Some(v) => v.to_string(),
                            None => collapse_ws(&text_of(opt)),
                        };
                        // Placeholder options (`value=""`) are not dates; keeping them
                        // would emit a record with an empty date.
                        (!v.is_empty()).then_some(v)
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        hidden.into_iter().chain(options).collect()
    }

    fn hrefs(&self, selector: &Selector) -> Vec<String> {
        self.html
            .select(selector)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| self.resolve(href))
            .collect()
    }

    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        Some(
            self.base
                .join(href)
                .map(String::from)
                .unwrap_or_else(|_| href.to_string()),
        )
    }
}

pub fn contest_code_from_href(href: &str) -> Option<String> {
    CONTEST_CODE
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn clean_title(raw: &str) -> String {
    let mut out = raw.to_string();
    for prefix in TITLE_PREFIXES {
        out = out.replacen(prefix, "", 1);
    }
    out.trim().to_string()
}

pub fn split_winners(text: &str) -> Vec<String> {
    WINNER_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn leading_number(label: &str) -> Option<u32> {
    LEADING_DIGITS
        .find(label.trim())
        .and_then(|m| m.as_str().parse().ok())
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Text content where `<br>` elements become newlines.
fn text_with_breaks(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(t) => out.push_str(&t.text),
            Node::Element(e) if e.name().eq_ignore_ascii_case("br") => out.push('\n'),
            _ => {}
        }
    }
    out
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
