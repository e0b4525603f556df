//! Locale-aware field parsing shared by the scrapers.
//!
//! The source renders Russian labels, space-grouped numbers with comma
//! decimals, star glyphs and `dd.mm.yyyy` dates.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use crate::domain::models::{EntityType, Role, TournamentStatus, WinnerTeam};

/// A lazily-compiled, process-wide selector for a literal CSS string.
macro_rules! selector {
    ($css:literal) => {{
        static SELECTOR: ::std::sync::OnceLock<::scraper::Selector> = ::std::sync::OnceLock::new();
        SELECTOR.get_or_init(|| ::scraper::Selector::parse($css).unwrap())
    }};
}
pub(crate) use selector;

/// A row that could not be mapped to its raw shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub entity: EntityType,
    pub identifier: Option<String>,
    pub message: String,
}

impl RowError {
    pub fn new(entity: EntityType, identifier: Option<String>, message: impl Into<String>) -> Self {
        Self {
            entity,
            identifier,
            message: message.into(),
        }
    }
}

/// Per-row extraction result; failures travel alongside the records.
pub type Parsed<T> = std::result::Result<T, RowError>;

/// Element text with whitespace collapsed.
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first match under `parent`, `None` if missing or blank.
pub fn child_text(parent: ElementRef<'_>, selector: &Selector) -> Option<String> {
    parent
        .select(selector)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty() && !is_placeholder(s))
}

pub fn child_attr<'a>(parent: ElementRef<'a>, selector: &Selector, attr: &str) -> Option<&'a str> {
    parent
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
}

/// Dashes and similar fillers the source prints for "no value".
fn is_placeholder(s: &str) -> bool {
    matches!(s, "-" | "—" | "–" | "n/a")
}

/// Trailing numeric path segment of a link, e.g. `/stats/123?tab=x` → `123`.
pub fn id_from_href(href: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"/(\d+)/?(?:[?#].*)?$").unwrap());
    re.captures(href.trim()).map(|c| c[1].to_string())
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+−]?\d[\d \u{a0}\u{202f}]*(?:[.,]\d+)?").unwrap())
}

/// First number in `s`: `"1 234,5"` → 1234.5, `"−3.1"` → -3.1.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let m = number_regex().find(s)?;
    let normalized: String = m
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{202f}')
        .map(|c| match c {
            ',' => '.',
            '−' => '-',
            other => other,
        })
        .collect();
    normalized.parse().ok()
}

pub fn parse_int(s: &str) -> Option<i64> {
    let value = parse_decimal(s)?;
    (value.fract() == 0.0).then_some(value as i64)
}

/// Money amounts such as `"10 000 ₽"`; placeholders yield `None`.
pub fn parse_currency(s: &str) -> Option<f64> {
    parse_decimal(s).map(f64::abs)
}

pub fn parse_status(label: &str) -> Option<TournamentStatus> {
    let lower = label.trim().to_lowercase().replace('ё', "е");
    if lower.starts_with("заверш") {
        Some(TournamentStatus::Completed)
    } else if lower.starts_with("в процессе") || lower.starts_with("идет") {
        Some(TournamentStatus::InProgress)
    } else if lower.starts_with("запланир") || lower.starts_with("регистрац") {
        Some(TournamentStatus::Scheduled)
    } else if lower.starts_with("отмен") {
        Some(TournamentStatus::Cancelled)
    } else {
        lower.to_uppercase().replace(' ', "_").parse().ok()
    }
}

/// Filled star glyphs, clamped to 0..=5.
pub fn count_stars(s: &str) -> u8 {
    s.chars().filter(|c| *c == '★').count().min(5) as u8
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

/// `"01.03.2024 – 03.03.2024"` → both dates; a single date is both start and end.
pub fn parse_date_range(s: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\d{2}\.\d{2}\.\d{4}|\d{4}-\d{2}-\d{2}").unwrap());

    let dates: Vec<NaiveDate> = re.find_iter(s).filter_map(|m| parse_date(m.as_str())).collect();
    match dates.as_slice() {
        [] => (None, None),
        [single] => (Some(*single), Some(*single)),
        [start, end, ..] => (Some(*start), Some(*end)),
    }
}

pub fn parse_role(label: &str) -> Option<Role> {
    let lower = label.trim().to_lowercase();
    if lower.starts_with("мирн") || lower == "civilian" {
        Some(Role::Civilian)
    } else if lower.starts_with("шериф") || lower == "sheriff" {
        Some(Role::Sheriff)
    } else if lower.starts_with("дон") || lower == "don" {
        Some(Role::Don)
    } else if lower.starts_with("мафи") || lower == "mafia" {
        Some(Role::Mafia)
    } else {
        None
    }
}

pub fn parse_winner(label: &str) -> Option<WinnerTeam> {
    let lower = label.trim().to_lowercase().replace('ё', "е");
    if lower.contains("ничья") || lower == "draw" {
        Some(WinnerTeam::Draw)
    } else if lower.contains("мирн") || lower.contains("красн") || lower == "red" {
        Some(WinnerTeam::Red)
    } else if lower.contains("мафи") || lower.contains("черн") || lower == "black" {
        Some(WinnerTeam::Black)
    } else {
        None
    }
}

/// Listing pages share one pager; a disabled "next" link means last page.
pub fn has_next_page(document: &Html) -> bool {
    document
        .select(selector!(".pagination a.pagination-next"))
        .next()
        .is_some_and(|el| !el.value().classes().any(|c| c == "disabled"))
}
