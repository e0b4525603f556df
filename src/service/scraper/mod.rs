//! One scraper per entity family.
//!
//! Each scraper pairs a page URL scheme with a pure `extract_*` function from
//! a parsed document to raw rows. Rows that cannot be mapped come back as
//! [`RowError`]s next to the good ones instead of failing the page.

use async_trait::async_trait;

use crate::error::Result;

pub mod clubs;
pub mod pagination;
pub mod parse;
pub mod players;
pub mod tournament_games;
pub mod tournament_results;
pub mod tournaments;
pub mod year_stats;

pub use clubs::ClubsScraper;
pub use pagination::{build_page_url, PaginationConfig, PaginationHandler};
pub use parse::{Parsed, RowError};
pub use players::PlayersScraper;
pub use tournament_games::TournamentGamesScraper;
pub use tournament_results::TournamentResultsScraper;
pub use tournaments::TournamentsScraper;
pub use year_stats::{YearGapPolicy, YearStatsScraper};

pub const PAGE_PARAM: &str = "page";

#[async_trait]
pub trait Scraper: Send + Sync {
    type Item: Send;

    /// Listing scrapers take `None`; detail scrapers the owning entity's id.
    async fn scrape(&self, target: Option<&str>) -> Result<Vec<Parsed<Self::Item>>>;
}

/// Detail scrapers cannot run without an id.
pub(crate) fn require_target<'a>(target: Option<&'a str>, what: &str) -> Result<&'a str> {
    target.ok_or_else(|| crate::error::ImportError::Other(anyhow::anyhow!("{} id is required", what)))
}
