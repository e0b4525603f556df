use async_trait::async_trait;
use scraper::Html;

use super::parse::{
    child_attr, child_text, count_stars, has_next_page, id_from_href, parse_currency, parse_date_range,
    parse_decimal, parse_int, parse_status, selector, Parsed, RowError,
};
use super::{PaginationConfig, PaginationHandler, Scraper, PAGE_PARAM};
use crate::domain::models::EntityType;
use crate::domain::raw::TournamentRaw;
use crate::error::{ImportError, Result};

pub struct TournamentsScraper {
    pagination: PaginationHandler,
    listing_url: String,
    max_pages: Option<u32>,
}

impl TournamentsScraper {
    pub fn new(pagination: PaginationHandler, base_url: &str, max_pages: Option<u32>) -> Self {
        Self {
            pagination,
            listing_url: format!("{}/tournaments", base_url.trim_end_matches('/')),
            max_pages,
        }
    }
}

#[async_trait]
impl Scraper for TournamentsScraper {
    type Item = TournamentRaw;

    async fn scrape(&self, _target: Option<&str>) -> Result<Vec<Parsed<TournamentRaw>>> {
        self.pagination
            .scrape_all_pages(PaginationConfig {
                base_url: &self.listing_url,
                page_param: PAGE_PARAM,
                max_pages: self.max_pages,
                extract: &extract_tournaments,
                has_next: &has_next_page,
            })
            .await
    }
}

pub fn extract_tournaments(document: &Html) -> Result<Vec<Parsed<TournamentRaw>>> {
    let table = document
        .select(selector!("table.tournaments-table"))
        .next()
        .ok_or_else(|| ImportError::parse(EntityType::Tournament, "tournaments table not found"))?;

    let rows = table
        .select(selector!("tr.tournament-row"))
        .map(|row| {
            let id = child_attr(row, selector!("td.col-name a"), "href").and_then(id_from_href);
            let Some(gomafia_id) = id else {
                return Err(RowError::new(EntityType::Tournament, None, "row has no tournament link"));
            };
            let Some(name) = child_text(row, selector!("td.col-name")) else {
                return Err(RowError::new(
                    EntityType::Tournament,
                    Some(gomafia_id),
                    "row has no tournament name",
                ));
            };

            // Status is required; an unknown label must not become a default.
            let status_label = child_text(row, selector!("td.col-status")).unwrap_or_default();
            let Some(status) = parse_status(&status_label) else {
                return Err(RowError::new(
                    EntityType::Tournament,
                    Some(gomafia_id),
                    format!("unknown status label '{}'", status_label),
                ));
            };

            let (start_date, end_date) = child_text(row, selector!("td.col-dates"))
                .map(|s| parse_date_range(&s))
                .unwrap_or((None, None));

            Ok(TournamentRaw {
                gomafia_id,
                name,
                city: child_text(row, selector!("td.col-city")),
                status,
                stars: child_text(row, selector!("td.col-stars")).map(|s| count_stars(&s)),
                start_date,
                end_date,
                average_elo: child_text(row, selector!("td.col-elo")).and_then(|s| parse_decimal(&s)),
                is_fsm_rated: row.select(selector!(".badge-fsm")).next().is_some(),
                prize_pool: child_text(row, selector!("td.col-prize")).and_then(|s| parse_currency(&s)),
                participants_count: child_text(row, selector!("td.col-participants"))
                    .and_then(|s| parse_int(&s)),
            })
        })
        .collect();

    Ok(rows)
}
