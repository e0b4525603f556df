use async_trait::async_trait;
use scraper::Html;

use super::parse::{child_attr, child_text, has_next_page, id_from_href, parse_decimal, parse_int, selector, Parsed, RowError};
use super::{PaginationConfig, PaginationHandler, Scraper, PAGE_PARAM};
use crate::domain::models::EntityType;
use crate::domain::raw::PlayerRaw;
use crate::error::{ImportError, Result};

/// Player rating listing, newest activity first.
pub struct PlayersScraper {
    pagination: PaginationHandler,
    listing_url: String,
    max_pages: Option<u32>,
}

impl PlayersScraper {
    pub fn new(pagination: PaginationHandler, base_url: &str, max_pages: Option<u32>) -> Self {
        Self {
            pagination,
            listing_url: format!("{}/rating", base_url.trim_end_matches('/')),
            max_pages,
        }
    }
}

#[async_trait]
impl Scraper for PlayersScraper {
    type Item = PlayerRaw;

    async fn scrape(&self, _target: Option<&str>) -> Result<Vec<Parsed<PlayerRaw>>> {
        self.pagination
            .scrape_all_pages(PaginationConfig {
                base_url: &self.listing_url,
                page_param: PAGE_PARAM,
                max_pages: self.max_pages,
                extract: &extract_players,
                has_next: &has_next_page,
            })
            .await
    }
}

pub fn extract_players(document: &Html) -> Result<Vec<Parsed<PlayerRaw>>> {
    let table = document
        .select(selector!("table.rating-table"))
        .next()
        .ok_or_else(|| ImportError::parse(EntityType::Player, "rating table not found"))?;

    let rows = table
        .select(selector!("tr.rating-row"))
        .map(|row| {
            let href = child_attr(row, selector!("td.col-name a"), "href");
            let id = row
                .value()
                .attr("data-player-id")
                .map(str::to_string)
                .or_else(|| href.and_then(id_from_href));

            let Some(gomafia_id) = id else {
                return Err(RowError::new(EntityType::Player, None, "row has no player id"));
            };
            let Some(name) = child_text(row, selector!("td.col-name")) else {
                return Err(RowError::new(
                    EntityType::Player,
                    Some(gomafia_id),
                    "row has no player name",
                ));
            };

            Ok(PlayerRaw {
                gomafia_id,
                name,
                region: child_text(row, selector!("td.col-region")),
                club_id: child_attr(row, selector!("td.col-club a"), "href").and_then(id_from_href),
                elo: child_text(row, selector!("td.col-elo")).and_then(|s| parse_decimal(&s)),
                tournaments_played: child_text(row, selector!("td.col-tournaments"))
                    .and_then(|s| parse_int(&s)),
                gg_points: child_text(row, selector!("td.col-gg")).and_then(|s| parse_decimal(&s)),
            })
        })
        .collect();

    Ok(rows)
}
