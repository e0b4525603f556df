use async_trait::async_trait;
use scraper::Html;

use super::parse::{
    child_attr, child_text, has_next_page, id_from_href, parse_currency, parse_decimal, parse_int, selector,
    Parsed, RowError,
};
use super::{require_target, PaginationConfig, PaginationHandler, Scraper, PAGE_PARAM};
use crate::domain::models::EntityType;
use crate::domain::raw::PlayerTournamentRaw;
use crate::error::{ImportError, Result};

/// Final standings of one tournament.
pub struct TournamentResultsScraper {
    pagination: PaginationHandler,
    base_url: String,
}

impl TournamentResultsScraper {
    pub fn new(pagination: PaginationHandler, base_url: &str) -> Self {
        Self {
            pagination,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn results_url(&self, tournament_id: &str) -> String {
        format!("{}/tournament/{}?tab=results", self.base_url, tournament_id)
    }
}

#[async_trait]
impl Scraper for TournamentResultsScraper {
    type Item = PlayerTournamentRaw;

    async fn scrape(&self, target: Option<&str>) -> Result<Vec<Parsed<PlayerTournamentRaw>>> {
        let tournament_id = require_target(target, "tournament")?;
        let url = self.results_url(tournament_id);
        let extract = |document: &Html| extract_results(document, tournament_id);

        self.pagination
            .scrape_all_pages(PaginationConfig {
                base_url: &url,
                page_param: PAGE_PARAM,
                max_pages: None,
                extract: &extract,
                has_next: &has_next_page,
            })
            .await
    }
}

pub fn extract_results(document: &Html, tournament_id: &str) -> Result<Vec<Parsed<PlayerTournamentRaw>>> {
    let table = document
        .select(selector!("table.results-table"))
        .next()
        .ok_or_else(|| ImportError::parse(EntityType::PlayerTournament, "results table not found"))?;

    let rows = table
        .select(selector!("tr.result-row"))
        .map(|row| {
            let Some(player_id) = child_attr(row, selector!("td.col-player a"), "href").and_then(id_from_href)
            else {
                return Err(RowError::new(
                    EntityType::PlayerTournament,
                    None,
                    format!("result row in tournament {} has no player link", tournament_id),
                ));
            };

            Ok(PlayerTournamentRaw {
                player_name: child_text(row, selector!("td.col-player")),
                player_id,
                tournament_id: tournament_id.to_string(),
                placement: child_text(row, selector!("td.col-place")).and_then(|s| parse_int(&s)),
                gg_points: child_text(row, selector!("td.col-gg")).and_then(|s| parse_decimal(&s)),
                elo_change: child_text(row, selector!("td.col-elo-delta")).and_then(|s| parse_decimal(&s)),
                prize_money: child_text(row, selector!("td.col-prize")).and_then(|s| parse_currency(&s)),
            })
        })
        .collect();

    Ok(rows)
}
