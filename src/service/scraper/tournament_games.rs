//! Games tab of a tournament: one card per played table, one row per seat.
//!
//! Team comes from the seat's role and `is_winner` from `(team, winner)`;
//! on a draw nobody wins.

use async_trait::async_trait;
use scraper::{ElementRef, Html};

use super::parse::{
    child_attr, child_text, has_next_page, id_from_href, parse_date, parse_decimal, parse_role,
    parse_winner, selector, Parsed, RowError,
};
use super::{require_target, PaginationConfig, PaginationHandler, Scraper, PAGE_PARAM};
use crate::domain::models::EntityType;
use crate::domain::raw::{GameParticipationRaw, GameRaw};
use crate::error::{ImportError, Result};

pub struct TournamentGamesScraper {
    pagination: PaginationHandler,
    base_url: String,
}

impl TournamentGamesScraper {
    pub fn new(pagination: PaginationHandler, base_url: &str) -> Self {
        Self {
            pagination,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn games_url(&self, tournament_id: &str) -> String {
        format!("{}/tournament/{}?tab=games", self.base_url, tournament_id)
    }
}

#[async_trait]
impl Scraper for TournamentGamesScraper {
    type Item = GameRaw;

    async fn scrape(&self, target: Option<&str>) -> Result<Vec<Parsed<GameRaw>>> {
        let tournament_id = require_target(target, "tournament")?;
        let url = self.games_url(tournament_id);
        let extract = |document: &Html| extract_games(document, tournament_id);

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

pub fn extract_games(document: &Html, tournament_id: &str) -> Result<Vec<Parsed<GameRaw>>> {
    let container = document
        .select(selector!(".games-list"))
        .next()
        .ok_or_else(|| ImportError::parse(EntityType::Game, "games list not found"))?;

    Ok(container
        .select(selector!(".game-card"))
        .map(|card| extract_game(card, tournament_id))
        .collect())
}

fn card_number(card: ElementRef<'_>, attr: &str) -> Option<i64> {
    card.value().attr(attr).and_then(|s| s.trim().parse().ok())
}

fn extract_game(card: ElementRef<'_>, tournament_id: &str) -> Parsed<GameRaw> {
    let (Some(round), Some(table_number)) = (card_number(card, "data-round"), card_number(card, "data-table"))
    else {
        return Err(RowError::new(
            EntityType::Game,
            None,
            format!("game card in tournament {} has no round/table", tournament_id),
        ));
    };
    let gomafia_id = GameRaw::composite_id(tournament_id, round, table_number);

    let result_label = child_text(card, selector!(".game-result")).unwrap_or_default();
    let Some(winner_team) = parse_winner(&result_label) else {
        return Err(RowError::new(
            EntityType::Game,
            Some(gomafia_id),
            format!("unknown game result '{}'", result_label),
        ));
    };

    let mut participations = Vec::new();
    for seat in card.select(selector!("tr.seat")) {
        let Some(player_id) = child_attr(seat, selector!("td.seat-player a"), "href").and_then(id_from_href)
        else {
            return Err(RowError::new(EntityType::Game, Some(gomafia_id), "seat without player link"));
        };
        let role_label = child_text(seat, selector!("td.seat-role")).unwrap_or_default();
        let Some(role) = parse_role(&role_label) else {
            return Err(RowError::new(
                EntityType::Game,
                Some(gomafia_id),
                format!("seat {} has unknown role '{}'", player_id, role_label),
            ));
        };
        let team = role.team();

        participations.push(GameParticipationRaw {
            player_name: child_text(seat, selector!("td.seat-player")),
            player_id,
            role,
            team,
            is_winner: winner_team.is_winner(team),
            performance: child_text(seat, selector!("td.seat-points")).and_then(|s| parse_decimal(&s)),
        });
    }

    Ok(GameRaw {
        gomafia_id,
        tournament_id: tournament_id.to_string(),
        date: child_text(card, selector!(".game-date")).and_then(|s| parse_date(&s)),
        round,
        table_number,
        winner_team,
        participations,
    })
}
