//! Raw entity shapes, exactly as scrapers extract them from the source.
//!
//! Nothing here is validated yet. Each shape carries the source's own
//! identifier (`gomafia_id`, or a composite natural key) which storage uses
//! as the upsert key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::{Role, Team, TournamentStatus, WinnerTeam};

/// Natural key used for de-duplication, checkpoints and upserts.
pub trait ExternalId {
    fn external_id(&self) -> String;
}

impl ExternalId for String {
    fn external_id(&self) -> String {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRaw {
    pub gomafia_id: String,
    pub name: String,
    pub region: Option<String>,
    pub club_id: Option<String>,
    pub elo: Option<f64>,
    pub tournaments_played: Option<i64>,
    pub gg_points: Option<f64>,
}

impl ExternalId for PlayerRaw {
    fn external_id(&self) -> String {
        self.gomafia_id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubRaw {
    pub gomafia_id: String,
    pub name: String,
    pub region: Option<String>,
    pub president_name: Option<String>,
    pub members_count: Option<i64>,
    pub elo: Option<f64>,
}

impl ExternalId for ClubRaw {
    fn external_id(&self) -> String {
        self.gomafia_id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentRaw {
    pub gomafia_id: String,
    pub name: String,
    pub city: Option<String>,
    pub status: TournamentStatus,
    /// Star rating, 0..=5, counted from the rendered glyphs.
    pub stars: Option<u8>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub average_elo: Option<f64>,
    pub is_fsm_rated: bool,
    pub prize_pool: Option<f64>,
    pub participants_count: Option<i64>,
}

impl ExternalId for TournamentRaw {
    fn external_id(&self) -> String {
        self.gomafia_id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameParticipationRaw {
    pub player_id: String,
    pub player_name: Option<String>,
    pub role: Role,
    pub team: Team,
    pub is_winner: bool,
    pub performance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRaw {
    /// `{tournament}-{round}-{table}`; the source has no global game id.
    pub gomafia_id: String,
    pub tournament_id: String,
    pub date: Option<NaiveDate>,
    pub round: i64,
    pub table_number: i64,
    pub winner_team: WinnerTeam,
    pub participations: Vec<GameParticipationRaw>,
}

impl GameRaw {
    pub fn composite_id(tournament_id: &str, round: i64, table: i64) -> String {
        format!("{}-{}-{}", tournament_id, round, table)
    }
}

impl ExternalId for GameRaw {
    fn external_id(&self) -> String {
        self.gomafia_id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerYearStatsRaw {
    pub player_id: String,
    pub year: i32,
    pub total_games: i64,
    pub don_games: i64,
    pub mafia_games: i64,
    pub sheriff_games: i64,
    pub civilian_games: i64,
    pub elo_rating: Option<f64>,
    pub extra_points: f64,
}

impl ExternalId for PlayerYearStatsRaw {
    fn external_id(&self) -> String {
        format!("{}:{}", self.player_id, self.year)
    }
}

/// A player's placement in one tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerTournamentRaw {
    pub player_id: String,
    pub player_name: Option<String>,
    pub tournament_id: String,
    pub placement: Option<i64>,
    pub gg_points: Option<f64>,
    pub elo_change: Option<f64>,
    pub prize_money: Option<f64>,
}

impl ExternalId for PlayerTournamentRaw {
    fn external_id(&self) -> String {
        format!("{}:{}", self.player_id, self.tournament_id)
    }
}
