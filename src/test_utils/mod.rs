//! Shared test utilities and fixtures
//!
//! `StaticSession` and the `html` page builders are public so integration
//! tests can drive the full pipeline without a network.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{ImportError, Result};
use crate::service::session::PageSession;

pub mod html;

/// How a scripted fetch failure surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    NotFound,
    SessionLost,
    Status(u16),
}

impl FailureKind {
    fn to_error(self, url: &str) -> ImportError {
        match self {
            FailureKind::Network => ImportError::network(format!("connection reset: {url}")),
            FailureKind::NotFound => ImportError::NotFound(url.to_string()),
            FailureKind::SessionLost => ImportError::SessionLost(format!("blocked at {url}")),
            FailureKind::Status(status) => ImportError::HttpStatus {
                status,
                url: url.to_string(),
            },
        }
    }
}

/// In-memory page source: URL → HTML, a request log and scripted failures.
///
/// Unknown URLs answer `NotFound`.
#[derive(Default)]
pub struct StaticSession {
    pages: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, (u32, FailureKind)>>,
    requests: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StaticSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, html: &str) {
        lock(&self.pages).insert(url.to_string(), html.to_string());
    }

    /// The next `times` fetches of `url` fail with `kind`.
    pub fn fail_times(&self, url: &str, times: u32, kind: FailureKind) {
        lock(&self.failures).insert(url.to_string(), (times, kind));
    }

    pub fn request_count(&self, url: &str) -> usize {
        lock(&self.requests).iter().filter(|u| *u == url).count()
    }

    /// Every fetched URL, in request order.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl PageSession for StaticSession {
    async fn fetch(&self, url: &str) -> Result<String> {
        lock(&self.requests).push(url.to_string());

        {
            let mut failures = lock(&self.failures);
            if let Some((remaining, kind)) = failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(kind.to_error(url));
                }
            }
        }

        lock(&self.pages)
            .get(url)
            .cloned()
            .ok_or_else(|| ImportError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
pub mod fixtures {
    use crate::domain::models::{Role, TournamentStatus, WinnerTeam};
    use crate::domain::raw::{GameParticipationRaw, GameRaw, PlayerRaw, PlayerTournamentRaw, PlayerYearStatsRaw, TournamentRaw};
    use chrono::NaiveDate;
    use sqlx::SqlitePool;

    /// Creates an in-memory SQLite database with migrations applied
    pub async fn setup_test_db() -> SqlitePool {
        crate::db::init_in_memory()
            .await
            .expect("Failed to create test database")
    }

    pub fn player(id: &str, name: &str) -> PlayerRaw {
        PlayerRaw {
            gomafia_id: id.into(),
            name: name.into(),
            region: Some("Москва".into()),
            club_id: None,
            elo: Some(1500.0),
            tournaments_played: Some(3),
            gg_points: Some(12.5),
        }
    }

    /// A completed, valid tournament.
    pub fn tournament(id: &str) -> TournamentRaw {
        TournamentRaw {
            gomafia_id: id.into(),
            name: format!("Tournament {id}"),
            city: Some("Москва".into()),
            status: TournamentStatus::Completed,
            stars: Some(3),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 3),
            average_elo: Some(1550.0),
            is_fsm_rated: true,
            prize_pool: Some(10000.0),
            participants_count: Some(40),
        }
    }

    /// Ten seats, players "1".."10": six civilians, a sheriff, two mafia and a don.
    pub fn game(tournament_id: &str, round: i64, table: i64, winner: WinnerTeam) -> GameRaw {
        let roles = [
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
            Role::Sheriff,
            Role::Mafia,
            Role::Mafia,
            Role::Don,
        ];
        let participations = roles
            .iter()
            .enumerate()
            .map(|(i, role)| GameParticipationRaw {
                player_id: (i + 1).to_string(),
                player_name: Some(format!("Player {}", i + 1)),
                role: *role,
                team: role.team(),
                is_winner: winner.is_winner(role.team()),
                performance: Some(1.0 + i as f64 / 10.0),
            })
            .collect();

        GameRaw {
            gomafia_id: GameRaw::composite_id(tournament_id, round, table),
            tournament_id: tournament_id.into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            round,
            table_number: table,
            winner_team: winner,
            participations,
        }
    }

    pub fn placement(player_id: &str, tournament_id: &str, place: i64) -> PlayerTournamentRaw {
        PlayerTournamentRaw {
            player_id: player_id.into(),
            player_name: None,
            tournament_id: tournament_id.into(),
            placement: Some(place),
            gg_points: Some(4.5),
            elo_change: Some(-2.0),
            prize_money: None,
        }
    }

    pub fn year_stats(player_id: &str, year: i32, total: i64) -> PlayerYearStatsRaw {
        PlayerYearStatsRaw {
            player_id: player_id.into(),
            year,
            total_games: total,
            don_games: total / 10,
            mafia_games: total / 5,
            sheriff_games: total / 10,
            civilian_games: total - total / 10 * 2 - total / 5,
            elo_rating: Some(1520.5),
            extra_points: 3.25,
        }
    }
}
