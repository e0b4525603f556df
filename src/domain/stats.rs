//! Per-(player, role) statistics derived from stored participations.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::models::Role;
use super::raw::ExternalId;

/// One stored participation joined with its game's date.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipationRow {
    pub player_id: String,
    pub role: Role,
    pub is_winner: bool,
    pub performance: Option<f64>,
    pub game_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRoleStats {
    pub player_id: String,
    pub role: Role,
    pub games_played: i64,
    pub wins: i64,
    pub losses: i64,
    /// wins / games_played × 100, two decimals.
    pub win_rate: f64,
    /// Mean of the non-null performance scores.
    pub average_performance: Option<f64>,
    pub last_played: Option<NaiveDate>,
}

impl ExternalId for PlayerRoleStats {
    fn external_id(&self) -> String {
        format!("{}:{}", self.player_id, self.role.as_str())
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Default)]
struct Accumulator {
    games: i64,
    wins: i64,
    perf_sum: f64,
    perf_count: i64,
    last_played: Option<NaiveDate>,
}

/// Groups rows by (player, role). Output is ordered by player id then role.
pub fn aggregate_role_stats(rows: &[ParticipationRow]) -> Vec<PlayerRoleStats> {
    let mut groups: BTreeMap<(&str, Role), Accumulator> = BTreeMap::new();

    for row in rows {
        let acc = groups.entry((row.player_id.as_str(), row.role)).or_default();
        acc.games += 1;
        if row.is_winner {
            acc.wins += 1;
        }
        if let Some(score) = row.performance {
            acc.perf_sum += score;
            acc.perf_count += 1;
        }
        if let Some(date) = row.game_date {
            acc.last_played = Some(acc.last_played.map_or(date, |d| d.max(date)));
        }
    }

    groups
        .into_iter()
        .map(|((player_id, role), acc)| PlayerRoleStats {
            player_id: player_id.to_string(),
            role,
            games_played: acc.games,
            wins: acc.wins,
            losses: acc.games - acc.wins,
            win_rate: if acc.games > 0 {
                round2(acc.wins as f64 / acc.games as f64 * 100.0)
            } else {
                0.0
            },
            average_performance: (acc.perf_count > 0)
                .then(|| round2(acc.perf_sum / acc.perf_count as f64)),
            last_played: acc.last_played,
        })
        .collect()
}
