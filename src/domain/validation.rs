//! Field and constraint checks applied to every raw entity before it is stored.

use chrono::{Datelike, Utc};
use std::collections::HashSet;

use super::models::EntityType;
use super::raw::{
    ClubRaw, GameRaw, PlayerRaw, PlayerTournamentRaw, PlayerYearStatsRaw, TournamentRaw,
};
use super::stats::PlayerRoleStats;

/// Upper bound accepted for any ELO-like rating.
pub const MAX_ELO: f64 = 5000.0;
/// Earliest season the source has data for.
pub const MIN_YEAR: i32 = 2000;
/// A mafia table seats at most ten players.
pub const MAX_PARTICIPANTS: usize = 10;

/// Rich behavior: each raw shape knows how to check itself.
pub trait Validate {
    const ENTITY: EntityType;

    fn validate(&self) -> Result<(), String>;
}

fn require_id(field: &str, value: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{field} is empty"));
    }
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("{field} '{value}' is not numeric"));
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is empty"))
    } else {
        Ok(())
    }
}

fn check_elo(field: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !v.is_finite() || !(0.0..=MAX_ELO).contains(&v) => {
            Err(format!("{field} {v} out of range 0..={MAX_ELO}"))
        }
        _ => Ok(()),
    }
}

fn check_non_negative(field: &str, value: Option<i64>) -> Result<(), String> {
    match value {
        Some(v) if v < 0 => Err(format!("{field} is negative ({v})")),
        _ => Ok(()),
    }
}

impl Validate for PlayerRaw {
    const ENTITY: EntityType = EntityType::Player;

    fn validate(&self) -> Result<(), String> {
        require_id("gomafia_id", &self.gomafia_id)?;
        require_text("name", &self.name)?;
        if let Some(club) = &self.club_id {
            require_id("club_id", club)?;
        }
        check_elo("elo", self.elo)?;
        check_non_negative("tournaments_played", self.tournaments_played)?;
        Ok(())
    }
}

impl Validate for ClubRaw {
    const ENTITY: EntityType = EntityType::Club;

    fn validate(&self) -> Result<(), String> {
        require_id("gomafia_id", &self.gomafia_id)?;
        require_text("name", &self.name)?;
        check_elo("elo", self.elo)?;
        check_non_negative("members_count", self.members_count)?;
        Ok(())
    }
}

impl Validate for TournamentRaw {
    const ENTITY: EntityType = EntityType::Tournament;

    fn validate(&self) -> Result<(), String> {
        require_id("gomafia_id", &self.gomafia_id)?;
        require_text("name", &self.name)?;
        if let Some(stars) = self.stars {
            if stars > 5 {
                return Err(format!("stars {stars} out of range 0..=5"));
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(format!("end_date {end} precedes start_date {start}"));
            }
        }
        check_elo("average_elo", self.average_elo)?;
        if let Some(prize) = self.prize_pool {
            if !prize.is_finite() || prize < 0.0 {
                return Err(format!("prize_pool {prize} is invalid"));
            }
        }
        check_non_negative("participants_count", self.participants_count)?;
        Ok(())
    }
}

impl Validate for GameRaw {
    const ENTITY: EntityType = EntityType::Game;

    fn validate(&self) -> Result<(), String> {
        require_id("tournament_id", &self.tournament_id)?;
        require_text("gomafia_id", &self.gomafia_id)?;
        if self.participations.is_empty() {
            return Err("game has no participants".into());
        }
        if self.participations.len() > MAX_PARTICIPANTS {
            return Err(format!(
                "game has {} participants (max {MAX_PARTICIPANTS})",
                self.participations.len()
            ));
        }

        let mut seen = HashSet::new();
        for p in &self.participations {
            require_id("player_id", &p.player_id)?;
            if !seen.insert(p.player_id.as_str()) {
                return Err(format!("player {} seated twice", p.player_id));
            }
            if p.team != p.role.team() {
                return Err(format!(
                    "player {} role {} does not belong to team {}",
                    p.player_id,
                    p.role.as_str(),
                    p.team.as_str()
                ));
            }
            if p.is_winner != self.winner_team.is_winner(p.team) {
                return Err(format!(
                    "player {} is_winner={} contradicts winner_team {}",
                    p.player_id,
                    p.is_winner,
                    self.winner_team.as_str()
                ));
            }
            if let Some(score) = p.performance {
                if !score.is_finite() {
                    return Err(format!("player {} performance is not finite", p.player_id));
                }
            }
        }
        Ok(())
    }
}

impl Validate for PlayerTournamentRaw {
    const ENTITY: EntityType = EntityType::PlayerTournament;

    fn validate(&self) -> Result<(), String> {
        require_id("player_id", &self.player_id)?;
        require_id("tournament_id", &self.tournament_id)?;
        if let Some(place) = self.placement {
            if place < 1 {
                return Err(format!("placement {place} must be >= 1"));
            }
        }
        if let Some(prize) = self.prize_money {
            if !prize.is_finite() || prize < 0.0 {
                return Err(format!("prize_money {prize} is invalid"));
            }
        }
        Ok(())
    }
}

impl Validate for PlayerYearStatsRaw {
    const ENTITY: EntityType = EntityType::PlayerYearStats;

    fn validate(&self) -> Result<(), String> {
        require_id("player_id", &self.player_id)?;
        let max_year = Utc::now().year() + 1;
        if !(MIN_YEAR..=max_year).contains(&self.year) {
            return Err(format!("year {} out of range {MIN_YEAR}..={max_year}", self.year));
        }
        for (field, v) in [
            ("total_games", self.total_games),
            ("don_games", self.don_games),
            ("mafia_games", self.mafia_games),
            ("sheriff_games", self.sheriff_games),
            ("civilian_games", self.civilian_games),
        ] {
            check_non_negative(field, Some(v))?;
        }
        let by_role = self.don_games + self.mafia_games + self.sheriff_games + self.civilian_games;
        if by_role > self.total_games {
            return Err(format!(
                "role games ({by_role}) exceed total_games ({})",
                self.total_games
            ));
        }
        check_elo("elo_rating", self.elo_rating)?;
        Ok(())
    }
}

impl Validate for PlayerRoleStats {
    const ENTITY: EntityType = EntityType::PlayerRoleStats;

    fn validate(&self) -> Result<(), String> {
        require_id("player_id", &self.player_id)?;
        if self.wins + self.losses != self.games_played {
            return Err(format!(
                "wins ({}) + losses ({}) != games_played ({})",
                self.wins, self.losses, self.games_played
            ));
        }
        if !(0.0..=100.0).contains(&self.win_rate) {
            return Err(format!("win_rate {} out of range", self.win_rate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Role, Team, TournamentStatus, WinnerTeam};
    use crate::domain::raw::GameParticipationRaw;
    use chrono::NaiveDate;

    fn player(id: &str, name: &str) -> PlayerRaw {
        PlayerRaw {
            gomafia_id: id.into(),
            name: name.into(),
            region: None,
            club_id: None,
            elo: Some(1500.0),
            tournaments_played: Some(3),
            gg_points: None,
        }
    }

    fn seat(id: &str, role: Role, winner: WinnerTeam) -> GameParticipationRaw {
        GameParticipationRaw {
            player_id: id.into(),
            player_name: None,
            role,
            team: role.team(),
            is_winner: winner.is_winner(role.team()),
            performance: Some(0.5),
        }
    }

    fn game(winner: WinnerTeam) -> GameRaw {
        GameRaw {
            gomafia_id: "77-1-1".into(),
            tournament_id: "77".into(),
            date: None,
            round: 1,
            table_number: 1,
            winner_team: winner,
            participations: vec![
                seat("1", Role::Civilian, winner),
                seat("2", Role::Sheriff, winner),
                seat("3", Role::Mafia, winner),
                seat("4", Role::Don, winner),
            ],
        }
    }

    #[test]
    fn test_player_requires_numeric_id_and_name() {
        assert!(player("123", "Ann").validate().is_ok());
        assert!(player("", "Ann").validate().is_err());
        assert!(player("12a", "Ann").validate().is_err());
        assert!(player("123", "  ").validate().is_err());
    }

    #[test]
    fn test_player_elo_range() {
        let mut p = player("1", "Bob");
        p.elo = Some(-1.0);
        assert!(p.validate().is_err());
        p.elo = Some(f64::NAN);
        assert!(p.validate().is_err());
        p.elo = None;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_tournament_dates_and_stars() {
        let mut t = TournamentRaw {
            gomafia_id: "9".into(),
            name: "Cup".into(),
            city: None,
            status: TournamentStatus::Completed,
            stars: Some(5),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 2),
            average_elo: None,
            is_fsm_rated: true,
            prize_pool: Some(10000.0),
            participants_count: Some(20),
        };
        assert!(t.validate().is_ok());

        t.stars = Some(6);
        assert!(t.validate().is_err());

        t.stars = Some(3);
        t.end_date = NaiveDate::from_ymd_opt(2025, 2, 1);
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_game_winner_consistency() {
        assert!(game(WinnerTeam::Red).validate().is_ok());
        assert!(game(WinnerTeam::Draw).validate().is_ok());

        let mut g = game(WinnerTeam::Draw);
        g.participations[0].is_winner = true;
        let err = g.validate().unwrap_err();
        assert!(err.contains("contradicts"), "{err}");

        let mut g = game(WinnerTeam::Black);
        g.participations[2].is_winner = false;
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_game_rejects_duplicate_seat_and_team_mismatch() {
        let mut g = game(WinnerTeam::Red);
        g.participations[1].player_id = "1".into();
        assert!(g.validate().is_err());

        let mut g = game(WinnerTeam::Red);
        g.participations[0].team = Team::Black;
        g.participations[0].is_winner = false;
        assert!(g.validate().is_err());

        let mut g = game(WinnerTeam::Red);
        g.participations.clear();
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_year_stats_role_sum() {
        let mut s = PlayerYearStatsRaw {
            player_id: "5".into(),
            year: 2024,
            total_games: 10,
            don_games: 1,
            mafia_games: 2,
            sheriff_games: 1,
            civilian_games: 6,
            elo_rating: Some(1600.0),
            extra_points: 2.5,
        };
        assert!(s.validate().is_ok());
        s.civilian_games = 7;
        assert!(s.validate().is_err());
        s.civilian_games = 6;
        s.year = 1999;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_player_tournament_placement() {
        let mut r = PlayerTournamentRaw {
            player_id: "5".into(),
            player_name: None,
            tournament_id: "9".into(),
            placement: Some(1),
            gg_points: None,
            elo_change: Some(-3.5),
            prize_money: Some(500.0),
        };
        assert!(r.validate().is_ok());
        r.placement = Some(0);
        assert!(r.validate().is_err());
    }
}
