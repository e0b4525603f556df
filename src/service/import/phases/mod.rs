//! The seven phases, in execution order.

mod detail;
mod listing;
mod statistics;

pub use detail::{GamesPhase, TournamentHistoryPhase, YearStatsPhase};
pub use listing::{ClubsPhase, PlayersPhase, TournamentsPhase};
pub use statistics::StatisticsPhase;

use super::phase::Phase;

/// One instance of every phase, ordered like `PhaseName::ALL`.
pub fn default_phases() -> Vec<Box<dyn Phase>> {
    vec![
        Box::new(PlayersPhase),
        Box::new(ClubsPhase),
        Box::new(TournamentsPhase),
        Box::new(GamesPhase),
        Box::new(TournamentHistoryPhase),
        Box::new(YearStatsPhase),
        Box::new(StatisticsPhase),
    ]
}
