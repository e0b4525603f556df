//! Pipeline bookkeeping entities and the enums shared across the import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ====== Enums ======

/// One stage of the import, executed strictly in `PhaseName::ALL` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseName {
    Players,
    Clubs,
    Tournaments,
    Games,
    PlayerTournamentHistory,
    PlayerYearStats,
    Statistics,
}

impl PhaseName {
    pub const ALL: [PhaseName; 7] = [
        PhaseName::Players,
        PhaseName::Clubs,
        PhaseName::Tournaments,
        PhaseName::Games,
        PhaseName::PlayerTournamentHistory,
        PhaseName::PlayerYearStats,
        PhaseName::Statistics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Players => "PLAYERS",
            PhaseName::Clubs => "CLUBS",
            PhaseName::Tournaments => "TOURNAMENTS",
            PhaseName::Games => "GAMES",
            PhaseName::PlayerTournamentHistory => "PLAYER_TOURNAMENT_HISTORY",
            PhaseName::PlayerYearStats => "PLAYER_YEAR_STATS",
            PhaseName::Statistics => "STATISTICS",
        }
    }

    /// Position in the fixed execution order.
    pub fn ordinal(&self) -> usize {
        Self::ALL
            .iter()
            .position(|p| p == self)
            .unwrap_or(Self::ALL.len())
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncType {
    Full,
    Incremental,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Full => "FULL",
            SyncType::Incremental => "INCREMENTAL",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FULL" => Ok(SyncType::Full),
            "INCREMENTAL" => Ok(SyncType::Incremental),
            other => Err(format!("unknown sync type: {other}")),
        }
    }
}

/// Lifecycle of a `SyncLog` row: `Running` moves to exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Running => "RUNNING",
            SyncStatus::Completed => "COMPLETED",
            SyncStatus::Failed => "FAILED",
            SyncStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::Running)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(SyncStatus::Running),
            "COMPLETED" => Ok(SyncStatus::Completed),
            "FAILED" => Ok(SyncStatus::Failed),
            "CANCELLED" => Ok(SyncStatus::Cancelled),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    Completed,
    InProgress,
    Scheduled,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Completed => "COMPLETED",
            TournamentStatus::InProgress => "IN_PROGRESS",
            TournamentStatus::Scheduled => "SCHEDULED",
            TournamentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(TournamentStatus::Completed),
            "IN_PROGRESS" => Ok(TournamentStatus::InProgress),
            "SCHEDULED" => Ok(TournamentStatus::Scheduled),
            "CANCELLED" => Ok(TournamentStatus::Cancelled),
            other => Err(format!("unknown tournament status: {other}")),
        }
    }
}

/// Side a participant played on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Team {
    Red,
    Black,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Red => "RED",
            Team::Black => "BLACK",
        }
    }
}

impl FromStr for Team {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RED" => Ok(Team::Red),
            "BLACK" => Ok(Team::Black),
            other => Err(format!("unknown team: {other}")),
        }
    }
}

/// Outcome of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinnerTeam {
    Black,
    Red,
    Draw,
}

impl WinnerTeam {
    pub fn as_str(&self) -> &'static str {
        match self {
            WinnerTeam::Black => "BLACK",
            WinnerTeam::Red => "RED",
            WinnerTeam::Draw => "DRAW",
        }
    }

    /// A participant wins iff their team is the winning team; nobody wins a draw.
    pub fn is_winner(&self, team: Team) -> bool {
        match self {
            WinnerTeam::Black => team == Team::Black,
            WinnerTeam::Red => team == Team::Red,
            WinnerTeam::Draw => false,
        }
    }
}

impl FromStr for WinnerTeam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLACK" => Ok(WinnerTeam::Black),
            "RED" => Ok(WinnerTeam::Red),
            "DRAW" => Ok(WinnerTeam::Draw),
            other => Err(format!("unknown winner team: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Civilian,
    Sheriff,
    Mafia,
    Don,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Civilian => "CIVILIAN",
            Role::Sheriff => "SHERIFF",
            Role::Mafia => "MAFIA",
            Role::Don => "DON",
        }
    }

    pub fn team(&self) -> Team {
        match self {
            Role::Civilian | Role::Sheriff => Team::Red,
            Role::Mafia | Role::Don => Team::Black,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CIVILIAN" => Ok(Role::Civilian),
            "SHERIFF" => Ok(Role::Sheriff),
            "MAFIA" => Ok(Role::Mafia),
            "DON" => Ok(Role::Don),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Entity families tracked by the validation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Player,
    Club,
    Tournament,
    Game,
    GameParticipation,
    PlayerTournament,
    PlayerYearStats,
    PlayerRoleStats,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Player => "player",
            EntityType::Club => "club",
            EntityType::Tournament => "tournament",
            EntityType::Game => "game",
            EntityType::GameParticipation => "game_participation",
            EntityType::PlayerTournament => "player_tournament",
            EntityType::PlayerYearStats => "player_year_stats",
            EntityType::PlayerRoleStats => "player_role_stats",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ====== Run bookkeeping ======

/// Durable progress marker for the phase currently executing.
///
/// `last_batch_index < total_batches` while the phase is in progress; the
/// checkpoint is only consulted by the phase whose name it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub phase: PhaseName,
    pub last_batch_index: i64,
    pub total_batches: i64,
    pub processed_ids: Vec<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        phase: PhaseName,
        last_batch_index: i64,
        total_batches: i64,
        processed_ids: Vec<String>,
    ) -> Self {
        Self {
            phase,
            last_batch_index,
            total_batches,
            message: format!(
                "{} batch {}/{} ({} processed)",
                phase,
                last_batch_index + 1,
                total_batches,
                processed_ids.len()
            ),
            processed_ids,
            timestamp: Utc::now(),
        }
    }

    pub fn info(&self) -> CheckpointInfo {
        CheckpointInfo {
            phase: self.phase,
            last_batch_index: self.last_batch_index,
            total_batches: self.total_batches,
            processed_count: self.processed_ids.len(),
            message: self.message.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Operator-facing view of a checkpoint (no id list).
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointInfo {
    pub phase: PhaseName,
    pub last_batch_index: i64,
    pub total_batches: i64,
    pub processed_count: usize,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// The single `current` status row polled by status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub is_running: bool,
    pub current_operation: Option<String>,
    pub last_sync_type: Option<SyncType>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub total_records_processed: i64,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            current_operation: None,
            last_sync_type: None,
            last_sync_time: None,
            last_error: None,
            total_records_processed: 0,
        }
    }
}

/// One entry of the `sync_logs.errors` ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    pub phase: Option<PhaseName>,
    pub identifier: Option<String>,
    pub message: String,
}

/// Append-only history row, one per run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncLog {
    pub id: i64,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub records_processed: i64,
    pub errors: Vec<SyncErrorEntry>,
}
