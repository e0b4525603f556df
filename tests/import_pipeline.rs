//! End-to-end runs of the orchestrator over a scripted page source.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::sync::{Arc, OnceLock, Weak};

use gomafia_import::config::ImportConfig;
use gomafia_import::db;
use gomafia_import::domain::models::{Checkpoint, EntityType, PhaseName, SyncStatus, SyncType};
use gomafia_import::error::{ImportError, Result};
use gomafia_import::repository::ImportStore;
use gomafia_import::service::retry::RetryPolicy;
use gomafia_import::service::scraper::{build_page_url, PAGE_PARAM};
use gomafia_import::service::{ImportOrchestrator, PageSession};
use gomafia_import::test_utils::{html, FailureKind, StaticSession};

const BASE: &str = "https://src.test";

fn first_page(url: &str) -> String {
    build_page_url(url, PAGE_PARAM, 1).unwrap()
}

fn games_url(tournament: &str) -> String {
    first_page(&format!("{BASE}/tournament/{tournament}?tab=games"))
}

fn results_url(tournament: &str) -> String {
    first_page(&format!("{BASE}/tournament/{tournament}?tab=results"))
}

fn year_url(player: &str, year: i32) -> String {
    format!("{BASE}/stats/{player}?year={year}")
}

fn current_year() -> i32 {
    Utc::now().year()
}

fn config(batch_size: usize) -> ImportConfig {
    ImportConfig {
        base_url: BASE.into(),
        rate_limit_ms: 0,
        batch_size,
        retry: RetryPolicy::no_retry(),
        ..Default::default()
    }
}

/// Ten players, one club, two completed tournaments with three games and
/// three placed players each, and current-year stats for every player.
fn seeded_session() -> Arc<StaticSession> {
    let session = Arc::new(StaticSession::new());

    let players: Vec<html::PlayerRow> = (1..=10)
        .map(|i| html::PlayerRow::new(&i.to_string(), &format!("Player {i}")).elo("1 500"))
        .collect();
    session.add_page(&first_page(&format!("{BASE}/rating")), &html::players_page(&players, false));
    session.add_page(
        &first_page(&format!("{BASE}/rating?tab=clubs")),
        &html::clubs_page(&[("45", "Red Hall")], false),
    );
    session.add_page(
        &first_page(&format!("{BASE}/tournaments")),
        &html::tournaments_page(
            &[
                html::TournamentRow::new("77", "Кубок Москвы", "Завершён"),
                html::TournamentRow::new("78", "Весенний кубок", "Завершён"),
            ],
            false,
        ),
    );

    session.add_page(
        &games_url("77"),
        &html::games_page(
            &[
                html::GameCard::new(1, 1, "Победа мирных"),
                html::GameCard::new(1, 2, "Победа мафии"),
            ],
            false,
        ),
    );
    session.add_page(&games_url("78"), &html::games_page(&[html::GameCard::new(1, 1, "Ничья")], false));

    for tournament in ["77", "78"] {
        session.add_page(
            &results_url(tournament),
            &html::results_page(&[
                html::ResultRow::new(1, "1").prize("5 000 ₽"),
                html::ResultRow::new(2, "2"),
                html::ResultRow::new(3, "3"),
            ]),
        );
    }

    for player in 1..=10 {
        session.add_page(
            &year_url(&player.to_string(), current_year()),
            &html::year_stats_page(Some(html::YearStats::new(20))),
        );
    }

    session
}

async fn setup(session: Arc<StaticSession>, batch_size: usize) -> (ImportStore, ImportOrchestrator) {
    let store = ImportStore::new(db::init_in_memory().await.unwrap());
    let orchestrator = ImportOrchestrator::new(store.clone(), config(batch_size), session);
    (store, orchestrator)
}

#[tokio::test]
async fn test_full_run_imports_every_phase() {
    let (store, orchestrator) = setup(seeded_session(), 4).await;

    let outcome = orchestrator.run(SyncType::Full).await.unwrap();
    assert_eq!(outcome.status, SyncStatus::Completed);
    assert_eq!(outcome.phases.len(), 7);
    assert!(outcome.failures.is_empty());

    assert_eq!(store.players.count().await.unwrap(), 10);
    assert_eq!(store.clubs.count().await.unwrap(), 1);
    assert_eq!(store.tournaments.count().await.unwrap(), 2);
    assert_eq!(store.games.count().await.unwrap(), 3);
    assert_eq!(store.games.count_participations().await.unwrap(), 30);
    assert_eq!(store.results.count().await.unwrap(), 6);
    assert_eq!(store.year_stats.count().await.unwrap(), 10);
    // Every player kept their seat (and role) in all three games.
    assert_eq!(store.role_stats.count().await.unwrap(), 10);

    let summary = &outcome.summary;
    assert_eq!(summary.validation_rate, 100.0);
    assert!(summary.meets_threshold);
    assert_eq!(summary.duplicates_skipped, 0);
    // 10 players, 1 club, 2 tournaments, 3 games, 6 placements, 10 year rows, 10 role rows
    assert_eq!(summary.valid_records, 42);

    let metrics = orchestrator.get_validation_metrics();
    assert_eq!(metrics.total_fetched, metrics.valid_records + metrics.invalid_records);

    let status = orchestrator.status().await.unwrap();
    assert!(!status.is_running);
    assert!(status.last_error.is_none());
    assert_eq!(status.total_records_processed, outcome.records_processed);
    assert!(orchestrator.inspect_checkpoint().await.unwrap().is_none());

    let logs = orchestrator.recent_sync_logs(5).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, SyncStatus::Completed);
    assert!(logs[0].end_time.is_some());
}

#[tokio::test]
async fn test_reimport_counts_duplicates_not_errors() {
    let (store, orchestrator) = setup(seeded_session(), 4).await;

    orchestrator.run(SyncType::Full).await.unwrap();
    let second = orchestrator.run(SyncType::Full).await.unwrap();

    assert_eq!(second.status, SyncStatus::Completed);
    assert_eq!(store.players.count().await.unwrap(), 10);
    assert_eq!(store.games.count().await.unwrap(), 3);
    assert_eq!(store.games.count_participations().await.unwrap(), 30);

    let players = &second.phases[0];
    assert_eq!(players.phase, PhaseName::Players);
    assert_eq!(players.inserted, 0);
    assert_eq!(players.updated, 10);

    // Nothing new was fetched: every row is a duplicate and none is valid.
    assert_eq!(second.summary.duplicates_skipped, 42);
    assert_eq!(second.summary.valid_records, 0);
    assert_eq!(second.summary.invalid_records, 0);
    assert_eq!(second.summary.total_records, 0);
    assert_eq!(second.summary.validation_rate, 100.0);
    assert_eq!(orchestrator.get_validation_metrics().duplicates_skipped, 42);
}

#[tokio::test]
async fn test_bad_rows_are_invalid_and_skipped() {
    let session = seeded_session();
    session.add_page(
        &first_page(&format!("{BASE}/rating")),
        &html::players_page(
            &[
                html::PlayerRow::new("1", "Alice"),
                html::PlayerRow::new("2", ""),
                html::PlayerRow::new("3", "Carol").elo("9 999"),
                html::PlayerRow::new("1", "Alice again"),
            ],
            false,
        ),
    );
    let (store, orchestrator) = setup(session, 10).await;

    let outcome = orchestrator.run(SyncType::Full).await.unwrap();
    assert_eq!(outcome.status, SyncStatus::Completed);
    assert_eq!(store.players.count().await.unwrap(), 1);

    let players = &outcome.phases[0];
    assert_eq!(players.invalid, 2);
    assert_eq!(players.duplicates, 1);
    assert_eq!(outcome.summary.errors_by_entity.get(&EntityType::Player), Some(&2));
}

#[tokio::test]
async fn test_incremental_revisits_only_unfinished_work() {
    let session = seeded_session();
    let (_store, orchestrator) = setup(session.clone(), 4).await;
    orchestrator.run(SyncType::Full).await.unwrap();

    let games_before = session.request_count(&games_url("77"));
    let older_year_before = session.request_count(&year_url("1", current_year() - 1));

    let outcome = orchestrator.run(SyncType::Incremental).await.unwrap();
    assert_eq!(outcome.status, SyncStatus::Completed);
    assert_eq!(outcome.sync_type, SyncType::Incremental);

    // Completed tournaments with games and results are not fetched again.
    assert_eq!(session.request_count(&games_url("77")), games_before);
    // Only the current year is fetched.
    assert_eq!(session.request_count(&year_url("1", current_year() - 1)), older_year_before);
    assert_eq!(session.request_count(&year_url("1", current_year())), 2);
}

#[tokio::test]
async fn test_resume_skips_processed_identifiers() {
    let session = seeded_session();
    let (store, orchestrator) = setup(session.clone(), 1).await;

    // An earlier run stored the tournaments and finished tournament 77's games.
    store
        .tournaments
        .upsert_batch(&[tournament("77"), tournament("78")])
        .await
        .unwrap();
    store
        .checkpoints
        .save(&Checkpoint::new(PhaseName::Games, 0, 2, vec!["77".into()]))
        .await
        .unwrap();

    let outcome = orchestrator.run(SyncType::Full).await.unwrap();
    assert_eq!(outcome.status, SyncStatus::Completed);

    assert_eq!(session.request_count(&first_page(&format!("{BASE}/rating"))), 0);
    assert_eq!(session.request_count(&games_url("77")), 0);
    assert_eq!(session.request_count(&games_url("78")), 1);
    assert_eq!(store.games.count().await.unwrap(), 1);
    assert!(outcome.phases[0].resumed);
    assert_eq!(outcome.phases[0].phase, PhaseName::Games);
}

#[tokio::test]
async fn test_identifier_failure_is_logged_and_run_continues() {
    let session = seeded_session();
    session.fail_times(&games_url("78"), u32::MAX, FailureKind::Status(502));
    let (store, orchestrator) = setup(session, 4).await;

    let outcome = orchestrator.run(SyncType::Full).await.unwrap();
    assert_eq!(outcome.status, SyncStatus::Completed);
    assert_eq!(store.games.count().await.unwrap(), 2);

    assert_eq!(outcome.failures.len(), 1);
    let failure = &outcome.failures[0];
    assert_eq!(failure.phase, Some(PhaseName::Games));
    assert_eq!(failure.identifier.as_deref(), Some("78"));

    let log = &orchestrator.recent_sync_logs(1).await.unwrap()[0];
    assert_eq!(log.errors, outcome.failures);
}

#[tokio::test]
async fn test_session_loss_fails_the_run() {
    let session = seeded_session();
    session.fail_times(&first_page(&format!("{BASE}/tournaments")), 1, FailureKind::SessionLost);
    let (store, orchestrator) = setup(session, 4).await;

    let err = orchestrator.run(SyncType::Full).await.unwrap_err();
    assert!(matches!(err, ImportError::SessionLost(_)));
    assert_eq!(store.players.count().await.unwrap(), 10);
    assert_eq!(store.games.count().await.unwrap(), 0);

    let log = &orchestrator.recent_sync_logs(1).await.unwrap()[0];
    assert_eq!(log.status, SyncStatus::Failed);
    assert_eq!(log.errors.last().and_then(|e| e.phase), Some(PhaseName::Tournaments));

    let status = orchestrator.status().await.unwrap();
    assert!(!status.is_running);
    assert!(status.last_error.is_some());

    // The failure was one-off; the next run goes through.
    let outcome = orchestrator.run(SyncType::Full).await.unwrap();
    assert_eq!(outcome.status, SyncStatus::Completed);
    assert_eq!(store.games.count().await.unwrap(), 3);
}

/// Cancels the orchestrator as soon as `trigger` is fetched.
struct CancellingSession {
    inner: Arc<StaticSession>,
    trigger: String,
    orchestrator: OnceLock<Weak<ImportOrchestrator>>,
}

#[async_trait]
impl PageSession for CancellingSession {
    async fn fetch(&self, url: &str) -> Result<String> {
        if url == self.trigger {
            if let Some(orchestrator) = self.orchestrator.get().and_then(Weak::upgrade) {
                orchestrator.cancel();
            }
        }
        self.inner.fetch(url).await
    }
}

#[tokio::test]
async fn test_cancel_stops_at_batch_boundary_and_resumes() {
    let inner = seeded_session();
    let session = Arc::new(CancellingSession {
        inner: inner.clone(),
        trigger: games_url("77"),
        orchestrator: OnceLock::new(),
    });
    let store = ImportStore::new(db::init_in_memory().await.unwrap());
    let orchestrator = Arc::new(ImportOrchestrator::new(store.clone(), config(1), session.clone()));
    session.orchestrator.set(Arc::downgrade(&orchestrator)).ok();

    let outcome = orchestrator.run(SyncType::Full).await.unwrap();
    assert_eq!(outcome.status, SyncStatus::Cancelled);
    // The in-flight batch finished before the cancel took effect.
    assert_eq!(store.games.count().await.unwrap(), 2);
    assert_eq!(inner.request_count(&games_url("78")), 0);

    let log = &orchestrator.recent_sync_logs(1).await.unwrap()[0];
    assert_eq!(log.status, SyncStatus::Cancelled);

    let checkpoint = orchestrator.inspect_checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.phase, PhaseName::Games);
    assert_eq!(checkpoint.processed_count, 1);

    // A later run picks up at tournament 78.
    let outcome = orchestrator.run(SyncType::Full).await.unwrap();
    assert_eq!(outcome.status, SyncStatus::Completed);
    assert_eq!(inner.request_count(&games_url("77")), 1);
    assert_eq!(inner.request_count(&games_url("78")), 1);
    assert_eq!(store.games.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_second_concurrent_run_is_rejected() {
    let (_store, orchestrator) = setup(seeded_session(), 4).await;

    let (first, second) = tokio::join!(orchestrator.run(SyncType::Full), orchestrator.run(SyncType::Incremental));
    assert!(first.is_ok());
    assert!(matches!(second, Err(ImportError::AlreadyRunning)));
    assert_eq!(orchestrator.recent_sync_logs(5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_interrupted_run_is_failed_before_next_run() {
    let (store, orchestrator) = setup(seeded_session(), 4).await;
    let stale = store.sync.create_log(SyncType::Full, Utc::now()).await.unwrap();

    orchestrator.run(SyncType::Incremental).await.unwrap();

    let stale_log = store.sync.get_log(stale).await.unwrap().unwrap();
    assert_eq!(stale_log.status, SyncStatus::Failed);
    assert!(stale_log.errors[0].message.contains("interrupted"));

    let logs = orchestrator.recent_sync_logs(5).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].status, SyncStatus::Completed);
}

fn tournament(id: &str) -> gomafia_import::domain::raw::TournamentRaw {
    use gomafia_import::domain::models::TournamentStatus;
    gomafia_import::domain::raw::TournamentRaw {
        gomafia_id: id.into(),
        name: format!("Tournament {id}"),
        city: None,
        status: TournamentStatus::Completed,
        stars: Some(3),
        start_date: None,
        end_date: None,
        average_elo: None,
        is_fsm_rated: false,
        prize_pool: None,
        participants_count: None,
    }
}
