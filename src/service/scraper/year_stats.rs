//! Per-year statistics of a player, walked from the newest year backwards.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use scraper::Html;

use super::parse::{parse_decimal, parse_int, selector, Parsed, RowError};
use super::{require_target, PaginationHandler, Scraper};
use crate::domain::models::EntityType;
use crate::domain::raw::PlayerYearStatsRaw;
use crate::error::{ImportError, Result};

/// When to stop walking a player's year history.
///
/// Years are visited from `start_year` down to `min_year` inclusive. The walk
/// also stops once `gap_limit` consecutive years had no games; a year with
/// games resets the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearGapPolicy {
    pub start_year: i32,
    pub min_year: i32,
    pub gap_limit: u32,
}

impl YearGapPolicy {
    pub fn full_history(min_year: i32, gap_limit: u32) -> Self {
        Self {
            start_year: Utc::now().year(),
            min_year,
            gap_limit,
        }
    }

    pub fn current_year_only() -> Self {
        let year = Utc::now().year();
        Self {
            start_year: year,
            min_year: year,
            gap_limit: 1,
        }
    }

    /// Whether to stop after seeing `empty_streak` consecutive empty years.
    pub fn should_stop(&self, empty_streak: u32) -> bool {
        self.gap_limit > 0 && empty_streak >= self.gap_limit
    }
}

pub struct YearStatsScraper {
    pagination: PaginationHandler,
    base_url: String,
    policy: YearGapPolicy,
}

impl YearStatsScraper {
    pub fn new(pagination: PaginationHandler, base_url: &str, policy: YearGapPolicy) -> Self {
        Self {
            pagination,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn year_url(&self, player_id: &str, year: i32) -> String {
        format!("{}/stats/{}?year={}", self.base_url, player_id, year)
    }

    /// `None` when the player has no games that year.
    pub async fn scrape_year(&self, player_id: &str, year: i32) -> Result<Option<Parsed<PlayerYearStatsRaw>>> {
        let body = match self.pagination.fetcher().fetch(&self.year_url(player_id, year)).await {
            Ok(body) => body,
            Err(ImportError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let document = Html::parse_document(&body);
        extract_year_stats(&document, player_id, year)
    }
}

#[async_trait]
impl Scraper for YearStatsScraper {
    type Item = PlayerYearStatsRaw;

    async fn scrape(&self, target: Option<&str>) -> Result<Vec<Parsed<PlayerYearStatsRaw>>> {
        let player_id = require_target(target, "player")?;
        let mut out = Vec::new();
        let mut empty_streak = 0;

        let mut year = self.policy.start_year;
        while year >= self.policy.min_year {
            match self.scrape_year(player_id, year).await? {
                Some(row) => {
                    empty_streak = 0;
                    out.push(row);
                }
                None => {
                    empty_streak += 1;
                    if self.policy.should_stop(empty_streak) {
                        tracing::debug!(player_id, year, empty_streak, "Year history gap reached");
                        break;
                    }
                }
            }
            year -= 1;
        }

        Ok(out)
    }
}

pub fn extract_year_stats(
    document: &Html,
    player_id: &str,
    year: i32,
) -> Result<Option<Parsed<PlayerYearStatsRaw>>> {
    if document.select(selector!(".year-stats-empty")).next().is_some() {
        return Ok(None);
    }

    let block = document
        .select(selector!(".year-stats"))
        .next()
        .ok_or_else(|| ImportError::parse(EntityType::PlayerYearStats, "year stats block not found"))?;

    let text = |sel: &scraper::Selector| block.select(sel).next().map(super::parse::text_of);
    let identifier = format!("{}:{}", player_id, year);
    let missing = |name: &str| {
        RowError::new(
            EntityType::PlayerYearStats,
            Some(identifier.clone()),
            format!("{} missing", name),
        )
    };
    let count = |sel: &scraper::Selector, name: &str| {
        text(sel).and_then(|s| parse_int(&s)).ok_or_else(|| missing(name))
    };

    let total_games = match count(selector!(".stat-total-games"), "total games") {
        Ok(0) => return Ok(None),
        Ok(total) => total,
        Err(e) => return Ok(Some(Err(e))),
    };

    let row = (|| -> Parsed<PlayerYearStatsRaw> {
        Ok(PlayerYearStatsRaw {
            player_id: player_id.to_string(),
            year,
            total_games,
            don_games: count(selector!(".stat-don-games"), "don games")?,
            mafia_games: count(selector!(".stat-mafia-games"), "mafia games")?,
            sheriff_games: count(selector!(".stat-sheriff-games"), "sheriff games")?,
            civilian_games: count(selector!(".stat-civilian-games"), "civilian games")?,
            elo_rating: text(selector!(".stat-elo")).and_then(|s| parse_decimal(&s)),
            extra_points: text(selector!(".stat-extra-points"))
                .and_then(|s| parse_decimal(&s))
                .ok_or_else(|| missing("extra points"))?,
        })
    })();

    Ok(Some(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fetcher::PageFetcher;
    use crate::service::rate_limiter::RateLimiter;
    use crate::service::retry::{RetryManager, RetryPolicy};
    use crate::test_utils::{html, StaticSession};
    use std::sync::Arc;

    fn scraper(session: Arc<StaticSession>, policy: YearGapPolicy) -> YearStatsScraper {
        let fetcher = PageFetcher::new(
            session,
            Arc::new(RateLimiter::from_millis(0)),
            RetryManager::new(RetryPolicy::no_retry()),
        );
        YearStatsScraper::new(PaginationHandler::new(fetcher), "https://src", policy)
    }

    #[test]
    fn test_extract_year() {
        let page = html::year_stats_page(Some(html::YearStats::new(40)));
        let row = extract_year_stats(&Html::parse_document(&page), "5", 2024)
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(row.total_games, 40);
        assert_eq!(row.don_games, 4);
        assert_eq!(row.civilian_games, 24);
        assert_eq!(row.elo_rating, Some(1520.5));
        assert_eq!(row.extra_points, 3.25);

        let empty = html::year_stats_page(None);
        assert!(extract_year_stats(&Html::parse_document(&empty), "5", 2024)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_missing_role_count_is_row_error() {
        let page = r#"<html><body><div class="year-stats">
            <span class="stat-total-games">40</span>
            <span class="stat-extra-points">1,5</span>
        </div></body></html>"#;
        let row = extract_year_stats(&Html::parse_document(page), "5", 2024)
            .unwrap()
            .unwrap();

        let err = row.unwrap_err();
        assert_eq!(err.entity, EntityType::PlayerYearStats);
        assert_eq!(err.identifier.as_deref(), Some("5:2024"));
        assert!(err.message.contains("don games"));
    }

    #[tokio::test]
    async fn test_gap_stops_walk_and_resets_on_data() {
        let session = Arc::new(StaticSession::new());
        let policy = YearGapPolicy {
            start_year: 2024,
            min_year: 2015,
            gap_limit: 2,
        };
        let s = scraper(session.clone(), policy);

        // 2024 data, 2023 empty, 2022 data, 2021 + 2020 empty -> stop
        for (year, games) in [(2024, Some(10)), (2023, None), (2022, Some(7)), (2021, None), (2020, None), (2019, Some(3))] {
            session.add_page(
                &s.year_url("5", year),
                &html::year_stats_page(games.map(html::YearStats::new)),
            );
        }

        let rows = s.scrape(Some("5")).await.unwrap();
        let years: Vec<i32> = rows.iter().map(|r| r.as_ref().unwrap().year).collect();
        assert_eq!(years, vec![2024, 2022]);
        assert!(session.request_count(&s.year_url("5", 2019)) == 0);
        assert_eq!(session.request_count(&s.year_url("5", 2020)), 1);
    }

    #[tokio::test]
    async fn test_min_year_bounds_walk_and_404_is_empty() {
        let session = Arc::new(StaticSession::new());
        let policy = YearGapPolicy {
            start_year: 2024,
            min_year: 2023,
            gap_limit: 5,
        };
        let s = scraper(session.clone(), policy);
        session.add_page(&s.year_url("5", 2023), &html::year_stats_page(Some(html::YearStats::new(2))));

        let rows = s.scrape(Some("5")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(session.requests().len(), 2);
    }

    #[test]
    fn test_current_year_only() {
        let p = YearGapPolicy::current_year_only();
        assert_eq!(p.start_year, p.min_year);
        assert!(p.should_stop(1));
    }
}
