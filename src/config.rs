//! Import configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::models::SyncType;
use crate::service::retry::RetryPolicy;
use crate::service::validation_tracker::{DEFAULT_MAX_STORED_ERRORS, DEFAULT_THRESHOLD};

pub const DEFAULT_BASE_URL: &str = "https://gomafia.pro";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    pub base_url: String,
    /// Minimum delay between two requests to the source.
    pub rate_limit_ms: u64,
    /// Records (or identifiers) per checkpointed batch.
    pub batch_size: usize,
    /// Page cap for listings in FULL mode; `None` walks every page.
    pub max_listing_pages: Option<u32>,
    /// Page cap for listings in INCREMENTAL mode.
    pub incremental_listing_pages: u32,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub year_stats_min_year: i32,
    /// Consecutive empty years that end a player's year history walk.
    pub year_gap_limit: u32,
    /// How long the cross-process run lock stays valid without release.
    pub lock_lease: Duration,
    pub validation_threshold: f64,
    pub max_stored_errors: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_ms: 1000,
            batch_size: 50,
            max_listing_pages: None,
            incremental_listing_pages: 3,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            year_stats_min_year: 2015,
            year_gap_limit: 2,
            lock_lease: Duration::from_secs(2 * 60 * 60),
            validation_threshold: DEFAULT_THRESHOLD,
            max_stored_errors: DEFAULT_MAX_STORED_ERRORS,
        }
    }
}

impl ImportConfig {
    /// Listing page cap for the given mode.
    pub fn listing_page_cap(&self, mode: SyncType) -> Option<u32> {
        match mode {
            SyncType::Full => self.max_listing_pages,
            SyncType::Incremental => Some(
                self.max_listing_pages
                    .map_or(self.incremental_listing_pages, |max| max.min(self.incremental_listing_pages)),
            ),
        }
    }

    /// Clamp values that would stall or break a run.
    pub fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.incremental_listing_pages = self.incremental_listing_pages.max(1);
        self.retry.max_attempts = self.retry.max_attempts.max(1);
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self
    }
}
