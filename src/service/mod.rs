//! Fetching, scraping and the phased import built on top of them.

pub mod fetcher;
pub mod http;
pub mod import;
pub mod rate_limiter;
pub mod retry;
pub mod scheduler;
pub mod scraper;
pub mod session;
pub mod validation_tracker;

pub use fetcher::PageFetcher;
pub use http::ClientType;
pub use import::{ImportOrchestrator, Phase, PhaseReport, RunOutcome};
pub use rate_limiter::RateLimiter;
pub use retry::{Backoff, RetryManager, RetryPolicy};
pub use scheduler::run_scheduled;
pub use session::{HttpSession, PageSession};
pub use validation_tracker::{ValidationMetrics, ValidationMetricsTracker, ValidationReporter, ValidationSummary};
