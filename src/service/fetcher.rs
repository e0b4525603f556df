use std::sync::Arc;

use crate::error::Result;
use crate::service::rate_limiter::RateLimiter;
use crate::service::retry::RetryManager;
use crate::service::session::PageSession;

/// The one path by which pages are loaded during a run: every attempt,
/// retries included, first waits on the shared [`RateLimiter`].
#[derive(Clone)]
pub struct PageFetcher {
    session: Arc<dyn PageSession>,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryManager,
}

impl PageFetcher {
    pub fn new(
        session: Arc<dyn PageSession>,
        rate_limiter: Arc<RateLimiter>,
        retry: RetryManager,
    ) -> Self {
        Self {
            session,
            rate_limiter,
            retry,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        self.retry
            .with_retry(url, || async {
                self.rate_limiter.wait().await;
                self.session.fetch(url).await
            })
            .await
    }

    pub fn session(&self) -> &Arc<dyn PageSession> {
        &self.session
    }
}
