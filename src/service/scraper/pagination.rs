//! Page-by-page traversal of paginated listings.

use scraper::Html;
use url::Url;

use crate::error::Result;
use crate::service::fetcher::PageFetcher;

/// What to traverse and how to read each page.
pub struct PaginationConfig<'a, T> {
    pub base_url: &'a str,
    pub page_param: &'a str,
    /// Stop after this many pages even if the source reports more.
    pub max_pages: Option<u32>,
    pub extract: &'a (dyn Fn(&Html) -> Result<Vec<T>> + Send + Sync),
    pub has_next: &'a (dyn Fn(&Html) -> bool + Send + Sync),
}

/// Set `page_param` to `page` on `base_url`, keeping every other query pair.
///
/// An existing `page_param` is replaced, never duplicated. Other pairs are
/// kept byte for byte, encoding included.
pub fn build_page_url(base_url: &str, page_param: &str, page: u32) -> Result<String> {
    let mut url = Url::parse(base_url)?;

    let mut segments: Vec<String> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|seg| !seg.is_empty())
        .filter(|seg| seg.split('=').next() != Some(page_param))
        .map(str::to_string)
        .collect();
    segments.push(format!("{}={}", page_param, page));

    url.set_query(Some(&segments.join("&")));
    Ok(url.to_string())
}

#[derive(Clone)]
pub struct PaginationHandler {
    fetcher: PageFetcher,
}

impl PaginationHandler {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    /// Walk pages 1..N and concatenate their records in page order.
    ///
    /// Stops when `has_next` is false or `max_pages` is reached. An error
    /// from loading or extracting any page is returned as is.
    pub async fn scrape_all_pages<T: Send>(&self, config: PaginationConfig<'_, T>) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut page: u32 = 1;

        loop {
            let url = build_page_url(config.base_url, config.page_param, page)?;
            tracing::debug!(page, url = %url, "[PAGINATION] Loading page");

            let body = self.fetcher.fetch(&url).await?;

            // Html is !Send; parse and read it without holding it across an await.
            let (records, has_next) = {
                let document = Html::parse_document(&body);
                let records = (config.extract)(&document)?;
                let has_next = (config.has_next)(&document);
                (records, has_next)
            };

            tracing::debug!(page, count = records.len(), has_next, "[PAGINATION] Page extracted");
            results.extend(records);

            if !has_next {
                break;
            }
            if config.max_pages.is_some_and(|max| page >= max) {
                tracing::info!(page, "[PAGINATION] Reached max pages limit");
                break;
            }
            page += 1;
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EntityType;
    use crate::error::ImportError;
    use crate::service::rate_limiter::RateLimiter;
    use crate::service::retry::{RetryManager, RetryPolicy};
    use crate::test_utils::StaticSession;
    use scraper::Selector;
    use std::sync::Arc;

    fn handler(session: Arc<StaticSession>) -> PaginationHandler {
        PaginationHandler::new(PageFetcher::new(
            session,
            Arc::new(RateLimiter::from_millis(0)),
            RetryManager::new(RetryPolicy::no_retry()),
        ))
    }

    fn items(doc: &Html) -> Result<Vec<String>> {
        let sel = Selector::parse("li").unwrap();
        Ok(doc
            .select(&sel)
            .map(|e| e.text().collect::<String>())
            .collect())
    }

    fn never(_: &Html) -> bool {
        false
    }

    fn always(_: &Html) -> bool {
        true
    }

    #[test]
    fn test_build_page_url() {
        assert_eq!(
            build_page_url("https://x/list", "page", 1).unwrap(),
            "https://x/list?page=1"
        );
        assert_eq!(
            build_page_url("https://x/list?year=2025", "page", 2).unwrap(),
            "https://x/list?year=2025&page=2"
        );
        assert_eq!(
            build_page_url("https://x/list?page=4&year=2025", "page", 5).unwrap(),
            "https://x/list?year=2025&page=5"
        );
        assert!(build_page_url("not a url", "page", 1).is_err());
    }

    #[test]
    fn test_build_page_url_keeps_other_pairs_verbatim() {
        assert_eq!(
            build_page_url("https://x/search?q=a%20b&name=x+y&page=3", "page", 4).unwrap(),
            "https://x/search?q=a%20b&name=x+y&page=4"
        );
        assert_eq!(
            build_page_url("https://x/search?city=%D0%9C%D0%BE%D1%81%D0%BA%D0%B2%D0%B0&pages=9", "page", 1).unwrap(),
            "https://x/search?city=%D0%9C%D0%BE%D1%81%D0%BA%D0%B2%D0%B0&pages=9&page=1"
        );
    }

    #[tokio::test]
    async fn test_single_page_source_makes_one_request() {
        let session = Arc::new(StaticSession::new());
        session.add_page("https://x/list?page=1", "<ul><li>a</li><li>b</li></ul>");

        let out = handler(session.clone())
            .scrape_all_pages(PaginationConfig {
                base_url: "https://x/list",
                page_param: "page",
                max_pages: None,
                extract: &items,
                has_next: &never,
            })
            .await
            .unwrap();

        assert_eq!(out, vec!["a", "b"]);
        assert_eq!(session.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_max_pages_caps_traversal() {
        let session = Arc::new(StaticSession::new());
        for p in 1..=5 {
            session.add_page(
                &format!("https://x/list?year=2025&page={}", p),
                &format!("<ul><li>p{}</li></ul>", p),
            );
        }

        let out = handler(session.clone())
            .scrape_all_pages(PaginationConfig {
                base_url: "https://x/list?year=2025",
                page_param: "page",
                max_pages: Some(2),
                extract: &items,
                has_next: &always,
            })
            .await
            .unwrap();

        assert_eq!(out, vec!["p1", "p2"]);
        assert_eq!(session.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_extract_error_propagates() {
        let session = Arc::new(StaticSession::new());
        session.add_page("https://x/list?page=1", "<ul></ul>");

        let failing = |_: &Html| -> Result<Vec<String>> {
            Err(ImportError::parse(EntityType::Player, "table missing"))
        };

        let err = handler(session)
            .scrape_all_pages(PaginationConfig {
                base_url: "https://x/list",
                page_param: "page",
                max_pages: None,
                extract: &failing,
                has_next: &always,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::Parse { .. }));
    }
}
