//! Page sessions: the single shared handle through which every page of a run
//! is loaded.
//!
//! Phases and scrapers only see [`PageSession`], so the loading strategy
//! (plain HTTP today) can change without touching them.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{ImportError, Result};
use crate::service::http::{create_client, ClientType};

#[async_trait]
pub trait PageSession: Send + Sync {
    /// Load `url` and return the rendered HTML.
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Release the session. Further fetches fail with `SessionLost`.
    async fn close(&self) {}
}

/// HTTP-backed session over one cookie-keeping client.
pub struct HttpSession {
    client: rquest::Client,
    closed: AtomicBool,
}

impl HttpSession {
    pub fn new(client_type: ClientType, timeout: Duration) -> Result<Self> {
        let client = create_client(client_type, timeout).map_err(ImportError::Other)?;
        Ok(Self {
            client,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn fetch(&self, url: &str) -> Result<String> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(ImportError::SessionLost("session already closed".into()));
        }

        tracing::trace!(url, "[SESSION] GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            404 => return Err(ImportError::NotFound(url.to_string())),
            401 | 403 => {
                tracing::error!(url, status, "[SESSION] Source refused the session");
                return Err(ImportError::SessionLost(format!(
                    "HTTP {} for {}",
                    status, url
                )));
            }
            _ => {
                return Err(ImportError::HttpStatus {
                    status,
                    url: url.to_string(),
                })
            }
        }

        response
            .text()
            .await
            .map_err(|e| classify_request_error(url, e))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::Relaxed) {
            tracing::debug!("[SESSION] Closed");
        }
    }
}

fn classify_request_error(url: &str, error: rquest::Error) -> ImportError {
    if error.is_timeout() {
        ImportError::Timeout(format!("{}: {}", url, error))
    } else {
        ImportError::Network(format!("{}: {}", url, error))
    }
}
