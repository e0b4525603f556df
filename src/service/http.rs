use anyhow::{Context, Result};
use rquest::Client;
use rquest_util::Emulation;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    /// Plain client, used against local test servers.
    Standard,
    /// Browser-impersonating client for the live source.
    HeavyEmulation,
}

/// Build the HTTP client backing a page session.
///
/// Cookies are kept for the life of the client so the source sees one
/// continuous browsing session.
pub fn create_client(client_type: ClientType, timeout: Duration) -> Result<Client> {
    let builder = Client::builder().timeout(timeout).cookie_store(true);

    match client_type {
        ClientType::HeavyEmulation => builder
            .emulation(Emulation::Firefox136)
            .build()
            .context("Failed to build heavy impersonated rquest client"),
        ClientType::Standard => builder
            .build()
            .context("Failed to build standard rquest client"),
    }
}
