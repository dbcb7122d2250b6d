//! HTTP session for one site.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::IndexerError;
use crate::config::IndexerConfig;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Timeout for the unauthenticated reachability probe.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Authenticated client for searches plus a bare client for health probes.
#[derive(Debug, Clone)]
pub struct SiteClient {
    client: Client,
    probe: Client,
}

impl SiteClient {
    pub fn new(config: &IndexerConfig) -> Result<Self, IndexerError> {
        let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|_| IndexerError::InvalidConfig(format!("{}: invalid user_agent", config.name)))?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, user_agent.clone());

        if !config.is_public {
            if let Some(cookie) = config.cookie.as_deref().filter(|c| !c.trim().is_empty()) {
                let mut value = HeaderValue::from_str(cookie.trim()).map_err(|_| {
                    IndexerError::InvalidConfig(format!("{}: cookie is not a valid header", config.name))
                })?;
                value.set_sensitive(true);
                headers.insert(COOKIE, value);
            }
            if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", key.trim())).map_err(|_| {
                    IndexerError::InvalidConfig(format!("{}: api_key is not a valid header", config.name))
                })?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| IndexerError::InvalidConfig(e.to_string()))?;

        let mut probe_headers = HeaderMap::new();
        probe_headers.insert(USER_AGENT, user_agent);
        let probe = Client::builder()
            .default_headers(probe_headers)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .build()
            .map_err(|e| IndexerError::InvalidConfig(e.to_string()))?;

        Ok(Self { client, probe })
    }

    /// Fetch a page; any non-2xx status is an error.
    pub async fn get_text(&self, url: &str) -> Result<String, IndexerError> {
        debug!(url = %url, "Fetching search page");
        let response = self.client.get(url).send().await.map_err(map_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(IndexerError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response.text().await.map_err(map_reqwest)
    }

    /// Unauthenticated GET; succeeds only on 200.
    pub async fn probe(&self, url: &str) -> Result<(), IndexerError> {
        let response = self.probe.get(url).send().await.map_err(map_reqwest)?;
        let status = response.status();
        if status == reqwest::StatusCode::OK {
            Ok(())
        } else {
            Err(IndexerError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}

fn map_reqwest(e: reqwest::Error) -> IndexerError {
    if e.is_timeout() {
        IndexerError::Timeout
    } else {
        IndexerError::Http(e.without_url().to_string())
    }
}
