//! HTTP client for the upstream match API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ApiError, Result};
use crate::models::{MatchDetail, ReplayList};
use crate::region::Region;

/// Header carrying the API key on every request (`X-Riot-Token`).
pub const API_KEY_HEADER: &str = "x-riot-token";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The upstream calls the sync orchestrator depends on.
#[async_trait]
pub trait MatchApi: Send + Sync {
    /// Replay download URLs for the player's recent matches, in upstream
    /// order.
    async fn fetch_replay_urls(&self, puuid: &str, region: Region) -> Result<Vec<String>>;

    /// Full detail for one match, keyed by its alphanumeric identifier
    /// (e.g. `EUW1_7000000001`).
    async fn fetch_match_detail(&self, full_match_id: &str, region: Region)
        -> Result<MatchDetail>;
}

/// Reqwest-backed [`MatchApi`].
#[derive(Debug, Clone)]
pub struct RiotClient {
    http: Client,
    base_url: Option<String>,
}

impl RiotClient {
    /// Build a client that sends `api_key` with every request and gives up on
    /// any call after `timeout`.
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ApiError::MissingApiKey);
        }

        let mut key = HeaderValue::from_str(api_key).map_err(|_| ApiError::InvalidApiKey)?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: None,
        })
    }

    /// Send every request to `base_url` instead of the regional host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn endpoint(&self, region: Region, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}{path}", base.trim_end_matches('/')),
            None => format!("https://{}.api.riotgames.com{path}", region.route()),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, url, "upstream request failed");
            return Err(ApiError::Status {
                status,
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        debug!(url, bytes = body.len(), "upstream response");
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl MatchApi for RiotClient {
    async fn fetch_replay_urls(&self, puuid: &str, region: Region) -> Result<Vec<String>> {
        let url = self.endpoint(
            region,
            &format!("/lol/match/v5/matches/by-puuid/{puuid}/replays"),
        );
        let list: ReplayList = self.get_json(&url).await?;
        Ok(list.urls)
    }

    async fn fetch_match_detail(
        &self,
        full_match_id: &str,
        region: Region,
    ) -> Result<MatchDetail> {
        let url = self.endpoint(region, &format!("/lol/match/v5/matches/{full_match_id}"));
        self.get_json(&url).await
    }
}
