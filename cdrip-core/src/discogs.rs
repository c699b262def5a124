use reqwest::{Client, Error as ReqwestError, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DISCOGS_URL: &str = "https://api.discogs.com";
const USER_AGENT: &str = concat!("cdrip/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum DiscogsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),
    #[error("API rate limit exceeded")]
    RateLimit,
    #[error("Invalid API token")]
    InvalidToken,
    #[error("Release not found")]
    NotFound,
    #[error("Discogs API returned status {0}")]
    Status(StatusCode),
}

/// Discogs search response wrapper
#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<DiscogsSearchResult>,
}

/// Individual search result
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiscogsSearchResult {
    pub id: u64,
    pub title: String,
    #[serde(rename = "type")]
    pub result_type: String,
}

/// Detailed release response from Discogs
#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    year: Option<u32>,
    genres: Option<Vec<String>>,
    styles: Option<Vec<String>>,
    images: Option<Vec<Image>>,
}

#[derive(Debug, Deserialize)]
struct Image {
    uri: String,
}

/// The bits of a Discogs release worth adding to a rip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscogsInfo {
    pub genre: Option<String>,
    pub style: Option<String>,
    pub year: Option<u32>,
    pub cover_url: Option<String>,
}

impl From<ReleaseResponse> for DiscogsInfo {
    fn from(release: ReleaseResponse) -> Self {
        Self {
            genre: release.genres.and_then(|g| g.into_iter().next()),
            style: release.styles.and_then(|s| s.into_iter().next()),
            // Discogs reports 0 for unknown years
            year: release.year.filter(|y| *y > 0),
            cover_url: release
                .images
                .and_then(|images| images.into_iter().next())
                .map(|img| img.uri),
        }
    }
}

#[derive(Clone)]
pub struct DiscogsClient {
    client: Client,
    token: String,
    base_url: String,
}

impl DiscogsClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DISCOGS_URL)
    }

    pub fn with_base_url(token: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn check_status(status: StatusCode) -> Result<(), DiscogsError> {
        if status.is_success() {
            return Ok(());
        }
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("✗ Discogs rate limit exceeded");
                DiscogsError::RateLimit
            }
            StatusCode::UNAUTHORIZED => {
                warn!("✗ Discogs invalid API token");
                DiscogsError::InvalidToken
            }
            StatusCode::NOT_FOUND => DiscogsError::NotFound,
            status => {
                warn!("✗ Discogs API error: {}", status);
                DiscogsError::Status(status)
            }
        })
    }

    /// Free-text release search
    pub async fn search(&self, query: &str) -> Result<Vec<DiscogsSearchResult>, DiscogsError> {
        let url = format!("{}/database/search", self.base_url);
        info!("📡 Discogs API: GET {} q='{}'", url, query);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("type", "release"), ("token", self.token.as_str())])
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        let status = response.status();
        debug!("Response status: {}", status);
        Self::check_status(status)?;
        let search_response: SearchResponse = response.json().await?;
        let releases: Vec<_> = search_response
            .results
            .into_iter()
            .filter(|r| r.result_type == "release")
            .collect();
        info!("✓ Discogs search returned {} release(s)", releases.len());
        Ok(releases)
    }

    pub async fn get_release(&self, id: u64) -> Result<DiscogsInfo, DiscogsError> {
        let url = format!("{}/releases/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        Self::check_status(response.status())?;
        let release: ReleaseResponse = response.json().await?;
        Ok(release.into())
    }

    /// Genre, style, year and cover of the best matching release.
    ///
    /// Falls back to the artist plus the first word of the album when the
    /// full title finds nothing.
    pub async fn lookup(
        &self,
        artist: &str,
        album: &str,
    ) -> Result<Option<DiscogsInfo>, DiscogsError> {
        let mut results = self.search(&format!("{} {}", artist, album)).await?;
        if results.is_empty() {
            if let Some(first_word) = album.split_whitespace().next() {
                debug!("Discogs: retrying with '{} {}'", artist, first_word);
                results = self.search(&format!("{} {}", artist, first_word)).await?;
            }
        }
        match results.first() {
            Some(best) => {
                info!("Discogs: using release {} ({})", best.id, best.title);
                Ok(Some(self.get_release(best.id).await?))
            }
            None => Ok(None),
        }
    }
}
