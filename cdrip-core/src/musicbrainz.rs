use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const MUSICBRAINZ_URL: &str = "https://musicbrainz.org/ws/2";

/// Rate limiter ensuring at least 1 second between MusicBrainz API requests.
fn rate_limiter() -> &'static Mutex<Instant> {
    static LIMITER: OnceLock<Mutex<Instant>> = OnceLock::new();
    LIMITER.get_or_init(|| Mutex::new(Instant::now() - Duration::from_secs(1)))
}

async fn wait_for_rate_limit() {
    let mut last_request = rate_limiter().lock().await;
    let elapsed = last_request.elapsed();
    if elapsed < Duration::from_secs(1) {
        tokio::time::sleep(Duration::from_secs(1) - elapsed).await;
    }
    *last_request = Instant::now();
}

#[derive(Debug, Clone, PartialEq)]
pub struct MbTrack {
    /// Medium position, 1-based
    pub disc: u32,
    pub number: u32,
    pub title: String,
}

/// MusicBrainz release information
#[derive(Debug, Clone, PartialEq)]
pub struct MbRelease {
    pub id: String,
    pub title: String,
    /// Full artist credit, join phrases included
    pub artist: String,
    pub artist_id: Option<String>,
    pub date: Option<String>,
    pub tracks: Vec<MbTrack>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MbTag {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Error)]
pub enum MusicBrainzError {
    #[error("MusicBrainz API error: {0}")]
    Api(String),
    #[error("Not found in MusicBrainz: {0}")]
    NotFound(String),
}

#[derive(Clone)]
pub struct MusicBrainzClient {
    client: reqwest::Client,
    base_url: String,
}

impl MusicBrainzClient {
    /// `contact` goes into the user agent, as MusicBrainz asks of API clients
    pub fn new(contact: &str) -> Result<Self, MusicBrainzError> {
        Self::with_base_url(MUSICBRAINZ_URL, contact)
    }

    pub fn with_base_url(base_url: &str, contact: &str) -> Result<Self, MusicBrainzError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent(contact))
            .build()
            .map_err(|e| MusicBrainzError::Api(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(
        &self,
        path: &str,
        inc: &str,
        not_found: &str,
    ) -> Result<serde_json::Value, MusicBrainzError> {
        // `inc` stays unencoded: MusicBrainz splits it on literal `+`
        let url = format!("{}/{}?inc={}&fmt=json", self.base_url, path, inc);
        debug!("MusicBrainz API request: {}", url);

        wait_for_rate_limit().await;

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| MusicBrainzError::Api(format!("HTTP request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(
                "MusicBrainz API error response ({}): {}",
                status, error_text
            );
            if status == 404 {
                return Err(MusicBrainzError::NotFound(not_found.to_string()));
            }
            return Err(MusicBrainzError::Api(format!(
                "MusicBrainz API returned status {}: {}",
                status, error_text
            )));
        }
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MusicBrainzError::Api(format!("Failed to parse JSON: {}", e)))?;
        debug!("MusicBrainz response: {:#}", json);
        Ok(json)
    }

    /// Lookup releases by MusicBrainz disc id.
    ///
    /// An unknown disc and a CD stub both give an empty list.
    pub async fn lookup_by_discid(&self, discid: &str) -> Result<Vec<MbRelease>, MusicBrainzError> {
        info!("🎵 MusicBrainz: Looking up DiscID '{}'", discid);
        let json = match self
            .get_json(&format!("discid/{}", discid), "artists+recordings", discid)
            .await
        {
            Ok(json) => json,
            Err(MusicBrainzError::NotFound(_)) => {
                info!("MusicBrainz: no disc {}", discid);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let releases = parse_discid_response(&json);
        info!("🎵 MusicBrainz: {} release(s) for {}", releases.len(), discid);
        Ok(releases)
    }

    /// Artist tags, most used first
    pub async fn artist_tags(&self, artist_id: &str) -> Result<Vec<MbTag>, MusicBrainzError> {
        let json = self
            .get_json(&format!("artist/{}", artist_id), "tags", artist_id)
            .await?;
        Ok(parse_artist_tags(&json))
    }
}

fn user_agent(contact: &str) -> String {
    format!("cdrip/{} ( {} )", env!("CARGO_PKG_VERSION"), contact)
}

/// Releases from a `discid/<id>` response; stubs carry none
pub fn parse_discid_response(json: &serde_json::Value) -> Vec<MbRelease> {
    let Some(releases) = json.get("releases").and_then(|r| r.as_array()) else {
        if json.get("tracks").is_some() || json.get("track-count").is_some() {
            info!(
                "Found a CD stub (unverified entry): {} - {}",
                json.get("artist").and_then(|v| v.as_str()).unwrap_or(""),
                json.get("title").and_then(|v| v.as_str()).unwrap_or(""),
            );
        }
        return Vec::new();
    };
    releases.iter().filter_map(parse_release).collect()
}

fn parse_release(release_json: &serde_json::Value) -> Option<MbRelease> {
    let id = release_json.get("id").and_then(|v| v.as_str())?;
    let title = release_json.get("title").and_then(|v| v.as_str())?;
    let credits = release_json
        .get("artist-credit")
        .and_then(|ac| ac.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let artist = artist_credit_phrase(credits);
    let artist_id = credits
        .first()
        .and_then(|credit| credit.get("artist"))
        .and_then(|a| a.get("id"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let date = release_json
        .get("date")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let mut tracks = Vec::new();
    for medium in release_json
        .get("media")
        .and_then(|m| m.as_array())
        .into_iter()
        .flatten()
    {
        let disc = medium.get("position").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
        for track in medium
            .get("tracks")
            .and_then(|t| t.as_array())
            .into_iter()
            .flatten()
        {
            let number = track.get("position").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let title = track
                .get("recording")
                .and_then(|r| r.get("title"))
                .or_else(|| track.get("title"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            tracks.push(MbTrack {
                disc,
                number,
                title,
            });
        }
    }

    Some(MbRelease {
        id: id.to_string(),
        title: title.to_string(),
        artist,
        artist_id,
        date,
        tracks,
    })
}

/// Credited names joined with their join phrases (`A feat. B`)
fn artist_credit_phrase(credits: &[serde_json::Value]) -> String {
    let phrase: String = credits
        .iter()
        .map(|credit| {
            let name = credit
                .get("name")
                .or_else(|| credit.get("artist").and_then(|a| a.get("name")))
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let join = credit
                .get("joinphrase")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            format!("{}{}", name, join)
        })
        .collect();
    if phrase.trim().is_empty() {
        "Unknown Artist".to_string()
    } else {
        phrase
    }
}

pub fn parse_artist_tags(json: &serde_json::Value) -> Vec<MbTag> {
    let mut tags: Vec<MbTag> = json
        .get("tags")
        .and_then(|t| t.as_array())
        .into_iter()
        .flatten()
        .filter_map(|tag| {
            Some(MbTag {
                name: tag.get("name")?.as_str()?.to_string(),
                count: tag.get("count").and_then(|c| c.as_i64()).unwrap_or(0),
            })
        })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count));
    tags
}
