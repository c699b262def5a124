//! Last.fm album tags, used as a genre hint when CDDB has none
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

pub const LASTFM_URL: &str = "http://ws.audioscrobbler.com/2.0/";
const MAX_TAGS: usize = 3;

#[derive(Error, Debug)]
pub enum LastFmError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Last.fm error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("Unexpected Last.fm response: {0}")]
    Malformed(String),
}

#[derive(Clone)]
pub struct LastFmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LastFmClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, LASTFM_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.to_string(),
        }
    }

    /// Top tag names of an album, at most three
    pub async fn album_tags(&self, artist: &str, album: &str) -> Result<Vec<String>, LastFmError> {
        info!("Last.fm: album.getinfo {} - {}", artist, album);
        let json: serde_json::Value = self
            .client
            .get(&self.base_url)
            .query(&[
                ("method", "album.getinfo"),
                ("api_key", self.api_key.as_str()),
                ("artist", artist),
                ("album", album),
                ("format", "json"),
            ])
            .send()
            .await?
            .json()
            .await?;
        debug!("Last.fm response: {}", json);
        parse_album_tags(&json)
    }
}

pub fn parse_album_tags(json: &serde_json::Value) -> Result<Vec<String>, LastFmError> {
    if let Some(code) = json.get("error") {
        return Err(LastFmError::Api {
            code: code.as_i64().unwrap_or_default(),
            message: json
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    let album = json
        .get("album")
        .ok_or_else(|| LastFmError::Malformed("missing album".to_string()))?;
    // A single tag comes back as an object, no tags as an empty string
    let tags = match album.get("tags").and_then(|t| t.get("tag")) {
        Some(serde_json::Value::Array(tags)) => tags.iter().collect::<Vec<_>>(),
        Some(tag @ serde_json::Value::Object(_)) => vec![tag],
        _ => Vec::new(),
    };
    Ok(tags
        .into_iter()
        .filter_map(|t| t.get("name").and_then(|n| n.as_str()))
        .take(MAX_TAGS)
        .map(str::to_string)
        .collect())
}
