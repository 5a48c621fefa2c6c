use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::RosterSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Lidarr API types
// ---------------------------------------------------------------------------

/// One artist as reported by the library manager. Everything else in the
/// payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteArtist {
    #[serde(rename = "artistName")]
    pub name: String,
    #[serde(rename = "foreignArtistId")]
    pub foreign_artist_id: String,
}

// ---------------------------------------------------------------------------
// Lidarr API client
// ---------------------------------------------------------------------------

pub struct LidarrClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl LidarrClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.lidarr_url.clone(),
            api_key: config.lidarr_api_key.clone(),
        }
    }
}

#[async_trait]
impl RosterSource for LidarrClient {
    async fn fetch_artists(&self) -> Result<Vec<RemoteArtist>> {
        let url = format!("{}/artist", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = resp.text().await?;
        parse_artists(&body)
    }
}

pub fn parse_artists(body: &str) -> Result<Vec<RemoteArtist>> {
    serde_json::from_str(body).map_err(|e| Error::Parse(format!("Lidarr artist list: {}", e)))
}
