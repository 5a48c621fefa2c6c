use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::LinkResolver;
use async_trait::async_trait;
use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

pub const IMVDB_DOMAIN: &str = "imvdb.com";

const USER_AGENT: &str = concat!(
    "mvsync/",
    env!("CARGO_PKG_VERSION"),
    " ( music video roster sync )"
);
const MAX_ATTEMPTS: u32 = 5;

// ---------------------------------------------------------------------------
// MusicBrainz API types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MbArtistDetail {
    #[serde(default)]
    pub relations: Vec<MbRelation>,
}

#[derive(Debug, Deserialize)]
pub struct MbRelation {
    pub url: Option<MbUrl>,
}

#[derive(Debug, Deserialize)]
pub struct MbUrl {
    #[serde(default)]
    pub resource: String,
}

/// First relation resource pointing at `domain`.
pub fn find_link(detail: &MbArtistDetail, domain: &str) -> Option<String> {
    detail
        .relations
        .iter()
        .filter_map(|rel| rel.url.as_ref())
        .map(|url| url.resource.as_str())
        .find(|resource| resource.contains(domain))
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Adaptive rate limiter
// ---------------------------------------------------------------------------

pub struct RateLimiter {
    delay_ms: u64,
    min_delay: u64,
    max_delay: u64,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            delay_ms: 1000,
            min_delay: 1000,
            max_delay: 10000,
            last_request: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed().as_millis() as u64;
            if elapsed < self.delay_ms {
                sleep(Duration::from_millis(self.delay_ms - elapsed)).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn on_success(&mut self) {
        if self.delay_ms > self.min_delay {
            self.delay_ms = (self.delay_ms * 95 / 100).max(self.min_delay);
        }
    }

    fn on_rate_limit(&mut self) {
        self.delay_ms = (self.delay_ms * 2).min(self.max_delay);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MusicBrainz API client
// ---------------------------------------------------------------------------

pub struct MusicBrainzClient {
    client: Client,
    base_url: String,
    limiter: Mutex<RateLimiter>,
}

impl MusicBrainzClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.musicbrainz_url.clone(),
            limiter: Mutex::new(RateLimiter::new()),
        }
    }

    /// GET with pacing. 503/429 back off and retry; anything else non-2xx
    /// fails straight away.
    async fn get(&self, url: &str) -> Result<String> {
        let mut limiter = self.limiter.lock().await;
        let mut wait_time = limiter.delay_ms;

        for attempt in 0..MAX_ATTEMPTS {
            limiter.wait().await;

            let resp = self
                .client
                .get(url)
                .header("User-Agent", USER_AGENT)
                .header("Accept", "application/json")
                .send()
                .await?;

            let status = resp.status().as_u16();

            if resp.status().is_success() {
                limiter.on_success();
                return Ok(resp.text().await?);
            }

            if (status == 503 || status == 429) && attempt < MAX_ATTEMPTS - 1 {
                limiter.on_rate_limit();
                wait_time = (wait_time * 2).min(60000);
                println!(
                    "    {} MusicBrainz busy - waiting {:.1}s before retry {}/{}",
                    "↷".bright_black(),
                    wait_time as f64 / 1000.0,
                    attempt + 1,
                    MAX_ATTEMPTS - 1
                );
                sleep(Duration::from_millis(wait_time)).await;
                continue;
            }

            return Err(Error::Status {
                status,
                url: url.to_string(),
            });
        }

        Err(Error::Status {
            status: 503,
            url: url.to_string(),
        })
    }

    pub async fn artist_detail(&self, mb_id: &str) -> Result<MbArtistDetail> {
        let url = format!(
            "{}/artist/{}?inc=url-rels&fmt=json",
            self.base_url,
            urlencoding::encode(mb_id)
        );
        let body = self.get(&url).await?;
        parse_artist_detail(&body)
    }
}

pub fn parse_artist_detail(body: &str) -> Result<MbArtistDetail> {
    serde_json::from_str(body).map_err(|e| Error::Parse(format!("MusicBrainz artist: {}", e)))
}

#[async_trait]
impl LinkResolver for MusicBrainzClient {
    async fn imvdb_link(&self, musicbrainz_id: &str) -> Result<Option<String>> {
        let detail = self.artist_detail(musicbrainz_id).await?;
        Ok(find_link(&detail, IMVDB_DOMAIN))
    }
}
