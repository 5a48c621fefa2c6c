use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_LIDARR_URL: &str = "http://127.0.0.1:8686/api/v1";
pub const DEFAULT_MUSICBRAINZ_URL: &str = "https://musicbrainz.org/ws/2";
pub const DEFAULT_IMVDB_URL: &str = "https://imvdb.com";
pub const DEFAULT_DATABASE_PATH: &str = "musicvideo.db";
pub const DEFAULT_DOWNLOAD_DIR: &str = "~/Music Videos";
pub const DEFAULT_COOKIES_FILE: &str = "~/youtube.com_cookies.txt";
pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
pub const DEFAULT_PLAYER_CLIENT: &str = "mweb";
pub const DEFAULT_MERGE_FORMAT: &str = "mp4";
pub const DEFAULT_ERROR_LOG: &str = "errors.log";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Everything a run needs, built once and handed to each stage.
#[derive(Debug, Clone)]
pub struct Config {
    pub lidarr_url: String,
    pub lidarr_api_key: String,
    pub musicbrainz_url: String,
    pub imvdb_url: String,
    pub database_path: PathBuf,
    pub download_dir: PathBuf,
    pub cookies_file: Option<PathBuf>,
    pub ytdlp_path: PathBuf,
    pub player_client: String,
    pub merge_format: String,
    pub error_log: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    /// Build a config from a key lookup. `load_config` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME");
        let get = |key: &str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| default.to_string())
        };
        let path = |key: &str, default: &str| -> PathBuf {
            expand_home(&get(key, default), home.as_deref())
        };

        let lidarr_api_key = lookup("LIDARR_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("LIDARR_API_KEY not set".to_string()))?;

        let cookies_file = {
            let raw = get("COOKIES_FILE", DEFAULT_COOKIES_FILE);
            if raw.trim().is_empty() {
                None
            } else {
                Some(expand_home(&raw, home.as_deref()))
            }
        };

        let timeout_raw = get("HTTP_TIMEOUT_SECS", &DEFAULT_HTTP_TIMEOUT_SECS.to_string());
        let timeout_secs: u64 = timeout_raw.trim().parse().map_err(|_| {
            Error::Config(format!("HTTP_TIMEOUT_SECS is not a number: {}", timeout_raw))
        })?;

        Ok(Config {
            lidarr_url: get("LIDARR_URL", DEFAULT_LIDARR_URL)
                .trim_end_matches('/')
                .to_string(),
            lidarr_api_key,
            musicbrainz_url: get("MUSICBRAINZ_URL", DEFAULT_MUSICBRAINZ_URL)
                .trim_end_matches('/')
                .to_string(),
            imvdb_url: get("IMVDB_URL", DEFAULT_IMVDB_URL)
                .trim_end_matches('/')
                .to_string(),
            database_path: path("DATABASE_PATH", DEFAULT_DATABASE_PATH),
            download_dir: path("DOWNLOAD_DIR", DEFAULT_DOWNLOAD_DIR),
            cookies_file,
            ytdlp_path: path("YTDLP_PATH", DEFAULT_YTDLP_PATH),
            player_client: get("YTDLP_PLAYER_CLIENT", DEFAULT_PLAYER_CLIENT),
            merge_format: get("MERGE_FORMAT", DEFAULT_MERGE_FORMAT),
            error_log: path("ERROR_LOG", DEFAULT_ERROR_LOG),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// `.env` locations in lookup order: the working directory, then
/// `$MVSYNC_HOME`.
pub fn env_paths(mvsync_home: Option<&str>) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".env")];
    if let Some(home) = mvsync_home {
        paths.push(PathBuf::from(home).join(".env"));
    }
    paths
}

/// Load the first `.env` found and build the config from the process
/// environment.
pub fn load_config() -> Result<Config> {
    let mvsync_home = std::env::var("MVSYNC_HOME").ok();
    for p in env_paths(mvsync_home.as_deref()) {
        if p.exists() {
            dotenvy::from_path(&p).ok();
            break;
        }
    }

    Config::from_lookup(|key| std::env::var(key).ok())
}

/// Expand a leading `~/` (or a bare `~`) against the home directory.
pub fn expand_home(raw: &str, home: Option<&str>) -> PathBuf {
    match (raw, home) {
        ("~", Some(h)) => PathBuf::from(h),
        (r, Some(h)) if r.starts_with("~/") => Path::new(h).join(&r[2..]),
        (r, _) => PathBuf::from(r),
    }
}
