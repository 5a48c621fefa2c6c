use thiserror::Error;

/// Errors raised anywhere in the sync pipeline.
///
/// Collaborator failures (HTTP, parsing, downloader) are absorbed by the
/// stages that call them; only `Config` and `Database` end a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Downloader failed: {0}")]
    Downloader(String),
}

pub type Result<T> = std::result::Result<T, Error>;
