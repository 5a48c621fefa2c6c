use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::Downloader;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

const FORMAT: &str = "bestvideo+bestaudio/best";

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Swap path separators for look-alike characters so a name stays a single
/// path component.
pub fn sanitize_component(name: &str) -> String {
    name.replace('/', "\u{29F8}").replace('\\', "\u{29F9}")
}

/// `%` is the downloader's placeholder sigil.
fn escape_template(text: &str) -> String {
    text.replace('%', "%%")
}

/// Everything needed to fetch one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub artist_dir: PathBuf,
    pub output_template: String,
    pub url: String,
}

impl DownloadJob {
    pub fn new(download_dir: &Path, artist_name: &str, video_name: &str, url: &str) -> Self {
        let artist = sanitize_component(artist_name);
        let video = sanitize_component(video_name);

        let artist_dir = download_dir.join(&artist);
        let template_dir = PathBuf::from(escape_template(&download_dir.to_string_lossy()))
            .join(escape_template(&artist));
        let output_template = template_dir
            .join(format!(
                "{} [%(title)s - %(id)s].%(ext)s",
                escape_template(&video)
            ))
            .to_string_lossy()
            .into_owned();

        Self {
            artist_dir,
            output_template,
            url: url.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// yt-dlp
// ---------------------------------------------------------------------------

pub struct YtDlp {
    binary: PathBuf,
    cookies_file: Option<PathBuf>,
    player_client: String,
    merge_format: String,
}

impl YtDlp {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.ytdlp_path.clone(),
            cookies_file: config.cookies_file.clone(),
            player_client: config.player_client.clone(),
            merge_format: config.merge_format.clone(),
        }
    }

    pub fn args(&self, job: &DownloadJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            FORMAT.into(),
            "--abort-on-unavailable-fragment".into(),
            "--extractor-args".into(),
            format!("youtube:player_client={}", self.player_client).into(),
        ];
        if let Some(ref cookies) = self.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.clone().into_os_string());
        }
        args.push("--merge-output-format".into());
        args.push(self.merge_format.clone().into());
        args.push("-o".into());
        args.push(job.output_template.clone().into());
        args.push(job.url.clone().into());
        args
    }
}

#[async_trait]
impl Downloader for YtDlp {
    async fn download(&self, job: &DownloadJob) -> Result<()> {
        tokio::fs::create_dir_all(&job.artist_dir).await?;

        let status = Command::new(&self.binary)
            .args(self.args(job))
            .status()
            .await
            .map_err(|e| {
                Error::Downloader(format!("could not run {}: {}", self.binary.display(), e))
            })?;

        if !status.success() {
            return Err(Error::Downloader(format!(
                "{} exited with {}",
                self.binary.display(),
                status
            )));
        }
        Ok(())
    }
}
