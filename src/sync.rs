//! Pipeline stages: roster reconciliation, link enrichment, video discovery
//! and downloading.
//!
//! Every stage absorbs collaborator failures (network, scraping, downloader)
//! by printing them, recording them in the error log and moving on to the
//! next item. Only store errors are returned to the caller.

use crate::db;
use crate::downloader::DownloadJob;
use crate::error::Result;
use crate::imvdb::VideoEntry;
use crate::lidarr::RemoteArtist;
use crate::report::{ErrorLog, Stage};
use async_trait::async_trait;
use colored::*;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The library manager's artist list.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_artists(&self) -> Result<Vec<RemoteArtist>>;
}

/// Looks up an artist's video-database page by external id.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn imvdb_link(&self, musicbrainz_id: &str) -> Result<Option<String>>;
}

/// The video database: an artist's videography and each video's stream link.
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    async fn videography(&self, artist_url: &str) -> Result<Vec<VideoEntry>>;
    async fn watch_link(&self, video_url: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, job: &DownloadJob) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Roster reconciliation
// ---------------------------------------------------------------------------

pub type RosterKey = (String, String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterChanges {
    pub added: Vec<RosterKey>,
    pub removed: Vec<RosterKey>,
    pub conflicts: Vec<RosterKey>,
    /// The remote list could not be fetched; nothing was touched.
    pub skipped: bool,
}

/// Set difference both ways on exact (name, id) pairs:
/// `(remote - stored, stored - remote)`.
pub fn diff_roster(
    remote: &BTreeSet<RosterKey>,
    stored: &BTreeSet<RosterKey>,
) -> (Vec<RosterKey>, Vec<RosterKey>) {
    let to_add = remote.difference(stored).cloned().collect();
    let to_remove = stored.difference(remote).cloned().collect();
    (to_add, to_remove)
}

pub async fn reconcile_roster(
    pool: &SqlitePool,
    source: &dyn RosterSource,
    log: &ErrorLog,
) -> Result<RosterChanges> {
    let remote_artists = match source.fetch_artists().await {
        Ok(artists) => artists,
        Err(e) => {
            println!("  {} Error fetching artist roster: {}", "✗".red(), e);
            println!("  {} Stored roster left unchanged", "↷".bright_black());
            log.record(Stage::Roster, format!("Error connecting to library manager: {}", e));
            return Ok(RosterChanges {
                skipped: true,
                ..Default::default()
            });
        }
    };

    let remote: BTreeSet<RosterKey> = remote_artists
        .into_iter()
        .map(|a| (a.name, a.foreign_artist_id))
        .collect();
    let stored: BTreeSet<RosterKey> = db::stored_roster(pool).await?.into_iter().collect();

    let (to_add, to_remove) = diff_roster(&remote, &stored);
    let mut changes = RosterChanges::default();

    // Deletes first: a rename frees the external id before it is re-inserted
    let mut tx = pool.begin().await?;
    for (name, mb_id) in to_remove {
        db::delete_artist(&mut *tx, &name, &mb_id).await?;
        changes.removed.push((name, mb_id));
    }
    for (name, mb_id) in to_add {
        if db::insert_artist(&mut *tx, &name, &mb_id).await? {
            changes.added.push((name, mb_id));
        } else {
            log.record(
                Stage::Roster,
                format!("Duplicate artist id {} for '{}' in roster, skipped", mb_id, name),
            );
            changes.conflicts.push((name, mb_id));
        }
    }
    tx.commit().await?;

    for (name, _) in &changes.removed {
        println!("  {} {}", "-".red(), name.bright_white());
    }
    for (name, _) in &changes.added {
        println!("  {} {}", "+".green(), name.bright_white());
    }
    for (name, mb_id) in &changes.conflicts {
        println!(
            "  {} {} ({}) - id already taken",
            "⚠".yellow(),
            name.yellow(),
            mb_id.bright_black()
        );
    }
    println!(
        "  {} Added {} new artist(s) to the database.",
        "✓".green(),
        changes.added.len()
    );
    println!(
        "  {} Removed {} artist(s) from the database.",
        "✓".green(),
        changes.removed.len()
    );

    Ok(changes)
}

// ---------------------------------------------------------------------------
// Cross-reference links
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub resolved: u32,
    pub not_found: u32,
    pub failed: u32,
}

/// Fill in the video-database link for every artist that lacks one. Misses
/// stay null and are retried next run.
pub async fn enrich_links(
    pool: &SqlitePool,
    resolver: &dyn LinkResolver,
    log: &ErrorLog,
) -> Result<LinkStats> {
    let artists = db::artists_missing_link(pool).await?;
    let mut stats = LinkStats::default();

    if artists.is_empty() {
        println!("  {} Every artist already has a link", "✓".green());
        return Ok(stats);
    }

    for artist in &artists {
        match resolver.imvdb_link(&artist.musicbrainz_id).await {
            Ok(Some(link)) => {
                db::set_artist_link(pool, artist.id, &link).await?;
                println!(
                    "  {} {}: {}",
                    "✓".green(),
                    artist.artist_name.bright_white(),
                    link.bright_black()
                );
                stats.resolved += 1;
            }
            Ok(None) => {
                println!(
                    "  {} No IMVDb link found for {} ({})",
                    "✗".yellow(),
                    artist.artist_name.bright_white(),
                    artist.musicbrainz_id.bright_black()
                );
                log.record(
                    Stage::Links,
                    format!(
                        "No IMVDb link for '{}' ({})",
                        artist.artist_name, artist.musicbrainz_id
                    ),
                );
                stats.not_found += 1;
            }
            Err(e) => {
                println!(
                    "  {} {}: {}",
                    "✗".red(),
                    artist.artist_name.bright_white(),
                    e.to_string().bright_red()
                );
                log.record(
                    Stage::Links,
                    format!(
                        "Error fetching IMVDb link for '{}' ({}): {}",
                        artist.artist_name, artist.musicbrainz_id, e
                    ),
                );
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

// ---------------------------------------------------------------------------
// Video discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub artists: u32,
    pub added: u32,
    pub updated: u32,
    pub rehomed: u32,
    pub unresolved: u32,
    pub failed_artists: u32,
}

/// Best-effort stream link: a lookup failure is logged and treated as "none
/// this run".
async fn resolve_watch_link(
    catalog: &dyn VideoCatalog,
    video_url: &str,
    log: &ErrorLog,
) -> Option<String> {
    match catalog.watch_link(video_url).await {
        Ok(link) => link,
        Err(e) => {
            log.record(
                Stage::Videos,
                format!("Error scraping stream link from {}: {}", video_url, e),
            );
            None
        }
    }
}

pub async fn discover_videos(
    pool: &SqlitePool,
    catalog: &dyn VideoCatalog,
    log: &ErrorLog,
    only: Option<&str>,
) -> Result<DiscoveryStats> {
    let artists = db::artists_with_link(pool, only).await?;
    let mut stats = DiscoveryStats::default();
    let total = artists.len();

    for (idx, artist) in artists.iter().enumerate() {
        let Some(ref link) = artist.imvdb_link else {
            continue;
        };
        stats.artists += 1;
        println!(
            "  {} {} {}",
            format!("[{}/{}]", idx + 1, total).bright_blue(),
            artist.artist_name.bright_cyan().bold(),
            link.bright_black()
        );

        let entries = match catalog.videography(link).await {
            Ok(entries) => entries,
            Err(e) => {
                println!("    {} {}", "✗".red(), e.to_string().bright_red());
                log.record(
                    Stage::Videos,
                    format!("Error scraping videography for '{}' from {}: {}", artist.artist_name, link, e),
                );
                stats.failed_artists += 1;
                continue;
            }
        };

        if entries.is_empty() {
            println!("    {} No video links found", "↷".bright_black());
            continue;
        }

        for entry in &entries {
            match db::find_video(pool, &entry.imvdb_url).await? {
                None => {
                    let youtube_url = resolve_watch_link(catalog, &entry.imvdb_url, log).await;
                    db::insert_video(
                        pool,
                        artist.id,
                        &entry.video_name,
                        &entry.imvdb_url,
                        youtube_url.as_deref(),
                    )
                    .await?;
                    stats.added += 1;
                    if youtube_url.is_none() {
                        stats.unresolved += 1;
                    }
                    println!(
                        "    {} Added '{}' ({})",
                        "+".green(),
                        entry.video_name.bright_white(),
                        youtube_url.as_deref().unwrap_or("N/A").bright_black()
                    );
                }
                Some(existing) => {
                    if !existing.owner_exists {
                        db::reassign_video(pool, existing.id, artist.id).await?;
                        stats.rehomed += 1;
                        println!(
                            "    {} Re-homed '{}' from a removed artist",
                            "→".bright_black(),
                            existing.video_name.bright_white()
                        );
                    }

                    if existing.youtube_url.is_some() && existing.downloaded {
                        continue;
                    }

                    match resolve_watch_link(catalog, &entry.imvdb_url, log).await {
                        Some(fresh) if existing.youtube_url.as_deref() != Some(fresh.as_str()) => {
                            db::set_video_link(pool, existing.id, &fresh).await?;
                            stats.updated += 1;
                            println!(
                                "    {} Updated '{}' to {}",
                                "✓".green(),
                                existing.video_name.bright_white(),
                                fresh.bright_black()
                            );
                        }
                        Some(_) => {}
                        None => {
                            if existing.youtube_url.is_none() {
                                stats.unresolved += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(stats)
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions<'a> {
    pub only: Option<&'a str>,
    /// 0 = no limit
    pub limit: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub attempted: u32,
    pub downloaded: u32,
    pub failed: u32,
    pub planned: u32,
}

pub async fn download_pending(
    pool: &SqlitePool,
    downloader: &dyn Downloader,
    download_dir: &Path,
    log: &ErrorLog,
    options: &DownloadOptions<'_>,
) -> Result<DownloadStats> {
    let mut pending = db::pending_downloads(pool, options.only).await?;
    let mut stats = DownloadStats::default();

    if pending.is_empty() {
        println!("  {} No videos to download.", "✓".green());
        return Ok(stats);
    }
    if options.limit > 0 && pending.len() > options.limit {
        println!(
            "  {} {} pending, limited to {}",
            "→".bright_black(),
            pending.len(),
            options.limit
        );
        pending.truncate(options.limit);
    }

    let total = pending.len();
    for (idx, video) in pending.iter().enumerate() {
        let job = DownloadJob::new(
            download_dir,
            &video.artist_name,
            &video.video_name,
            &video.youtube_url,
        );
        println!(
            "  {} {} by {} from {}",
            format!("[{}/{}]", idx + 1, total).bright_blue(),
            video.video_name.bright_white(),
            video.artist_name.bright_cyan(),
            video.youtube_url.bright_black()
        );

        if options.dry_run {
            println!("    {} {} (dry run)", "○".cyan(), job.output_template);
            stats.planned += 1;
            continue;
        }

        stats.attempted += 1;
        match downloader.download(&job).await {
            Ok(()) => {
                db::mark_downloaded(pool, video.video_id).await?;
                println!("    {} Marked as downloaded", "✓".green());
                stats.downloaded += 1;
            }
            Err(e) => {
                println!("    {} {}", "✗".red(), e.to_string().bright_red());
                log.record(
                    Stage::Download,
                    format!(
                        "Error downloading '{}' by '{}' from {}: {}",
                        video.video_name, video.artist_name, video.youtube_url, e
                    ),
                );
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
