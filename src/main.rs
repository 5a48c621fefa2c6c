use clap::Parser;
use colored::*;
use mvsync::cleanup;
use mvsync::config::load_config;
use mvsync::db::{self, Totals};
use mvsync::downloader::YtDlp;
use mvsync::imvdb::ImvdbClient;
use mvsync::lidarr::LidarrClient;
use mvsync::musicbrainz::MusicBrainzClient;
use mvsync::report::ErrorLog;
use mvsync::sync::{self, DownloadOptions};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Instant;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "mvsync", about = "Sync music videos for every artist in Lidarr")]
struct Args {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Download root (overrides DOWNLOAD_DIR)
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Only scan and download artists starting with this prefix (case insensitive)
    #[arg(long)]
    only: Option<String>,

    /// Download at most N videos this run
    #[arg(long, default_value = "0")]
    limit: usize,

    /// Show planned downloads and folder removals without doing them
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    skip_roster: bool,

    #[arg(long)]
    skip_links: bool,

    #[arg(long)]
    skip_discovery: bool,

    #[arg(long)]
    skip_download: bool,

    #[arg(long)]
    skip_cleanup: bool,

    /// Print library totals and exit
    #[arg(long)]
    status: bool,
}

fn stage_header(n: usize, title: &str) {
    println!();
    println!("{} {}", format!("[{}/5]", n).bright_blue().bold(), title.white().bold());
}

fn print_totals(totals: &Totals) {
    println!("{}", "Library:".white().bold());
    println!("  {} {}", "Artists:".white(), totals.artists);
    println!("  {} {}", "With IMVDb link:".white(), totals.artists_linked);
    println!("  {} {}", "Videos:".white(), totals.videos);
    println!("  {} {}", "With YouTube link:".white(), totals.videos_resolved);
    println!("  {} {}", "Downloaded:".green(), totals.videos_downloaded);
    println!("  {} {}", "Pending:".yellow(), totals.videos_pending);
    if totals.videos_orphaned > 0 {
        println!("  {} {}", "Orphaned:".bright_black(), totals.videos_orphaned);
    }
}

/// A store error mid-run leaves nothing sensible to do.
fn fatal(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("{} {}: {}", "✗".red().bold(), context, e);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    println!("Music Video Sync");
    println!("================");

    let mut config = match load_config() {
        Ok(c) => c,
        Err(e) => fatal("Configuration", e),
    };
    if let Some(db) = args.db {
        config.database_path = db;
    }
    if let Some(dir) = args.download_dir {
        config.download_dir = dir;
    }

    println!("Database  : {}", config.database_path.display());
    println!("Videos    : {}", config.download_dir.display());
    if let Some(ref prefix) = args.only {
        println!("Only      : {}", prefix);
    }
    if args.dry_run {
        println!("Mode      : dry run");
    }

    let pool = match db::connect(&config.database_path).await {
        Ok(p) => p,
        Err(e) => fatal("Failed to open database", e),
    };
    if let Err(e) = db::init_schema(&pool).await {
        fatal("Failed to initialize database", e);
    }

    if args.status {
        println!();
        match db::totals(&pool).await {
            Ok(totals) => print_totals(&totals),
            Err(e) => fatal("Failed to read totals", e),
        }
        return;
    }

    match config.cookies_file {
        Some(ref cookies) if !cookies.exists() => println!(
            "{} Cookie file not found: {}",
            "⚠".yellow(),
            cookies.display()
        ),
        _ => {}
    }

    let error_log = match ErrorLog::open(&config.error_log) {
        Ok(log) => log,
        Err(e) => {
            println!(
                "{} Cannot open {} ({}), failures will only be printed",
                "⚠".yellow(),
                config.error_log.display(),
                e
            );
            ErrorLog::disabled()
        }
    };

    let client = match Client::builder().timeout(config.http_timeout).build() {
        Ok(c) => c,
        Err(e) => fatal("Failed to create HTTP client", e),
    };

    let start = Instant::now();
    let only = args.only.as_deref();

    // -- [1/5] roster --------------------------------------------------------
    stage_header(1, "Artist roster");
    let roster = if args.skip_roster {
        println!("  {} Skipped", "↷".bright_black());
        None
    } else {
        let lidarr = LidarrClient::new(client.clone(), &config);
        match sync::reconcile_roster(&pool, &lidarr, &error_log).await {
            Ok(changes) => Some(changes),
            Err(e) => fatal("Database error during roster sync", e),
        }
    };

    // -- [2/5] links ---------------------------------------------------------
    stage_header(2, "IMVDb links");
    let links = if args.skip_links {
        println!("  {} Skipped", "↷".bright_black());
        None
    } else {
        let musicbrainz = MusicBrainzClient::new(client.clone(), &config);
        match sync::enrich_links(&pool, &musicbrainz, &error_log).await {
            Ok(stats) => Some(stats),
            Err(e) => fatal("Database error while linking artists", e),
        }
    };

    // -- [3/5] discovery -----------------------------------------------------
    stage_header(3, "Video discovery");
    let discovery = if args.skip_discovery {
        println!("  {} Skipped", "↷".bright_black());
        None
    } else {
        let imvdb = ImvdbClient::new(client.clone(), &config);
        match sync::discover_videos(&pool, &imvdb, &error_log, only).await {
            Ok(stats) => Some(stats),
            Err(e) => fatal("Database error during video discovery", e),
        }
    };

    // -- [4/5] downloads -----------------------------------------------------
    stage_header(4, "Downloads");
    let downloads = if args.skip_download {
        println!("  {} Skipped", "↷".bright_black());
        None
    } else {
        let ytdlp = YtDlp::new(&config);
        let options = DownloadOptions {
            only,
            limit: args.limit,
            dry_run: args.dry_run,
        };
        match sync::download_pending(&pool, &ytdlp, &config.download_dir, &error_log, &options)
            .await
        {
            Ok(stats) => Some(stats),
            Err(e) => fatal("Database error during downloads", e),
        }
    };

    // -- [5/5] cleanup -------------------------------------------------------
    stage_header(5, "Cleanup");
    let cleaned = if args.skip_cleanup {
        println!("  {} Skipped", "↷".bright_black());
        None
    } else {
        let stats = cleanup::remove_empty_dirs(&config.download_dir, args.dry_run, &error_log);
        if stats.removed.is_empty() && stats.failed == 0 {
            println!("  {} No empty folders", "✓".green());
        }
        Some(stats)
    };

    // -- summary -------------------------------------------------------------
    let elapsed = start.elapsed();
    println!();
    println!("{}", "═".repeat(60).bright_black());
    println!();
    println!("{} {:.1}s", "Completed in:".white().bold(), elapsed.as_secs_f64());

    if let Some(r) = roster {
        if r.skipped {
            println!("  {} skipped (library manager unreachable)", "Roster:".yellow());
        } else {
            println!(
                "  {} +{} / -{}",
                "Roster:".green(),
                r.added.len(),
                r.removed.len()
            );
            if !r.conflicts.is_empty() {
                println!("  {} {}", "Roster conflicts:".yellow(), r.conflicts.len());
            }
        }
    }
    if let Some(l) = links {
        println!(
            "  {} {} resolved, {} not found, {} failed",
            "Links:".green(),
            l.resolved,
            l.not_found,
            l.failed
        );
    }
    if let Some(d) = discovery {
        println!(
            "  {} {} artist(s), {} added, {} updated, {} re-homed",
            "Videos:".green(),
            d.artists,
            d.added,
            d.updated,
            d.rehomed
        );
        if d.unresolved > 0 {
            println!("  {} {} without a YouTube link", "Unresolved:".yellow(), d.unresolved);
        }
        if d.failed_artists > 0 {
            println!("  {} {} artist page(s)", "Failed:".red(), d.failed_artists);
        }
    }
    if let Some(dl) = downloads {
        if args.dry_run {
            println!("  {} {} planned", "Downloads:".cyan(), dl.planned);
        } else {
            println!("  {} {}", "Downloaded:".green(), dl.downloaded);
            if dl.failed > 0 {
                println!("  {} {}", "Download failures:".red(), dl.failed);
            }
        }
    }
    if let Some(c) = cleaned {
        println!("  {} {}", "Empty folders removed:".green(), c.removed.len());
    }

    println!();
    match db::totals(&pool).await {
        Ok(totals) => print_totals(&totals),
        Err(e) => fatal("Failed to read totals", e),
    }

    if error_log.recorded() > 0 {
        println!();
        println!(
            "{} {} failure(s) recorded in {}",
            "⚠".yellow(),
            error_log.recorded(),
            config.error_log.display()
        );
        println!(
            "{} Run {} again to retry.",
            "Tip:".yellow().bold(),
            "mvsync".bright_cyan()
        );
    }
}
