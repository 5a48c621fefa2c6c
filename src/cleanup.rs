use crate::report::{ErrorLog, Stage};
use colored::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub removed: Vec<PathBuf>,
    pub failed: u32,
}

impl CleanupStats {
    /// Print, log and count one per-directory failure.
    fn fail(&mut self, log: &ErrorLog, message: String) {
        println!("  {} {}", "✗".red(), message);
        log.record(Stage::Cleanup, &message);
        self.failed += 1;
    }
}

/// A directory counts as empty when everything left in it has already been
/// removed (or, on a dry run, would have been).
fn is_empty(dir: &Path, removed: &HashSet<PathBuf>) -> std::io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        if !removed.contains(&entry?.path()) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Remove every empty directory under `root`, children before parents, so a
/// chain of empty folders collapses in one pass. `root` goes too if it ends
/// up empty.
pub fn remove_empty_dirs(root: &Path, dry_run: bool, log: &ErrorLog) -> CleanupStats {
    let mut stats = CleanupStats::default();
    if !root.is_dir() {
        return stats;
    }

    let mut removed: HashSet<PathBuf> = HashSet::new();

    for entry in WalkDir::new(root).contents_first(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                stats.fail(log, format!("Walk error under {}: {}", root.display(), e));
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        match is_empty(path, &removed) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                stats.fail(log, format!("Failed to read {}: {}", path.display(), e));
                continue;
            }
        }

        if dry_run {
            println!("  {} {} (dry run)", "○".cyan(), path.display());
        } else if let Err(e) = fs::remove_dir(path) {
            stats.fail(log, format!("Failed to remove {}: {}", path.display(), e));
            continue;
        } else {
            println!("  {} Removed empty folder: {}", "✓".green(), path.display());
        }

        removed.insert(path.to_path_buf());
        stats.removed.push(path.to_path_buf());
    }

    stats
}
