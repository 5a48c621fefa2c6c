use chrono::Local;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Stage tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Roster,
    Links,
    Videos,
    Download,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roster => "ROSTER",
            Self::Links => "LINKS",
            Self::Videos => "VIDEOS",
            Self::Download => "DOWNLOAD",
            Self::Cleanup => "CLEANUP",
        }
    }
}

// ---------------------------------------------------------------------------
// Error log
// ---------------------------------------------------------------------------

/// Append-only log of every failure a run absorbed.
///
/// Console output tells the user what happened; this file keeps the details
/// across runs so retries can be diagnosed later.
pub struct ErrorLog {
    file: Option<Mutex<File>>,
    recorded: AtomicU64,
}

impl ErrorLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
            recorded: AtomicU64::new(0),
        })
    }

    /// Counts entries without writing them anywhere.
    pub fn disabled() -> Self {
        Self {
            file: None,
            recorded: AtomicU64::new(0),
        }
    }

    pub fn record(&self, stage: Stage, message: impl Display) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
        if let Some(ref file) = self.file {
            if let Ok(mut f) = file.lock() {
                writeln!(
                    f,
                    "[{}] [{}] {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    stage.as_str(),
                    message
                )
                .ok();
            }
        }
    }

    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }
}
