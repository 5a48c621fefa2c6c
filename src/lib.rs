//! Keeps a local music-video library in step with a Lidarr artist roster.
//!
//! Roster -> MusicBrainz cross-reference -> IMVDb videography -> YouTube link
//! -> yt-dlp download, with all state kept in a small SQLite file.

pub mod cleanup;
pub mod config;
pub mod db;
pub mod downloader;
pub mod error;
pub mod imvdb;
pub mod lidarr;
pub mod musicbrainz;
pub mod report;
pub mod sync;

pub use error::{Error, Result};
