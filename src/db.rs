use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqlitePool};
use std::path::Path;
#[cfg(test)]
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Artist {
    pub id: i64,
    pub artist_name: String,
    pub musicbrainz_id: String,
    pub imvdb_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Video {
    pub id: i64,
    pub artist_id: i64,
    pub video_name: String,
    pub imvdb_url: String,
    pub youtube_url: Option<String>,
    pub downloaded: bool,
    /// False once the owning artist row has been removed from the roster.
    pub owner_exists: bool,
}

/// A video joined with its artist, ready to hand to the downloader.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingDownload {
    pub video_id: i64,
    pub artist_name: String,
    pub video_name: String,
    pub youtube_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Totals {
    pub artists: i64,
    pub artists_linked: i64,
    pub videos: i64,
    pub videos_resolved: i64,
    pub videos_downloaded: i64,
    pub videos_pending: i64,
    pub videos_orphaned: i64,
}

// ---------------------------------------------------------------------------
// Connection & schema
// ---------------------------------------------------------------------------

fn tuned(options: SqliteConnectOptions) -> SqliteConnectOptions {
    // Video rows are allowed to outlive their artist (see discovery re-homing)
    options.create_if_missing(true).foreign_keys(false)
}

/// Open (creating if needed) the SQLite store. One connection: there is only
/// ever a single writer.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(tuned(SqliteConnectOptions::new().filename(path)))
        .await?;
    Ok(pool)
}

#[cfg(test)]
pub(crate) async fn connect_memory() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(tuned(
            SqliteConnectOptions::from_str("sqlite::memory:").unwrap(),
        ))
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artist_name TEXT NOT NULL,
            musicbrainz_id TEXT NOT NULL UNIQUE,
            imvdb_link TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artist_id INTEGER NOT NULL,
            video_name TEXT NOT NULL,
            imvdb_url TEXT NOT NULL UNIQUE,
            youtube_url TEXT,
            downloaded BOOLEAN NOT NULL DEFAULT FALSE,
            FOREIGN KEY (artist_id) REFERENCES artists (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Artists
// ---------------------------------------------------------------------------

/// Every stored (name, external id) pair.
pub async fn stored_roster(pool: &SqlitePool) -> Result<Vec<(String, String)>> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT artist_name, musicbrainz_id FROM artists")
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

/// Returns false when the external id is already taken.
pub async fn insert_artist<'c, E>(executor: E, name: &str, musicbrainz_id: &str) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"INSERT INTO artists (artist_name, musicbrainz_id) VALUES (?, ?)
           ON CONFLICT (musicbrainz_id) DO NOTHING"#,
    )
    .bind(name)
    .bind(musicbrainz_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_artist<'c, E>(executor: E, name: &str, musicbrainz_id: &str) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM artists WHERE artist_name = ? AND musicbrainz_id = ?")
        .bind(name)
        .bind(musicbrainz_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn artists_missing_link(pool: &SqlitePool) -> Result<Vec<Artist>> {
    let rows = sqlx::query_as::<_, Artist>(
        r#"SELECT id, artist_name, musicbrainz_id, imvdb_link FROM artists
           WHERE (imvdb_link IS NULL OR imvdb_link = '') AND musicbrainz_id != ''
           ORDER BY artist_name"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn set_artist_link(pool: &SqlitePool, artist_id: i64, link: &str) -> Result<()> {
    sqlx::query("UPDATE artists SET imvdb_link = ? WHERE id = ?")
        .bind(link)
        .bind(artist_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Artists with a cross-reference link, optionally narrowed to a
/// case-insensitive name prefix.
pub async fn artists_with_link(pool: &SqlitePool, only: Option<&str>) -> Result<Vec<Artist>> {
    let rows = sqlx::query_as::<_, Artist>(
        r#"SELECT id, artist_name, musicbrainz_id, imvdb_link FROM artists
           WHERE imvdb_link IS NOT NULL AND imvdb_link != ''
           ORDER BY artist_name"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter(|a| matches_prefix(&a.artist_name, only))
        .collect())
}

/// Case-insensitive name prefix test. SQLite's `LOWER()` only folds ASCII,
/// so this runs on our side.
fn matches_prefix(name: &str, prefix: Option<&str>) -> bool {
    match prefix {
        Some(p) => name.to_lowercase().starts_with(&p.to_lowercase()),
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Videos
// ---------------------------------------------------------------------------

pub async fn find_video(pool: &SqlitePool, imvdb_url: &str) -> Result<Option<Video>> {
    let row = sqlx::query_as::<_, Video>(
        r#"SELECT v.id, v.artist_id, v.video_name, v.imvdb_url, v.youtube_url, v.downloaded,
                  (a.id IS NOT NULL) AS owner_exists
           FROM videos v
           LEFT JOIN artists a ON a.id = v.artist_id
           WHERE v.imvdb_url = ?"#,
    )
    .bind(imvdb_url)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn insert_video(
    pool: &SqlitePool,
    artist_id: i64,
    video_name: &str,
    imvdb_url: &str,
    youtube_url: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"INSERT INTO videos (artist_id, video_name, imvdb_url, youtube_url, downloaded)
           VALUES (?, ?, ?, ?, FALSE)"#,
    )
    .bind(artist_id)
    .bind(video_name)
    .bind(imvdb_url)
    .bind(youtube_url)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn set_video_link(pool: &SqlitePool, video_id: i64, youtube_url: &str) -> Result<()> {
    sqlx::query("UPDATE videos SET youtube_url = ? WHERE id = ?")
        .bind(youtube_url)
        .bind(video_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn reassign_video(pool: &SqlitePool, video_id: i64, artist_id: i64) -> Result<()> {
    sqlx::query("UPDATE videos SET artist_id = ? WHERE id = ?")
        .bind(artist_id)
        .bind(video_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Videos with a playable link that have not been fetched yet.
pub async fn pending_downloads(
    pool: &SqlitePool,
    only: Option<&str>,
) -> Result<Vec<PendingDownload>> {
    let rows = sqlx::query_as::<_, PendingDownload>(
        r#"SELECT v.id AS video_id, a.artist_name, v.video_name, v.youtube_url
           FROM videos v
           JOIN artists a ON v.artist_id = a.id
           WHERE v.downloaded = FALSE
             AND v.youtube_url IS NOT NULL AND v.youtube_url != ''
           ORDER BY a.artist_name, v.id"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter(|v| matches_prefix(&v.artist_name, only))
        .collect())
}

pub async fn mark_downloaded(pool: &SqlitePool, video_id: i64) -> Result<()> {
    sqlx::query("UPDATE videos SET downloaded = TRUE WHERE id = ?")
        .bind(video_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

pub async fn totals(pool: &SqlitePool) -> Result<Totals> {
    let (artists, artists_linked): (i64, i64) = sqlx::query_as(
        r#"SELECT COUNT(*),
                  COALESCE(SUM(CASE WHEN imvdb_link IS NOT NULL AND imvdb_link != '' THEN 1 ELSE 0 END), 0)
           FROM artists"#,
    )
    .fetch_one(pool)
    .await?;

    let (videos, videos_resolved, videos_downloaded, videos_orphaned): (i64, i64, i64, i64) =
        sqlx::query_as(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(CASE WHEN v.youtube_url IS NOT NULL AND v.youtube_url != '' THEN 1 ELSE 0 END), 0),
                      COALESCE(SUM(CASE WHEN v.downloaded THEN 1 ELSE 0 END), 0),
                      COALESCE(SUM(CASE WHEN a.id IS NULL THEN 1 ELSE 0 END), 0)
               FROM videos v
               LEFT JOIN artists a ON a.id = v.artist_id"#,
        )
        .fetch_one(pool)
        .await?;

    let videos_pending: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*)
           FROM videos v
           JOIN artists a ON v.artist_id = a.id
           WHERE v.downloaded = FALSE
             AND v.youtube_url IS NOT NULL AND v.youtube_url != ''"#,
    )
    .fetch_one(pool)
    .await?;

    Ok(Totals {
        artists,
        artists_linked,
        videos,
        videos_resolved,
        videos_downloaded,
        videos_pending,
        videos_orphaned,
    })
}
