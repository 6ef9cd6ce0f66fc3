//!
//! src/persistent.rs
//!
//! Release persistence in sqlite. A release and its tracks are written
//! in one transaction, `(artist_id, slug)` is unique per artist
//!

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use uuid::Uuid;

use crate::errors::ImportError;
use crate::source::ReleaseStore;
use crate::types::{ReleasePayload, ReleaseType, TrackListEntry};

/// A stored release as read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRelease {
    pub id: String,
    pub artist_id: String,
    pub title: String,
    pub slug: String,
    pub year: Option<i32>,
    pub release_type: ReleaseType,
    pub ordering: u32,
    pub tracks: Vec<TrackListEntry>
}

pub struct Persistent {
    pool: Pool<Sqlite>
}

impl Persistent {

    async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<(), ImportError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS releases (
              id              TEXT PRIMARY KEY,
              artist_id       TEXT NOT NULL,
              title           TEXT NOT NULL,
              slug            TEXT NOT NULL,
              year            INTEGER,
              release_type    TEXT NOT NULL CHECK (release_type IN (
                  'studio','ep','single','compilation','live')
                  ),
              ordering        INTEGER NOT NULL,
              is_ep           INTEGER NOT NULL DEFAULT 0,
              is_single       INTEGER NOT NULL DEFAULT 0,
              is_compilation  INTEGER NOT NULL DEFAULT 0,
              is_live         INTEGER NOT NULL DEFAULT 0,
              created_at      INTEGER NOT NULL,
              UNIQUE(artist_id, slug)
            );
            "
        ).execute(pool).await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS release_tracks (
              release_id  TEXT NOT NULL,
              position    INTEGER NOT NULL,
              title       TEXT NOT NULL,
              duration    TEXT,
              PRIMARY KEY (release_id, position),
              FOREIGN KEY(release_id) REFERENCES releases(id) ON DELETE CASCADE
            );
            "
        ).execute(pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_releases_artist ON releases(artist_id, ordering);"
        ).execute(pool).await?;

        Ok(())
    }

    pub async fn init(database_url: &str) -> Result<Self, ImportError> {
        let is_memory = database_url == "sqlite::memory:";

        let mut opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // WAL is file-only
        if !is_memory {
            opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                       .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        }

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(if is_memory {1} else {8})
            .connect_with(opts)
            .await?;

        Self::ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    fn now() -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
    }

    pub async fn insert_release(&self, payload: &ReleasePayload) -> Result<String, ImportError> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO releases (
                id, artist_id, title, slug, year, release_type, ordering,
                is_ep, is_single, is_compilation, is_live, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);
            "
        )
        .bind(&id)
        .bind(&payload.artist_id)
        .bind(&payload.title)
        .bind(&payload.slug)
        .bind(payload.year)
        .bind(payload.release_type.as_str())
        .bind(payload.ordering as i64)
        .bind(payload.is_ep as i64)
        .bind(payload.is_single as i64)
        .bind(payload.is_compilation as i64)
        .bind(payload.is_live as i64)
        .bind(Self::now())
        .execute(&mut *tx)
        .await?;

        for track in &payload.tracks {
            sqlx::query(r"
                INSERT INTO release_tracks (release_id, position, title, duration)
                VALUES (?1, ?2, ?3, ?4);")
            .bind(&id)
            .bind(track.position as i64)
            .bind(&track.title)
            .bind(track.duration.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    pub async fn count_releases(&self, artist_id: &str) -> Result<i64, ImportError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM releases WHERE artist_id = ?1;")
            .bind(artist_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn get_release(&self, id: &str) -> Result<Option<StoredRelease>, ImportError> {
        let Some(row) = sqlx::query(
            r"
            SELECT id, artist_id, title, slug, year, release_type, ordering
              FROM releases WHERE id = ?1;
            "
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await? else {
            return Ok(None);
        };

        let kind: String = row.try_get("release_type")?;
        let release_type = ReleaseType::parse(&kind).ok_or_else(
            || ImportError::Parse("bad release_type in DB".to_string())
        )?;
        let ordering: i64 = row.try_get("ordering")?;

        let tracks = sqlx::query(
            r"
            SELECT position, title, duration FROM release_tracks
             WHERE release_id = ?1 ORDER BY position;
            "
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| -> Result<TrackListEntry, ImportError> {
            let position: i64 = r.try_get("position")?;
            Ok( TrackListEntry {
                title: r.try_get("title")?,
                duration: r.try_get("duration")?,
                position: position as u32
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(StoredRelease {
            id: row.try_get("id")?,
            artist_id: row.try_get("artist_id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            year: row.try_get("year")?,
            release_type,
            ordering: ordering as u32,
            tracks
        }))
    }
}

#[async_trait]
impl ReleaseStore for Persistent {
    async fn create_release(&self, payload: &ReleasePayload) -> Result<String, ImportError> {
        self.insert_release(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiscographyEntry;

    fn payload(title: &str, kind: ReleaseType, tracks: &[&str]) -> ReleasePayload {
        let entry = DiscographyEntry {
            title: title.to_string(),
            year: Some(1997),
            release_type: kind,
            source_ref: None
        };
        let tracks = tracks.iter()
            .enumerate()
            .map(|(i, t)| TrackListEntry {
                title: t.to_string(),
                duration: Some("4:00".into()),
                position: i as u32 + 1
            })
            .collect();
        ReleasePayload::new("artist-1", &entry, 1, tracks)
    }

    #[tokio::test]
    async fn release_and_tracks_round_trip() -> Result<(), ImportError> {
        let db = Persistent::init("sqlite::memory:").await?;
        let id = db.insert_release(&payload("OK Computer", ReleaseType::Studio,
            &["Airbag", "Paranoid Android", "Subterranean Homesick Alien"])).await?;

        let stored = db.get_release(&id).await?.expect("release exists");
        assert_eq!(stored.slug, "ok-computer");
        assert_eq!(stored.release_type, ReleaseType::Studio);
        assert_eq!(stored.year, Some(1997));
        let titles: Vec<&str> = stored.tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Airbag", "Paranoid Android", "Subterranean Homesick Alien"]);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_slug_fails_without_partial_rows() -> Result<(), ImportError> {
        let db = Persistent::init("sqlite::memory:").await?;
        db.insert_release(&payload("Kid A", ReleaseType::Studio, &["Everything in Its Right Place"])).await?;

        let err = db.insert_release(&payload("Kid A", ReleaseType::Studio, &["Kid A"])).await;
        assert!(matches!(err, Err(ImportError::Db(_))));
        assert_eq!(db.count_releases("artist-1").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_track_position_rolls_back_release() -> Result<(), ImportError> {
        let db = Persistent::init("sqlite::memory:").await?;
        let mut broken = payload("Amnesiac", ReleaseType::Studio, &["Packt", "Pyramid Song"]);
        broken.tracks[1].position = 1;

        assert!(db.insert_release(&broken).await.is_err());
        assert_eq!(db.count_releases("artist-1").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_release_is_none() -> Result<(), ImportError> {
        let db = Persistent::init("sqlite::memory:").await?;
        assert!(db.get_release("nope").await?.is_none());
        Ok(())
    }
}
