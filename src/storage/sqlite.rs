use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::Storage;
use crate::common::error::{PipelineError, Result};
use crate::domain::{Listing, LoadRun, Location};

/// SQLite-backed storage sink. Tables follow the directory site's schema:
/// a parent `magicians` row with dependent location, service, and
/// availability rows. All writes are `INSERT .. ON CONFLICT` keyed on the
/// listing's natural id.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS magicians (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                business_name TEXT,
                email         TEXT,
                phone         TEXT,
                website_url   TEXT,
                bio           TEXT,
                verified      INTEGER NOT NULL DEFAULT 0,
                rating        REAL,
                review_count  INTEGER,
                sources       TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS magician_locations (
                magician_id  TEXT NOT NULL REFERENCES magicians(id),
                city         TEXT NOT NULL,
                state        TEXT NOT NULL,
                latitude     REAL,
                longitude    REAL,
                is_primary   INTEGER NOT NULL DEFAULT 1,
                updated_at   TEXT NOT NULL,
                PRIMARY KEY (magician_id, city, state)
            );

            CREATE TABLE IF NOT EXISTS magician_services (
                magician_id  TEXT NOT NULL REFERENCES magicians(id),
                service      TEXT NOT NULL,
                PRIMARY KEY (magician_id, service)
            );

            CREATE TABLE IF NOT EXISTS magician_availability (
                magician_id  TEXT PRIMARY KEY REFERENCES magicians(id),
                availability TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS load_runs (
                id          TEXT PRIMARY KEY,
                started_at  TEXT NOT NULL,
                finished_at TEXT,
                attempted   INTEGER NOT NULL DEFAULT 0,
                loaded      INTEGER NOT NULL DEFAULT 0,
                failed      INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn upsert_listing(&self, listing: &Listing) -> Result<Uuid> {
        let id = listing.id.unwrap_or_else(|| listing.natural_id());
        let now = Utc::now().to_rfc3339();
        let sources = serde_json::to_string(&listing.sources)?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO magicians
                (id, name, business_name, email, phone, website_url, bio,
                 verified, rating, review_count, sources, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            ON CONFLICT(id) DO UPDATE SET
                name          = excluded.name,
                business_name = excluded.business_name,
                email         = excluded.email,
                phone         = excluded.phone,
                website_url   = excluded.website_url,
                bio           = excluded.bio,
                verified      = excluded.verified,
                rating        = excluded.rating,
                review_count  = excluded.review_count,
                sources       = excluded.sources,
                updated_at    = excluded.updated_at
            "#,
            params![
                id.to_string(),
                listing.name,
                listing.business_name,
                listing.contact.email,
                listing.contact.phone,
                listing.contact.website,
                listing.description,
                listing.verified,
                listing.rating,
                listing.review_count,
                sources,
                now,
            ],
        )?;

        debug!("Upserted listing: {} with id {}", listing.name, id);
        Ok(id)
    }

    async fn upsert_location(&self, listing_id: Uuid, location: &Location) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO magician_locations
                (magician_id, city, state, latitude, longitude, is_primary, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
            ON CONFLICT(magician_id, city, state) DO UPDATE SET
                latitude   = excluded.latitude,
                longitude  = excluded.longitude,
                updated_at = excluded.updated_at
            "#,
            params![
                listing_id.to_string(),
                location.city,
                location.state,
                location.coordinates.map(|c| c.latitude),
                location.coordinates.map(|c| c.longitude),
                now,
            ],
        )?;
        Ok(())
    }

    async fn upsert_services(&self, listing_id: Uuid, services: &[String]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM magician_services WHERE magician_id = ?1",
            params![listing_id.to_string()],
        )?;
        for service in services {
            tx.execute(
                "INSERT OR IGNORE INTO magician_services (magician_id, service) VALUES (?1, ?2)",
                params![listing_id.to_string(), service],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn upsert_availability(&self, listing_id: Uuid, availability: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO magician_availability (magician_id, availability, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(magician_id) DO UPDATE SET
                availability = excluded.availability,
                updated_at   = excluded.updated_at
            "#,
            params![listing_id.to_string(), availability, now],
        )?;
        Ok(())
    }

    async fn upsert_rating(
        &self,
        listing_id: Uuid,
        rating: Option<f64>,
        review_count: Option<u32>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE magicians SET rating = ?2, review_count = ?3, updated_at = ?4 WHERE id = ?1",
            params![listing_id.to_string(), rating, review_count, now],
        )?;
        if updated == 0 {
            return Err(PipelineError::SinkWrite(format!(
                "no listing with id {}",
                listing_id
            )));
        }
        Ok(())
    }

    async fn create_load_run(&self, run: &mut LoadRun) -> Result<()> {
        let id = Uuid::new_v4();
        run.id = Some(id);

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO load_runs (id, started_at, attempted, loaded, failed) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                run.started_at.to_rfc3339(),
                run.attempted as i64,
                run.loaded as i64,
                run.failed as i64,
            ],
        )?;
        Ok(())
    }

    async fn finish_load_run(&self, run: &LoadRun) -> Result<()> {
        let id = run.id.ok_or_else(|| {
            PipelineError::SinkWrite("cannot finish a load run without an id".to_string())
        })?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE load_runs SET finished_at = ?2, attempted = ?3, loaded = ?4, failed = ?5 WHERE id = ?1",
            params![
                id.to_string(),
                run.finished_at.map(|t| t.to_rfc3339()),
                run.attempted as i64,
                run.loaded as i64,
                run.failed as i64,
            ],
        )?;
        Ok(())
    }

    async fn count_listings(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM magicians", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
