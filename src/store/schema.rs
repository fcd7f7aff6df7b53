use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::util::now_utc_string;

const DB_SCHEMA_VERSION: &str = "1";

pub(super) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign_keys")?;
    Ok(())
}

/// Parsed tables key on `(id, discriminator)`; a discriminator that was not
/// extracted is stored as `''` or `0` so reruns update the same row.
pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS raw_listing (
          id INTEGER PRIMARY KEY,
          page_url TEXT,
          raw_summary TEXT,
          raw_details TEXT,
          raw_price TEXT,
          status TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS car (
          id INTEGER NOT NULL,
          make TEXT NOT NULL DEFAULT '',
          model TEXT,
          variant TEXT,
          engine_cc REAL,
          power_hp REAL,
          description TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT,
          PRIMARY KEY (id, make),
          FOREIGN KEY (id) REFERENCES raw_listing(id)
        );

        CREATE TABLE IF NOT EXISTS details (
          id INTEGER NOT NULL,
          year INTEGER NOT NULL DEFAULT 0,
          mileage INTEGER,
          fuel_type TEXT,
          gearbox_type TEXT,
          city TEXT,
          voivodeship TEXT,
          seller_type TEXT,
          seller_info TEXT,
          is_featured INTEGER,
          is_verified INTEGER,
          is_stamped INTEGER,
          created_at TEXT NOT NULL,
          updated_at TEXT,
          PRIMARY KEY (id, year),
          FOREIGN KEY (id) REFERENCES raw_listing(id)
        );

        CREATE TABLE IF NOT EXISTS price (
          id INTEGER NOT NULL,
          currency TEXT NOT NULL DEFAULT '',
          amount INTEGER,
          segment TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT,
          PRIMARY KEY (id, currency),
          FOREIGN KEY (id) REFERENCES raw_listing(id)
        );

        CREATE INDEX IF NOT EXISTS idx_car_make ON car(make);
        CREATE INDEX IF NOT EXISTS idx_car_model ON car(model);
        ",
    )?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

pub fn table_count(connection: &Connection, table: &str) -> rusqlite::Result<i64> {
    connection.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
}
