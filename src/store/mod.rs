//! SQLite persistence for raw listings and parsed tables.

mod listings;
mod parsed;
mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use thiserror::Error;

use crate::util::ensure_directory;

pub use listings::{count_records, fetch_page, upsert_raw_listings};
pub use parsed::{reference_values, upsert_records};
pub use schema::table_count;

pub const RAW_TABLE: &str = "raw_listing";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no rows affected while upserting into {table}")]
    NoRowsAffected { table: &'static str },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }

    let connection = Connection::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    schema::configure_connection(&connection)?;
    schema::ensure_schema(&connection).context("failed to initialize database schema")?;

    Ok(connection)
}

#[cfg(test)]
pub fn open_in_memory() -> Result<Connection> {
    let connection = Connection::open_in_memory()?;
    schema::ensure_schema(&connection)?;
    connection.pragma_update(None, "foreign_keys", "ON")?;
    Ok(connection)
}
