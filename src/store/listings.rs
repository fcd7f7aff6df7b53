use rusqlite::{Connection, params};

use crate::model::{RawRecord, SourceRow};
use crate::pipeline::TableSpec;
use crate::util::now_utc_string;

use super::{RAW_TABLE, StoreError};

fn missing_filter(only_missing: bool, table: &TableSpec) -> String {
    if only_missing {
        format!(
            "WHERE NOT EXISTS (SELECT 1 FROM {target} t WHERE t.id = r.id)",
            target = table.name
        )
    } else {
        String::new()
    }
}

/// Raw records to parse into `table`; with `only_missing`, just those with no
/// row there yet.
pub fn count_records(
    connection: &Connection,
    table: &TableSpec,
    only_missing: bool,
) -> Result<i64, StoreError> {
    let sql = format!(
        "SELECT COUNT(*) FROM {RAW_TABLE} r {filter}",
        filter = missing_filter(only_missing, table)
    );
    Ok(connection.query_row(&sql, [], |row| row.get(0))?)
}

/// One page of `(id, raw text)` ordered by id.
///
/// Parsed records leave the only-missing filter once saved, so that mode
/// always reads from the start.
pub fn fetch_page(
    connection: &Connection,
    source_column: &str,
    table: &TableSpec,
    limit: usize,
    offset: usize,
    only_missing: bool,
) -> Result<Vec<SourceRow>, StoreError> {
    let offset = if only_missing { 0 } else { offset };
    let sql = format!(
        "SELECT r.id, r.{source_column} FROM {RAW_TABLE} r {filter} ORDER BY r.id LIMIT ?1 OFFSET ?2",
        filter = missing_filter(only_missing, table)
    );

    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map(params![limit as i64, offset as i64], |row| {
        Ok(SourceRow {
            id: row.get(0)?,
            text: row.get(1)?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Inserts new raw records and refreshes the text of known ones.
pub fn upsert_raw_listings(
    connection: &mut Connection,
    records: &[RawRecord],
) -> Result<usize, StoreError> {
    let now = now_utc_string();
    let tx = connection.transaction()?;
    let mut affected = 0;

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO raw_listing(id, page_url, raw_summary, raw_details, raw_price, status, created_at, updated_at)
            VALUES(?1, ?2, ?3, ?4, ?5, 'new', ?6, ?6)
            ON CONFLICT(id) DO UPDATE SET
              page_url=COALESCE(excluded.page_url, raw_listing.page_url),
              raw_summary=COALESCE(excluded.raw_summary, raw_listing.raw_summary),
              raw_details=COALESCE(excluded.raw_details, raw_listing.raw_details),
              raw_price=COALESCE(excluded.raw_price, raw_listing.raw_price),
              status='updated',
              updated_at=excluded.updated_at
            ",
        )?;

        for record in records {
            affected += statement.execute(params![
                record.id,
                record.page_url,
                record.raw_summary,
                record.raw_details,
                record.raw_price,
                now,
            ])?;
        }
    }

    tx.commit()?;
    Ok(affected)
}
