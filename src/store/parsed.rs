use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use tracing::warn;

use crate::extract::Value;
use crate::normalize::ReferenceCounts;
use crate::pipeline::{KeyKind, ParsedRecord, TableSpec};
use crate::util::utc_string;

use super::StoreError;

/// Non-blank values of `column` with the number of rows carrying each.
pub fn reference_values(
    connection: &Connection,
    table: &TableSpec,
    column: &str,
) -> Result<ReferenceCounts, StoreError> {
    let sql = format!(
        "SELECT {column}, COUNT(*) FROM {table} WHERE {column} IS NOT NULL AND TRIM({column}) <> '' GROUP BY {column}",
        table = table.name
    );

    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    Ok(rows.collect::<rusqlite::Result<ReferenceCounts>>()?)
}

/// Writes one batch in a single transaction and returns the affected rows.
///
/// `created_at` is only set on insert. Without `stamp_updated_at` an existing
/// row keeps its previous `updated_at`.
pub fn upsert_records(
    connection: &mut Connection,
    table: &TableSpec,
    records: &[ParsedRecord],
    stamp_updated_at: bool,
) -> Result<usize, StoreError> {
    if records.is_empty() {
        return Ok(0);
    }

    let sql = upsert_sql(table);
    let now = Utc::now();
    let tx = connection.transaction()?;
    let mut affected = 0;

    {
        let mut statement = tx.prepare(&sql)?;
        for record in records {
            let updated_at = stamp_updated_at.then(|| utc_string(record.updated_at.unwrap_or(now)));

            let mut values = Vec::with_capacity(table.columns.len() + 3);
            values.push(SqlValue::Integer(record.id));
            for column in table.columns {
                values.push(column_value(table, column, record));
            }
            values.push(SqlValue::Text(utc_string(now)));
            values.push(updated_at.map_or(SqlValue::Null, SqlValue::Text));

            affected += statement.execute(params_from_iter(values))?;
        }
    }

    if affected == 0 {
        // dropping the transaction rolls it back
        return Err(StoreError::NoRowsAffected { table: table.name });
    }
    if affected < records.len() {
        warn!(
            table = table.name,
            affected,
            expected = records.len(),
            "upsert affected fewer rows than records"
        );
    }

    tx.commit()?;
    Ok(affected)
}

fn upsert_sql(table: &TableSpec) -> String {
    let columns = table.columns.join(", ");
    let placeholders = (1..=table.columns.len() + 3)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = table
        .columns
        .iter()
        .filter(|column| **column != table.key_column)
        .map(|column| format!("{column}=excluded.{column}"))
        .collect::<Vec<_>>()
        .join(",\n  ");

    format!(
        "INSERT INTO {name}(id, {columns}, created_at, updated_at)
         VALUES({placeholders})
         ON CONFLICT(id, {key}) DO UPDATE SET
           {updates},
           updated_at=COALESCE(excluded.updated_at, {name}.updated_at)",
        name = table.name,
        key = table.key_column,
    )
}

fn column_value(table: &TableSpec, column: &str, record: &ParsedRecord) -> SqlValue {
    match record.get(column) {
        Some(Value::Flag(flag)) => SqlValue::Integer(i64::from(*flag)),
        Some(Value::Integer(number)) => SqlValue::Integer(*number),
        Some(Value::Float(number)) => SqlValue::Real(*number),
        Some(Value::Text(text)) => SqlValue::Text(text.clone()),
        None if column == table.key_column => match table.key_kind {
            KeyKind::Text => SqlValue::Text(String::new()),
            KeyKind::Integer => SqlValue::Integer(0),
        },
        None => SqlValue::Null,
    }
}
