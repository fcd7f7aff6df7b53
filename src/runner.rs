//! Paged fetch, parse, validate and upsert loop over one pipeline.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::pipeline::{IntegrityError, ParsedRecord, Pipeline, References, validate_ids};
use crate::store::{self, StoreError};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub batch_size: usize,
    pub only_missing: bool,
    pub stamp_updated_at: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Finished,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Processing {
        batch: usize,
        records: usize,
        affected: usize,
    },
    Finished,
    Error {
        batch: usize,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub parser: String,
    pub total: i64,
    pub batches_succeeded: usize,
    pub records_parsed: usize,
    pub rows_affected: usize,
    pub final_status: BatchStatus,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    MissingIds(#[from] IntegrityError),

    #[error("failed to read records to parse")]
    Store(#[source] StoreError),
}

pub struct BatchRunner<'c> {
    conn: &'c mut Connection,
    pipeline: Pipeline,
    options: RunOptions,
}

impl<'c> BatchRunner<'c> {
    pub fn new(conn: &'c mut Connection, pipeline: Pipeline, options: RunOptions) -> Self {
        Self {
            conn,
            pipeline,
            options,
        }
    }

    pub fn total_records(&self) -> Result<i64, RunError> {
        store::count_records(self.conn, self.pipeline.table(), self.options.only_missing)
            .map_err(RunError::Store)
    }

    /// Processes pages until none are left or a save fails.
    ///
    /// A failed save stops the run with an `Error` status; batches committed
    /// before it stay. Losing a record during parsing is returned as an error.
    pub fn run(&mut self, mut on_event: impl FnMut(&BatchEvent)) -> Result<RunSummary, RunError> {
        let table = self.pipeline.table();
        let source_column = self.pipeline.source_column();
        let batch_size = self.options.batch_size.max(1);
        let total = self.total_records()?;

        let mut summary = RunSummary {
            parser: self.pipeline.kind().as_str().to_string(),
            total,
            batches_succeeded: 0,
            records_parsed: 0,
            rows_affected: 0,
            final_status: BatchStatus::Processing,
            error: None,
        };

        info!(
            parser = %summary.parser,
            table = table.name,
            total,
            batch_size,
            only_missing = self.options.only_missing,
            "parse run started"
        );

        let mut offset = 0usize;
        let mut batch = 0usize;
        loop {
            let rows = store::fetch_page(
                self.conn,
                source_column,
                table,
                batch_size,
                offset,
                self.options.only_missing,
            )
            .map_err(RunError::Store)?;
            if rows.is_empty() || offset as i64 > total {
                break;
            }
            offset += batch_size;
            batch += 1;

            let references = self.load_references();
            let mut records = self.pipeline.parse(&rows, &references);
            validate_ids(&rows, &records)?;
            log_misses(&records);

            if self.options.stamp_updated_at {
                let now = Utc::now();
                for record in &mut records {
                    record.updated_at = Some(now);
                }
            }

            match store::upsert_records(self.conn, table, &records, self.options.stamp_updated_at) {
                Ok(affected) => {
                    summary.batches_succeeded += 1;
                    summary.records_parsed += records.len();
                    summary.rows_affected += affected;
                    info!(batch, records = records.len(), affected, "batch saved");
                    on_event(&BatchEvent::Processing {
                        batch,
                        records: records.len(),
                        affected,
                    });
                }
                Err(err) => {
                    error!(batch, error = %err, "failed to save batch");
                    summary.final_status = BatchStatus::Error;
                    summary.error = Some(err.to_string());
                    on_event(&BatchEvent::Error {
                        batch,
                        message: err.to_string(),
                    });
                    return Ok(summary);
                }
            }
        }

        summary.final_status = BatchStatus::Finished;
        info!(
            batches = summary.batches_succeeded,
            records = summary.records_parsed,
            affected = summary.rows_affected,
            "parse run finished"
        );
        on_event(&BatchEvent::Finished);
        Ok(summary)
    }

    /// Stored values for every normalized column; unreadable ones count as empty.
    fn load_references(&self) -> References {
        let table = self.pipeline.table();
        let mut references = References::new();

        for field in self.pipeline.normalized_fields() {
            let values = match store::reference_values(self.conn, table, field) {
                Ok(values) => values,
                Err(err) => {
                    warn!(column = field, error = %err, "reference values unavailable; normalizing within batch");
                    Default::default()
                }
            };
            references.insert(field, values);
        }

        references
    }
}

fn log_misses(records: &[ParsedRecord]) {
    let mut misses: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for record in records {
        for field in record.fields.iter().filter(|field| field.value.is_none()) {
            if let Some(pattern) = &field.source_pattern {
                *misses.entry((field.name, pattern.as_str())).or_default() += 1;
            }
        }
    }

    for ((field, pattern), count) in misses {
        debug!(field, pattern, count, "pattern left field empty");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ParserKind;
    use crate::model::RawRecord;

    fn seeded(summaries: &[&str]) -> Connection {
        let mut conn = store::open_in_memory().unwrap();
        let records: Vec<RawRecord> = summaries
            .iter()
            .enumerate()
            .map(|(index, summary)| RawRecord {
                id: index as i64 + 1,
                page_url: None,
                raw_summary: Some(summary.to_string()),
                raw_details: None,
                raw_price: None,
            })
            .collect();
        store::upsert_raw_listings(&mut conn, &records).unwrap();
        conn
    }

    fn status(event: &BatchEvent) -> BatchStatus {
        match event {
            BatchEvent::Processing { .. } => BatchStatus::Processing,
            BatchEvent::Finished => BatchStatus::Finished,
            BatchEvent::Error { .. } => BatchStatus::Error,
        }
    }

    fn options(batch_size: usize, only_missing: bool) -> RunOptions {
        RunOptions {
            batch_size,
            only_missing,
            stamp_updated_at: true,
        }
    }

    #[test]
    fn run_processes_every_page_then_finishes() {
        let mut conn = seeded(&["Fiat Panda", "Opel Astra", "Kia Ceed", "Skoda Octavia", "Audi A4"]);
        let pipeline = Pipeline::for_kind(ParserKind::Summary).unwrap();
        let mut events = Vec::new();

        let summary = BatchRunner::new(&mut conn, pipeline, options(2, false))
            .run(|event| events.push(event.clone()))
            .unwrap();

        assert_eq!(
            events.iter().map(status).collect::<Vec<_>>(),
            vec![
                BatchStatus::Processing,
                BatchStatus::Processing,
                BatchStatus::Processing,
                BatchStatus::Finished,
            ]
        );
        assert_eq!(summary.total, 5);
        assert_eq!(summary.batches_succeeded, 3);
        assert_eq!(summary.records_parsed, 5);
        assert_eq!(summary.rows_affected, 5);
        assert_eq!(summary.final_status, BatchStatus::Finished);
        assert_eq!(store::table_count(&conn, "car").unwrap(), 5);
    }

    #[test]
    fn only_missing_rerun_has_nothing_left() {
        let mut conn = seeded(&["Fiat Panda", "Opel Astra", "Kia Ceed"]);

        let pipeline = Pipeline::for_kind(ParserKind::Summary).unwrap();
        BatchRunner::new(&mut conn, pipeline, options(2, true))
            .run(|_| {})
            .unwrap();
        assert_eq!(store::table_count(&conn, "car").unwrap(), 3);

        let pipeline = Pipeline::for_kind(ParserKind::Summary).unwrap();
        let summary = BatchRunner::new(&mut conn, pipeline, options(2, true))
            .run(|_| {})
            .unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.batches_succeeded, 0);
        assert_eq!(summary.final_status, BatchStatus::Finished);
    }

    #[test]
    fn later_batches_normalize_against_saved_values() {
        let mut conn = seeded(&["BMW X5", "Bmw X3"]);
        let pipeline = Pipeline::for_kind(ParserKind::Summary).unwrap();

        BatchRunner::new(&mut conn, pipeline, options(1, false))
            .run(|_| {})
            .unwrap();

        let makes: Vec<String> = conn
            .prepare("SELECT make FROM car ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(makes, vec!["BMW", "BMW"]);
    }

    #[test]
    fn failed_save_stops_with_error_status() {
        let mut conn = seeded(&["Fiat Panda", "Opel Astra"]);
        conn.execute_batch("DROP TABLE car").unwrap();
        let pipeline = Pipeline::for_kind(ParserKind::Summary).unwrap();
        let mut events = Vec::new();

        let summary = BatchRunner::new(&mut conn, pipeline, options(1, false))
            .run(|event| events.push(event.clone()))
            .unwrap();

        assert_eq!(summary.final_status, BatchStatus::Error);
        assert_eq!(summary.batches_succeeded, 0);
        assert!(summary.error.is_some());
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], BatchEvent::Error { batch: 1, .. }));
    }
}
