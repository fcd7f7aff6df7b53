use std::fs;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::ImportArgs;
use crate::model::RawRecord;
use crate::store;

pub fn run(args: ImportArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let records = parse_raw_records(&raw)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;

    if records.is_empty() {
        bail!("no raw listings found in {}", args.input.display());
    }

    let mut conn = store::open(&args.db_path)?;
    let affected = store::upsert_raw_listings(&mut conn, &records)?;
    let total = store::table_count(&conn, store::RAW_TABLE)?;

    info!(
        input = %args.input.display(),
        db = %args.db_path.display(),
        records = records.len(),
        affected,
        total,
        "imported raw listings"
    );

    Ok(())
}

/// Accepts a JSON array of records or one JSON object per line.
fn parse_raw_records(raw: &str) -> Result<Vec<RawRecord>> {
    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(raw).context("invalid JSON array of raw listings");
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid raw listing on line {}", index + 1))
        })
        .collect()
}
