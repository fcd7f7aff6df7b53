use anyhow::{Context, Result, bail};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cli::ParseArgs;
use crate::model::ParseRunReport;
use crate::normalize::StringNormalizer;
use crate::pipeline::Pipeline;
use crate::runner::{BatchEvent, BatchRunner, BatchStatus, RunOptions};
use crate::store;
use crate::util::{utc_compact_string, utc_string, write_json_pretty};

const REPORT_VERSION: u32 = 1;

pub fn run(args: ParseArgs) -> Result<()> {
    let started = Utc::now();
    let run_id = format!("{}-{}", args.parser.as_str(), utc_compact_string(started));

    let fuzzy_threshold = args.fuzzy.then_some(args.similarity_threshold);
    if let Some(threshold) = fuzzy_threshold
        && !(0.0..=1.0).contains(&threshold)
    {
        bail!("--similarity-threshold must be within 0.0..=1.0, got {threshold}");
    }
    let normalizer = fuzzy_threshold
        .map(StringNormalizer::with_similarity_threshold)
        .unwrap_or_default();

    let pipeline = Pipeline::for_kind(args.parser)
        .with_context(|| format!("failed to build {} pipeline", args.parser.as_str()))?
        .with_normalizer(normalizer);

    let mut conn = store::open(&args.db_path)?;
    let options = RunOptions {
        batch_size: args.batch_size,
        only_missing: args.only_missing,
        stamp_updated_at: !args.no_stamp,
    };
    let mut runner = BatchRunner::new(&mut conn, pipeline, options);

    let total = runner.total_records()?;
    info!(
        run_id = %run_id,
        parser = args.parser.as_str(),
        db = %args.db_path.display(),
        total,
        "parse requested"
    );

    let progress_bar = ProgressBar::new(total.max(0) as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")?
            .progress_chars("##-"),
    );
    progress_bar.set_message(format!("parsing {}", args.parser.as_str()));

    let summary = runner.run(|event| match event {
        BatchEvent::Processing {
            batch,
            records,
            affected,
        } => {
            progress_bar.inc(*records as u64);
            progress_bar.set_message(format!("batch {batch}: {affected} rows"));
        }
        BatchEvent::Finished => progress_bar.finish_with_message("done"),
        BatchEvent::Error { batch, message } => {
            progress_bar.abandon_with_message(format!("batch {batch} failed: {message}"));
        }
    })?;

    if let Some(report_path) = &args.report_path {
        let report = ParseRunReport {
            report_version: REPORT_VERSION,
            run_id: run_id.clone(),
            parser: args.parser.as_str().to_string(),
            db_path: args.db_path.display().to_string(),
            started_at: utc_string(started),
            finished_at: utc_string(Utc::now()),
            batch_size: options.batch_size,
            only_missing: options.only_missing,
            fuzzy_threshold,
            summary: summary.clone(),
        };
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote parse run report");
    }

    if summary.final_status == BatchStatus::Error {
        bail!(
            "parse run {run_id} stopped after {} successful batches: {}",
            summary.batches_succeeded,
            summary.error.unwrap_or_default()
        );
    }

    info!(
        run_id = %run_id,
        batches = summary.batches_succeeded,
        records = summary.records_parsed,
        affected = summary.rows_affected,
        "parse completed"
    );

    Ok(())
}
