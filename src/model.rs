use serde::{Deserialize, Serialize};

use crate::runner::RunSummary;

/// One raw text fragment queued for parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    pub id: i64,
    pub text: Option<String>,
}

#[cfg(test)]
impl SourceRow {
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: Some(text.into()),
        }
    }
}

/// Scraped listing fragments as captured by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawRecord {
    pub id: i64,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub raw_summary: Option<String>,
    #[serde(default)]
    pub raw_details: Option<String>,
    #[serde(default)]
    pub raw_price: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseRunReport {
    pub report_version: u32,
    pub run_id: String,
    pub parser: String,
    pub db_path: String,
    pub started_at: String,
    pub finished_at: String,
    pub batch_size: usize,
    pub only_missing: bool,
    pub fuzzy_threshold: Option<f64>,
    pub summary: RunSummary,
}
