use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::normalize::DEFAULT_SIMILARITY_THRESHOLD;
use crate::runner::DEFAULT_BATCH_SIZE;

pub const DEFAULT_DB_PATH: &str = ".cache/listings/listings.sqlite";

#[derive(Parser, Debug)]
#[command(
    name = "listing-parser",
    version,
    about = "Parse scraped vehicle listings into structured tables"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Parse(ParseArgs),
    Import(ImportArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ParserKind {
    Summary,
    Details,
    Price,
}

impl ParserKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Details => "details",
            Self::Price => "price",
        }
    }

    pub fn all() -> [ParserKind; 3] {
        [Self::Summary, Self::Details, Self::Price]
    }
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    #[arg(long, env = "LISTING_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    #[arg(long = "parser", value_enum, default_value_t = ParserKind::Details)]
    pub parser: ParserKind,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Only parse raw listings that have no parsed row yet.
    #[arg(long, default_value_t = false)]
    pub only_missing: bool,

    /// Snap make/model values to close matches among stored values.
    #[arg(long, default_value_t = false)]
    pub fuzzy: bool,

    #[arg(long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    pub similarity_threshold: f64,

    /// Leave updated_at untouched on upsert.
    #[arg(long, default_value_t = false)]
    pub no_stamp: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, env = "LISTING_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// JSON array or JSON-lines file of raw listings.
    #[arg(long)]
    pub input: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, env = "LISTING_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,
}
