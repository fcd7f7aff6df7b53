use crate::extract::{Cast, FieldPattern, PatternError, Terms, WordStripper};

use super::{KeyKind, Stage, TableSpec};

pub(super) const SOURCE_COLUMN: &str = "raw_price";

pub(super) static TABLE: TableSpec = TableSpec {
    name: "price",
    key_column: "currency",
    key_kind: KeyKind::Text,
    columns: &["amount", "currency", "segment"],
};

const NOISE_PHRASES: &[&str] = &["ad link", "Sprawdź możliwości finansowania"];

/// Production years quoted next to the price would otherwise read as part of
/// the amount.
const YEARS: std::ops::RangeInclusive<u16> = 1900..=2100;

pub(super) fn stages() -> Result<Vec<Stage>, PatternError> {
    let noise: Vec<String> = NOISE_PHRASES
        .iter()
        .map(|phrase| phrase.to_string())
        .chain(YEARS.map(|year| year.to_string()))
        .collect();

    Ok(vec![
        Stage::Strip(WordStripper::new(Terms::List(&noise))),
        Stage::Extract {
            field: "amount",
            pattern: FieldPattern::followed_by(r"([\d\s]+)", "[A-Za-z]")?,
            cast: Cast::Integer,
        },
        Stage::Extract {
            field: "currency",
            pattern: FieldPattern::value(r"^\b(\w+)\b")?,
            cast: Cast::Text,
        },
        Stage::Remainder { field: "segment" },
    ])
}
