use crate::extract::{Cast, FieldPattern, PatternError, Terms, WordStripper};

use super::{KeyKind, Stage, TableSpec};

pub(super) const SOURCE_COLUMN: &str = "raw_details";

pub(super) static TABLE: TableSpec = TableSpec {
    name: "details",
    key_column: "year",
    key_kind: KeyKind::Integer,
    columns: &[
        "is_stamped",
        "is_featured",
        "is_verified",
        "mileage",
        "fuel_type",
        "gearbox_type",
        "year",
        "city",
        "voivodeship",
        "seller_info",
        "seller_type",
    ],
};

/// Page chrome left between the location and the seller block.
const LEFTOVER_LABELS: &[&str] = &["()", "Opublikowano", "Zobacz ogłoszenia"];

pub(super) fn stages() -> Result<Vec<Stage>, PatternError> {
    let leftovers: Vec<String> = LEFTOVER_LABELS.iter().map(|label| label.to_string()).collect();

    Ok(vec![
        Stage::Flag {
            field: "is_stamped",
            pattern: FieldPattern::presence(r"\bPodbite\b")?,
        },
        Stage::Flag {
            field: "is_featured",
            pattern: FieldPattern::presence(r"\bWyróżnione\b")?,
        },
        Stage::Flag {
            field: "is_verified",
            pattern: FieldPattern::presence(r"\bZweryfikowane dane\b")?,
        },
        Stage::Extract {
            field: "mileage",
            pattern: FieldPattern::value(r"mileage\s*([0-9]+(?:\s+[0-9]+)*)\s*km")?,
            cast: Cast::Integer,
        },
        Stage::Extract {
            field: "fuel_type",
            pattern: FieldPattern::value(r"fuel_type\s+(\S+)\s*")?,
            cast: Cast::Text,
        },
        Stage::Extract {
            field: "gearbox_type",
            pattern: FieldPattern::value(r"gearbox\s+(\S+)\s*")?,
            cast: Cast::Text,
        },
        Stage::Extract {
            field: "year",
            pattern: FieldPattern::value(r"year\s+(\d+)\s*")?,
            cast: Cast::Integer,
        },
        Stage::Extract {
            field: "city",
            pattern: FieldPattern::followed_by(r"([^(]+?)", r"\s*\(")?,
            cast: Cast::Text,
        },
        Stage::Extract {
            field: "voivodeship",
            pattern: FieldPattern::value(r"\(([^)]+)\)")?,
            cast: Cast::Text,
        },
        Stage::Strip(WordStripper::new(Terms::List(&leftovers))),
        Stage::Extract {
            field: "seller_info",
            pattern: FieldPattern::value(r"Usługi finansowe(.*$)")?,
            cast: Cast::Text,
        },
        Stage::Remainder {
            field: "seller_type",
        },
    ])
}
