use crate::extract::{Cast, FieldPattern, PatternError, Terms, Value, strip_words, trim_boundary};

use super::{KeyKind, Stage, TableSpec};

pub(super) const SOURCE_COLUMN: &str = "raw_summary";

pub(super) static TABLE: TableSpec = TableSpec {
    name: "car",
    key_column: "make",
    key_kind: KeyKind::Text,
    columns: &[
        "engine_cc",
        "power_hp",
        "make",
        "model",
        "variant",
        "description",
    ],
};

/// Makes that span two words and would otherwise be cut at the first one.
const MULTI_WORD_MAKES: &[&str] = &["Land Rover", "Alfa Romeo", "Aston Martin", "Rolls Royce"];

pub(super) fn stages() -> Result<Vec<Stage>, PatternError> {
    Ok(vec![
        Stage::Extract {
            field: "engine_cc",
            pattern: FieldPattern::value(r"(\d+)\s?cm3")?,
            cast: Cast::Float,
        },
        Stage::Extract {
            field: "power_hp",
            pattern: FieldPattern::value(r"(\d+)\s?KM")?,
            cast: Cast::Float,
        },
        Stage::Extract {
            field: "make",
            pattern: FieldPattern::value(&make_pattern())?,
            cast: Cast::Text,
        },
        Stage::Normalize { field: "make" },
        Stage::Split {
            field: "model",
            rule: "first token, two when the second is a single character",
            split: split_model,
        },
        Stage::Normalize { field: "model" },
        Stage::Split {
            field: "variant",
            rule: "text before the first bullet",
            split: split_variant,
        },
        Stage::Remainder {
            field: "description",
        },
    ])
}

/// Longest multi-word make first, then any single token.
fn make_pattern() -> String {
    let mut makes = MULTI_WORD_MAKES.to_vec();
    makes.sort_by_key(|make| std::cmp::Reverse(make.len()));

    let escaped: Vec<String> = makes.iter().map(|make| regex::escape(make)).collect();
    format!(r"({}|\S+)", escaped.join("|"))
}

/// "Clio 1.2 TCe" yields "Clio"; "Klasa C 200" yields "Klasa C".
pub(super) fn split_model(buffer: &str) -> (Option<Value>, String) {
    let working = buffer.trim().trim_start_matches(['•', '.']).trim_start();

    let mut tokens = working.split_whitespace();
    let model = match (tokens.next(), tokens.next()) {
        (Some(first), Some(second)) if second.chars().count() == 1 => format!("{first} {second}"),
        (Some(first), _) => first.to_string(),
        (None, _) => String::new(),
    };

    let remaining = strip_words(working, Terms::Phrase(&model));
    let model = trim_boundary(&model);
    let value = (!model.is_empty()).then(|| Value::Text(model.to_string()));

    (value, remaining)
}

/// Without a bullet there is no variant and the whole buffer is left over.
pub(super) fn split_variant(buffer: &str) -> (Option<Value>, String) {
    let working = buffer.trim();
    if working.is_empty() {
        return (None, String::new());
    }

    let Some((variant, rest)) = working.split_once('•') else {
        return (None, working.to_string());
    };
    let variant = variant.trim();

    let remaining = strip_words(rest.trim(), Terms::Phrase(variant));
    let remaining = remaining.trim_start().trim_start_matches('•').trim().to_string();

    let variant = trim_boundary(variant);
    let value = (!variant.is_empty()).then(|| Value::Text(variant.to_string()));

    (value, remaining)
}
