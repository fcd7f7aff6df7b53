//! Ordered field-extraction pipelines.
//!
//! A pipeline is a fixed list of stages run over a whole batch. Each stage
//! reads the working buffer left by the previous one, records one field and
//! hands the shrunken buffer on. Every stage runs for every record.

mod details;
mod price;
mod summary;
#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cli::ParserKind;
use crate::extract::{Cast, FieldPattern, PatternError, Value, WordStripper, extract, extract_flag};
use crate::model::SourceRow;
use crate::normalize::{ReferenceCounts, StringNormalizer};

/// Stored values per normalized column, keyed by column name.
pub type References = HashMap<&'static str, ReferenceCounts>;

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedField {
    pub name: &'static str,
    pub value: Option<Value>,
    pub source_pattern: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedRecord {
    pub id: i64,
    pub fields: Vec<ParsedField>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ParsedRecord {
    fn new(id: i64) -> Self {
        Self {
            id,
            fields: Vec::new(),
            updated_at: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .and_then(|field| field.value.as_ref())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    fn set(&mut self, field: ParsedField) {
        match self.fields.iter_mut().find(|existing| existing.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    fn replace_value(&mut self, name: &'static str, value: Option<Value>) {
        match self.fields.iter_mut().find(|existing| existing.name == name) {
            Some(existing) => existing.value = value,
            None => self.fields.push(ParsedField {
                name,
                value,
                source_pattern: None,
            }),
        }
    }
}

/// Splits a buffer into a value and the text that remains.
pub type SplitFn = fn(&str) -> (Option<Value>, String);

pub enum Stage {
    Extract {
        field: &'static str,
        pattern: FieldPattern,
        cast: Cast,
    },
    Flag {
        field: &'static str,
        pattern: FieldPattern,
    },
    Strip(WordStripper),
    Split {
        field: &'static str,
        rule: &'static str,
        split: SplitFn,
    },
    /// Rewrites an already extracted text column against stored values.
    Normalize { field: &'static str },
    /// Whatever is left of the buffer becomes this field.
    Remainder { field: &'static str },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyKind {
    Text,
    Integer,
}

/// Target table of a pipeline; the primary key is `(id, key_column)`.
#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub key_column: &'static str,
    pub key_kind: KeyKind,
    pub columns: &'static [&'static str],
}

pub fn table_for(kind: ParserKind) -> &'static TableSpec {
    match kind {
        ParserKind::Summary => &summary::TABLE,
        ParserKind::Details => &details::TABLE,
        ParserKind::Price => &price::TABLE,
    }
}

pub fn source_column_for(kind: ParserKind) -> &'static str {
    match kind {
        ParserKind::Summary => summary::SOURCE_COLUMN,
        ParserKind::Details => details::SOURCE_COLUMN,
        ParserKind::Price => price::SOURCE_COLUMN,
    }
}

pub struct Pipeline {
    kind: ParserKind,
    stages: Vec<Stage>,
    normalizer: StringNormalizer,
}

impl Pipeline {
    pub fn for_kind(kind: ParserKind) -> Result<Self, PatternError> {
        let stages = match kind {
            ParserKind::Summary => summary::stages()?,
            ParserKind::Details => details::stages()?,
            ParserKind::Price => price::stages()?,
        };

        Ok(Self {
            kind,
            stages,
            normalizer: StringNormalizer::new(),
        })
    }

    pub fn with_normalizer(mut self, normalizer: StringNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn kind(&self) -> ParserKind {
        self.kind
    }

    pub fn table(&self) -> &'static TableSpec {
        table_for(self.kind)
    }

    pub fn source_column(&self) -> &'static str {
        source_column_for(self.kind)
    }

    /// Columns whose stored values feed the normalizer.
    pub fn normalized_fields(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Normalize { field } => Some(*field),
                _ => None,
            })
            .collect()
    }

    /// Runs every stage over the batch, one stage at a time.
    pub fn parse(&self, rows: &[SourceRow], references: &References) -> Vec<ParsedRecord> {
        let mut work: Vec<(String, ParsedRecord)> = rows
            .iter()
            .map(|row| (row.text.clone().unwrap_or_default(), ParsedRecord::new(row.id)))
            .collect();

        for stage in &self.stages {
            self.apply(stage, &mut work, references);
        }

        work.into_iter().map(|(_, record)| record).collect()
    }

    fn apply(&self, stage: &Stage, work: &mut [(String, ParsedRecord)], references: &References) {
        match stage {
            Stage::Extract {
                field,
                pattern,
                cast,
            } => {
                for (buffer, record) in work.iter_mut() {
                    let (value, remaining) = extract(buffer, pattern, *cast);
                    *buffer = remaining;
                    record.set(field_from(*field, value, pattern.as_str()));
                }
            }
            Stage::Flag { field, pattern } => {
                for (buffer, record) in work.iter_mut() {
                    let (value, remaining) = extract_flag(buffer, pattern);
                    *buffer = remaining;
                    record.set(field_from(*field, value, pattern.as_str()));
                }
            }
            Stage::Strip(stripper) => {
                for (buffer, _) in work.iter_mut() {
                    *buffer = stripper.apply(buffer);
                }
            }
            Stage::Split { field, rule, split } => {
                for (buffer, record) in work.iter_mut() {
                    let (value, remaining) = split(buffer.as_str());
                    *buffer = remaining;
                    record.set(field_from(*field, value, rule));
                }
            }
            Stage::Normalize { field } => {
                let values: Vec<Option<String>> = work
                    .iter()
                    .map(|(_, record)| record.text(field).map(ToOwned::to_owned))
                    .collect();
                let empty = ReferenceCounts::new();
                let reference = references.get(field).unwrap_or(&empty);

                let normalized = self.normalizer.normalize(&values, reference);
                for ((_, record), value) in work.iter_mut().zip(normalized) {
                    record.replace_value(*field, value.map(Value::Text));
                }
            }
            Stage::Remainder { field } => {
                for (buffer, record) in work.iter_mut() {
                    let rest = std::mem::take(buffer);
                    let value = (!rest.is_empty()).then_some(Value::Text(rest));
                    record.set(ParsedField {
                        name: *field,
                        value,
                        source_pattern: None,
                    });
                }
            }
        }
    }
}

fn field_from(name: &'static str, value: Option<Value>, source: &str) -> ParsedField {
    ParsedField {
        name,
        value,
        source_pattern: Some(source.to_string()),
    }
}

#[derive(Debug, Error)]
#[error("missing {count} ids after parsing: {sample:?}")]
pub struct IntegrityError {
    pub count: usize,
    /// Up to ten of the missing ids, ascending.
    pub sample: Vec<i64>,
}

/// Every input id must come back out of the pipeline.
pub fn validate_ids(input: &[SourceRow], output: &[ParsedRecord]) -> Result<(), IntegrityError> {
    let parsed: BTreeSet<i64> = output.iter().map(|record| record.id).collect();
    let missing: BTreeSet<i64> = input
        .iter()
        .map(|row| row.id)
        .filter(|id| !parsed.contains(id))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(IntegrityError {
        count: missing.len(),
        sample: missing.into_iter().take(10).collect(),
    })
}
