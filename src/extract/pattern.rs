use regex::{Regex, RegexBuilder};
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;

use super::strip::{Terms, strip_words, trim_boundary};

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid field pattern {pattern:?}: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("field pattern {pattern:?} must have exactly one capture group, found {found}")]
    GroupCount { pattern: String, found: usize },
}

/// Conversion applied to a captured group.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Cast {
    Text,
    Integer,
    Float,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Case-insensitive pattern locating one field inside a buffer.
///
/// With a trailing context the context must follow the match but is neither
/// captured nor removed from the buffer.
#[derive(Clone, Debug)]
pub struct FieldPattern {
    source: String,
    regex: Regex,
    has_context: bool,
}

impl FieldPattern {
    /// Pattern whose single capture group holds the value.
    pub fn value(pattern: &str) -> Result<Self, PatternError> {
        let compiled = Self::compile(pattern, pattern, false)?;
        compiled.expect_groups(1)?;
        Ok(compiled)
    }

    /// Value pattern that only matches when `context` comes right after it.
    pub fn followed_by(pattern: &str, context: &str) -> Result<Self, PatternError> {
        let compiled = Self::compile(pattern, &format!("({pattern})(?:{context})"), true)?;
        compiled.expect_groups(2)?;
        Ok(compiled)
    }

    /// Pattern whose mere presence is the value.
    pub fn presence(pattern: &str) -> Result<Self, PatternError> {
        Self::compile(pattern, pattern, false)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn compile(source: &str, full: &str, has_context: bool) -> Result<Self, PatternError> {
        let regex = RegexBuilder::new(full)
            .case_insensitive(true)
            .build()
            .map_err(|source_error| PatternError::Regex {
                pattern: source.to_string(),
                source: source_error,
            })?;

        Ok(Self {
            source: source.to_string(),
            regex,
            has_context,
        })
    }

    fn expect_groups(&self, groups: usize) -> Result<(), PatternError> {
        let found = self.regex.captures_len() - 1;
        if found != groups {
            return Err(PatternError::GroupCount {
                pattern: self.source.clone(),
                found: if self.has_context { found - 1 } else { found },
            });
        }
        Ok(())
    }

    /// Returns the span to remove and the captured value text.
    fn find<'t>(&self, text: &'t str) -> Option<(&'t str, Option<&'t str>)> {
        let captures = self.regex.captures(text)?;
        let (span_group, value_group) = if self.has_context { (1, 2) } else { (0, 1) };
        let span = captures.get(span_group)?.as_str();
        let value = captures.get(value_group).map(|m| m.as_str());
        Some((span, value))
    }
}

/// Pulls one value out of `buffer`.
///
/// Every occurrence of the whole matched span is stripped from the buffer,
/// not just the captured group. A miss or a failed cast yields `None`.
pub fn extract(buffer: &str, pattern: &FieldPattern, cast: Cast) -> (Option<Value>, String) {
    let working = buffer.trim();

    let Some((span, captured)) = pattern.find(working) else {
        return (None, trim_boundary(working).to_string());
    };

    let value = captured.and_then(|text| cast_value(text, cast));
    let remaining = strip_words(working, Terms::List(&[span.to_string()]));

    (value, remaining)
}

/// Reports whether `pattern` occurs in `buffer`, stripping it when it does.
pub fn extract_flag(buffer: &str, pattern: &FieldPattern) -> (Option<Value>, String) {
    let working = buffer.trim();

    match pattern.find(working) {
        Some((span, _)) => (
            Some(Value::Flag(true)),
            strip_words(working, Terms::List(&[span.to_string()])),
        ),
        None => (Some(Value::Flag(false)), trim_boundary(working).to_string()),
    }
}

fn cast_value(captured: &str, cast: Cast) -> Option<Value> {
    match cast {
        Cast::Text => {
            let cleaned = clean_text(captured);
            (!cleaned.is_empty()).then(|| Value::Text(cleaned.to_string()))
        }
        Cast::Integer => numeric_digits(captured).parse::<i64>().ok().map(Value::Integer),
        Cast::Float => numeric_digits(captured).parse::<f64>().ok().map(Value::Float),
    }
}

/// "120 000" and "120,000" both read as 120000.
fn numeric_digits(captured: &str) -> String {
    captured
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '.')
        .collect()
}

fn clean_text(captured: &str) -> &str {
    let trimmed = captured.trim_matches(|c: char| !is_word_char(c));
    trim_boundary(trimmed)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || is_combining_mark(c)
}
