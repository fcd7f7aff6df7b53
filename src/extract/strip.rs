use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Characters peeled off both ends of every buffer and extracted string.
pub const BOUNDARY_CHARS: &[char] = &['-', ',', ' ', '_', '•'];

/// Words to remove from a buffer.
#[derive(Debug, Clone, Copy)]
pub enum Terms<'a> {
    /// Human-readable phrase, removed word by word.
    Phrase(&'a str),
    /// Exact strings, each removed as a whole.
    List(&'a [String]),
}

impl Terms<'_> {
    fn tokens(self) -> Vec<String> {
        match self {
            Terms::Phrase(phrase) => phrase
                .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c.is_whitespace()))
                .flat_map(str::split_whitespace)
                .map(ToOwned::to_owned)
                .collect(),
            Terms::List(words) => words.to_vec(),
        }
    }
}

/// Compiled removal rule for a fixed set of terms.
///
/// Tokens are matched case-insensitively both as escaped literals and as raw
/// patterns, literals first. A raw form that is not a valid pattern is
/// dropped and only the literal alternation is used.
#[derive(Debug, Clone)]
pub struct WordStripper {
    regex: Option<Regex>,
}

impl WordStripper {
    pub fn new(terms: Terms<'_>) -> Self {
        let tokens: Vec<String> = terms
            .tokens()
            .into_iter()
            .filter(|token| !token.trim().is_empty())
            .collect();
        let escaped: Vec<String> = tokens
            .iter()
            .map(|token| regex::escape(token.trim()))
            .collect();

        if escaped.is_empty() {
            return Self { regex: None };
        }

        let literal_and_raw = alternation(escaped.iter().chain(tokens.iter()));
        let regex = match build_case_insensitive(&literal_and_raw) {
            Ok(regex) => Some(regex),
            Err(_) => match build_case_insensitive(&alternation(escaped.iter())) {
                Ok(regex) => Some(regex),
                Err(error) => {
                    warn!(error = %error, "failed to compile word list; buffer left as is");
                    None
                }
            },
        };

        Self { regex }
    }

    pub fn apply(&self, text: &str) -> String {
        match &self.regex {
            None => trim_boundary(text).to_string(),
            Some(regex) => {
                let removed = regex.replace_all(text, "");
                trim_boundary(&collapse_whitespace(&removed)).to_string()
            }
        }
    }
}

/// Removes every occurrence of `terms` from `text`.
pub fn strip_words(text: &str, terms: Terms<'_>) -> String {
    WordStripper::new(terms).apply(text)
}

pub fn trim_boundary(text: &str) -> &str {
    text.trim_matches(BOUNDARY_CHARS)
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn alternation<'a>(parts: impl Iterator<Item = &'a String>) -> String {
    let joined = parts.map(String::as_str).collect::<Vec<&str>>().join("|");
    format!("(?:{joined})")
}

fn build_case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}
