//! Reconciles spelling, encoding and case variants of entity names.
//!
//! Values are grouped by a comparison key (diacritics, case and separators
//! removed) together with the values already stored in the column. Each group
//! collapses to a single representative: stored values win over fresh ones,
//! higher occurrence counts win next, then the better formatted spelling.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Stored value to number of rows carrying it.
pub type ReferenceCounts = HashMap<String, i64>;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Clone, Copy, Debug, Default)]
pub struct StringNormalizer {
    similarity_threshold: Option<f64>,
}

impl StringNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also snaps values with no exact-key match to the closest stored value
    /// scoring at least `threshold`.
    pub fn with_similarity_threshold(threshold: f64) -> Self {
        Self {
            similarity_threshold: Some(threshold),
        }
    }

    /// Maps every value to its representative; output is parallel to `values`.
    pub fn normalize(
        &self,
        values: &[Option<String>],
        reference: &ReferenceCounts,
    ) -> Vec<Option<String>> {
        let mut normalized = normalize_exact(values, reference);

        if let Some(threshold) = self.similarity_threshold {
            snap_to_reference(&mut normalized, reference, threshold);
        }

        normalized
    }
}

/// NFD, combining marks dropped, lower-cased, `-_.` and whitespace removed.
pub fn comparison_key(text: &str) -> String {
    text.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '.') && !c.is_whitespace())
        .collect()
}

fn normalize_exact(values: &[Option<String>], reference: &ReferenceCounts) -> Vec<Option<String>> {
    let mut batch_counts: HashMap<&str, i64> = HashMap::new();
    for value in values.iter().flatten() {
        if !value.trim().is_empty() {
            *batch_counts.entry(value.as_str()).or_default() += 1;
        }
    }

    if batch_counts.is_empty() {
        return values.to_vec();
    }

    let mut classes: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    let known = reference
        .keys()
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty());
    for value in batch_counts.keys().copied().chain(known) {
        classes
            .entry(comparison_key(value))
            .or_default()
            .insert(value);
    }

    let mut representatives: HashMap<&str, &str> = HashMap::new();
    for members in classes.values().filter(|members| members.len() > 1) {
        let stored: Vec<&str> = members
            .iter()
            .copied()
            .filter(|member| reference.contains_key(*member))
            .collect();

        let best = if stored.is_empty() {
            let fresh: Vec<&str> = members.iter().copied().collect();
            most_frequent(&fresh, |member| batch_counts.get(member).copied().unwrap_or(0))
        } else {
            most_frequent(&stored, |member| reference.get(member).copied().unwrap_or(0))
        };

        let Some(best) = best else {
            continue;
        };
        for member in members
            .iter()
            .copied()
            .filter(|member| batch_counts.contains_key(member))
        {
            representatives.insert(member, best);
        }
    }

    values
        .iter()
        .map(|value| {
            value.as_ref().map(|text| {
                representatives
                    .get(text.as_str())
                    .map(|best| best.to_string())
                    .unwrap_or_else(|| text.clone())
            })
        })
        .collect()
}

fn most_frequent<'a>(candidates: &[&'a str], count: impl Fn(&str) -> i64) -> Option<&'a str> {
    let top = candidates.iter().map(|&candidate| count(candidate)).max()?;
    let tied: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|&candidate| count(candidate) == top)
        .collect();
    best_format(&tied)
}

/// Highest formatting score; the first candidate in order keeps ties.
fn best_format<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for &candidate in candidates {
        let score = format_score(candidate);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}

pub(crate) fn format_score(word: &str) -> f64 {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return 0.0;
    };
    let rest = chars.as_str();

    let mut score = 0.0;
    if first.is_uppercase() && !is_all_upper(rest) {
        score += 10.0;
    } else if is_all_upper(word) && word.chars().count() <= 4 {
        score += 8.0;
    } else if rest.chars().any(char::is_uppercase) {
        score += 7.0;
    }

    if !word.is_ascii() {
        score += 5.0;
    }
    if word.contains('-') {
        score += 3.0;
    }

    score += word.chars().count() as f64 * 0.1;

    let lowered = first.to_lowercase().next().unwrap_or(first);
    score -= u32::from(lowered) as f64 * 0.01;

    score
}

/// At least one cased character and no lower-case ones.
fn is_all_upper(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

fn snap_to_reference(values: &mut [Option<String>], reference: &ReferenceCounts, threshold: f64) {
    if reference.is_empty() {
        return;
    }

    let mut known: Vec<(&str, String)> = reference
        .keys()
        .map(|key| (key.as_str(), key.to_lowercase()))
        .collect();
    known.sort();

    for value in values.iter_mut().flatten() {
        if reference.contains_key(value.as_str()) {
            continue;
        }

        let lowered = value.to_lowercase();
        let mut best: Option<(&str, f64)> = None;
        for &(key, ref key_lowered) in &known {
            let score = strsim::normalized_levenshtein(&lowered, key_lowered);
            if score >= threshold && best.is_none_or(|(_, top)| score > top) {
                best = Some((key, score));
            }
        }

        if let Some((key, _)) = best {
            *value = key.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|value| Some(value.to_string())).collect()
    }

    fn reference(entries: &[(&str, i64)]) -> ReferenceCounts {
        entries
            .iter()
            .map(|(value, count)| (value.to_string(), *count))
            .collect()
    }

    #[test]
    fn comparison_key_ignores_diacritics_case_and_separators() {
        assert_eq!(comparison_key("Citroën"), "citroen");
        assert_eq!(comparison_key(" Mercedes-Benz "), "mercedesbenz");
        assert_eq!(comparison_key("mercedes benz"), "mercedesbenz");
        assert_eq!(comparison_key("Land_Rover."), "landrover");
    }

    #[test]
    fn title_case_outscores_acronym_spelling() {
        let normalized = StringNormalizer::new().normalize(&batch(&["BMW", "Bmw", "bmw "]), &HashMap::new());
        assert_eq!(normalized, batch(&["Bmw", "Bmw", "Bmw"]));

        assert!(format_score("Bmw") > format_score("BMW"));
        assert!(format_score("BMW") > format_score("bmw "));
    }

    #[test]
    fn batch_frequency_beats_formatting_without_reference() {
        let normalized =
            StringNormalizer::new().normalize(&batch(&["BMW", "BMW", "Bmw"]), &HashMap::new());
        assert_eq!(normalized, batch(&["BMW", "BMW", "BMW"]));
    }

    #[test]
    fn reference_value_always_wins_its_class() {
        let known = reference(&[("BMW", 3), ("Audi", 10)]);
        let normalized = StringNormalizer::new().normalize(&batch(&["Bmw", "bmw", "Bmw"]), &known);
        assert_eq!(normalized, batch(&["BMW", "BMW", "BMW"]));
    }

    #[test]
    fn most_frequent_reference_variant_is_chosen() {
        let known = reference(&[("Citroen", 2), ("Citroën", 40)]);
        let normalized = StringNormalizer::new().normalize(&batch(&["CITROEN"]), &known);
        assert_eq!(normalized, batch(&["Citroën"]));
    }

    #[test]
    fn singletons_and_missing_values_pass_through() {
        let values = vec![Some("Skoda".to_string()), None, Some("  ".to_string())];
        let normalized = StringNormalizer::new().normalize(&values, &reference(&[("Audi", 1)]));
        assert_eq!(normalized, values);
    }

    #[test]
    fn normalization_is_deterministic() {
        let values = batch(&["mercedes-benz", "Mercedes Benz", "MERCEDES-BENZ", "Opel", "opel"]);
        let first = StringNormalizer::new().normalize(&values, &HashMap::new());
        for _ in 0..10 {
            assert_eq!(StringNormalizer::new().normalize(&values, &HashMap::new()), first);
        }
        assert_eq!(first[0], first[1]);
        assert_eq!(first[1], first[2]);
        assert_eq!(first[3], Some("Opel".to_string()));
        assert_eq!(first[4], Some("Opel".to_string()));
    }

    #[test]
    fn fuzzy_pass_snaps_misspellings_to_reference() {
        let known = reference(&[("Volkswagen", 12), ("Volvo", 4)]);
        let values = batch(&["Volkswagn", "Fiat"]);

        let exact = StringNormalizer::new().normalize(&values, &known);
        assert_eq!(exact, values);

        let fuzzy = StringNormalizer::with_similarity_threshold(DEFAULT_SIMILARITY_THRESHOLD)
            .normalize(&values, &known);
        assert_eq!(fuzzy, batch(&["Volkswagen", "Fiat"]));
    }
}
