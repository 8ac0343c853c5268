//! Pure text utilities shared by the transformer and the entity matcher.
//!
//! Every function here is total and deterministic. Scores stay in `[0, 1]`.

use std::collections::BTreeSet;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::app_config::MatchThresholds;

/// Words too common to say anything about which entity an item mentions.
const STOP_WORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "been", "but", "can", "for", "from",
    "has", "have", "into", "its", "just", "more", "new", "not", "now", "our", "out", "over",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "was",
    "were", "what", "when", "which", "while", "who", "will", "with", "you", "your",
];

const MIN_KEYWORD_LEN: usize = 3;

/// Lowercase, strip diacritics and punctuation, collapse whitespace.
///
/// `normalize("GPT-4o!!") == normalize("gpt 4o") == "gpt 4o"`.
#[must_use]
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unique, stop-word-free tokens of at least three characters.
#[must_use]
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    normalize(text)
        .split(' ')
        .filter(|token| token.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two sets; `0.0` when both are empty.
#[must_use]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    ratio(intersection, union)
}

/// Blend of keyword Jaccard and normalized edit-distance ratio, weighted with
/// the default token weight.
///
/// Symmetric. `1.0` for identical normalized strings, `0.0` when either side
/// normalizes to empty.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    similarity_weighted(a, b, MatchThresholds::DEFAULT_TOKEN_WEIGHT)
}

/// [`similarity`] with an explicit Jaccard weight; the edit ratio gets
/// `1 - token_weight`.
#[must_use]
pub fn similarity_weighted(a: &str, b: &str, token_weight: f64) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let weight = if token_weight.is_finite() {
        token_weight.clamp(0.0, 1.0)
    } else {
        MatchThresholds::DEFAULT_TOKEN_WEIGHT
    };

    let token_overlap = jaccard(&extract_keywords(&a), &extract_keywords(&b));
    let edit_ratio = strsim::normalized_levenshtein(&a, &b);

    (weight * token_overlap + (1.0 - weight) * edit_ratio).clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    numerator as f64 / denominator as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("GPT-4o!!"), "gpt 4o");
        assert_eq!(normalize("gpt 4o"), "gpt 4o");
        assert_eq!(normalize("  Claude\t3.5   Sonnet "), "claude 3 5 sonnet");
    }

    #[test]
    fn normalize_strips_diacritics() {
        assert_eq!(normalize("Café Mistral Élan"), "cafe mistral elan");
    }

    #[test]
    fn normalize_empty_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("!!! ---"), "");
    }

    #[test]
    fn extract_keywords_drops_stop_words_and_short_tokens() {
        let keywords = extract_keywords("The new Llama model is out for AI devs");
        let expected: BTreeSet<String> = ["llama", "model", "devs"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        assert_eq!(keywords, expected);
    }

    #[test]
    fn jaccard_handles_empty_sets() {
        assert!(jaccard(&BTreeSet::new(), &BTreeSet::new()).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_of_identical_normalized_strings_is_one() {
        for x in ["GPT-4o", "Claude 3 Opus", "cursor", "Ünïcödé"] {
            assert!((similarity(&normalize(x), &normalize(x)) - 1.0).abs() < f64::EPSILON);
        }
        assert!((similarity("GPT-4o!!", "gpt 4o") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_with_empty_input_is_zero() {
        assert!(similarity("", "gpt").abs() < f64::EPSILON);
        assert!(similarity("gpt", "  ").abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        let pairs = [
            ("GPT-4o", "GPT-4 Turbo"),
            ("Claude 3 Opus", "claude opus"),
            ("Cursor", "Cursor editor adds agents"),
            ("a", "completely different text"),
        ];
        for (a, b) in pairs {
            let ab = similarity(a, b);
            let ba = similarity(b, a);
            assert!((ab - ba).abs() < 1e-12, "{a} vs {b}: {ab} != {ba}");
            assert!((0.0..=1.0).contains(&ab));
        }
    }

    #[test]
    fn similarity_weighted_clamps_weight() {
        let high = similarity_weighted("llama three", "llama four", 5.0);
        let full = similarity_weighted("llama three", "llama four", 1.0);
        assert!((high - full).abs() < f64::EPSILON);
    }
}
