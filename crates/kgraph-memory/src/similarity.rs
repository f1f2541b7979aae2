//! String similarity scoring in `[0, 1]`.
//!
//! Two modes are offered: literal (normalized Levenshtein, case-insensitive)
//! and semantic, which blends literal similarity over normalized names with
//! keyword cosine similarity.

use std::collections::HashMap;

const SEMANTIC_EDIT_WEIGHT: f64 = 0.7;
const SEMANTIC_KEYWORD_WEIGHT: f64 = 0.3;
const MIN_KEYWORD_CHARS: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "has", "have",
    "had", "not", "but", "its", "into", "than", "then", "they", "them", "their", "there", "you",
    "your", "our", "can", "will", "would", "should", "could", "been", "being", "also", "any",
    "all", "who", "what", "which", "when", "where", "how",
];

const VERB_PREFIXES: &[&str] = &[
    "get", "set", "create", "make", "delete", "remove", "find", "search", "update", "modify",
    "fetch", "add", "is", "has",
];

const NAME_SUFFIXES: &[&str] = &[
    "handler", "manager", "service", "util", "utils", "helper", "impl",
];

const SYNONYMS: &[(&str, &str)] = &[
    ("make", "create"),
    ("remove", "delete"),
    ("search", "find"),
    ("modify", "update"),
    ("fetch", "get"),
];

/// How two strings are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Normalized edit similarity only.
    #[default]
    Literal,
    /// Edit similarity over normalized names blended with keyword overlap.
    Semantic,
}

impl MatchMode {
    pub fn from_semantic_flag(semantic: bool) -> Self {
        if semantic {
            Self::Semantic
        } else {
            Self::Literal
        }
    }
}

/// Scores `left` against `right` under `mode`.
pub fn similarity(left: &str, right: &str, mode: MatchMode) -> f64 {
    match mode {
        MatchMode::Literal => edit_similarity(left, right),
        MatchMode::Semantic => semantic_similarity(left, right),
    }
}

/// Levenshtein edit distance over Unicode scalar values.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    if a.is_empty() {
        return b.chars().count();
    }
    if b.is_empty() {
        return a.chars().count();
    }

    let b_chars = b.chars().collect::<Vec<_>>();
    let mut previous = (0..=b_chars.len()).collect::<Vec<_>>();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, left) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, right) in b_chars.iter().enumerate() {
            let substitution_cost = usize::from(left != *right);
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            let substitution = previous[j] + substitution_cost;
            current[j + 1] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

/// `1 - distance / max_len`, case-insensitive. Identical inputs (including two
/// empty strings) score 1.0.
pub fn edit_similarity(left: &str, right: &str) -> f64 {
    let left = left.to_lowercase();
    let right = right.to_lowercase();
    if left == right {
        return 1.0;
    }
    let max_len = left.chars().count().max(right.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein_distance(&left, &right);
    (1.0 - distance as f64 / max_len as f64).clamp(0.0, 1.0)
}

/// Lowercase words of at least three characters, minus stopwords, with
/// near-synonym verbs mapped onto their canonical form.
pub fn extract_keywords(text: &str) -> Vec<String> {
    split_identifier_words(text)
        .into_iter()
        .filter(|word| word.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .map(|word| canonical_synonym(&word).to_string())
        .collect()
}

/// Cosine similarity of keyword term-frequency vectors. Zero when either side
/// has no keywords.
pub fn keyword_similarity(left: &str, right: &str) -> f64 {
    let left_terms = term_frequencies(extract_keywords(left));
    let right_terms = term_frequencies(extract_keywords(right));
    cosine(&left_terms, &right_terms)
}

/// Splits identifier-style text into lowercase words, strips one leading verb
/// and one trailing role suffix, and maps near-synonym verbs onto a canonical
/// form.
pub fn normalize_name(text: &str) -> String {
    let mut words = split_identifier_words(text);
    if words.len() > 1 && VERB_PREFIXES.contains(&words[0].as_str()) {
        words.remove(0);
    }
    if words.len() > 1
        && words
            .last()
            .is_some_and(|word| NAME_SUFFIXES.contains(&word.as_str()))
    {
        words.pop();
    }
    words
        .into_iter()
        .map(|word| canonical_synonym(&word).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `0.7 * edit(normalized) + 0.3 * keyword cosine`; falls back to the
/// normalized edit similarity when neither side has keywords.
pub fn semantic_similarity(left: &str, right: &str) -> f64 {
    if left.to_lowercase() == right.to_lowercase() {
        return 1.0;
    }
    let normalized_edit = edit_similarity(&normalize_name(left), &normalize_name(right));
    let left_terms = term_frequencies(extract_keywords(left));
    let right_terms = term_frequencies(extract_keywords(right));
    if left_terms.is_empty() && right_terms.is_empty() {
        return normalized_edit;
    }
    let keyword = cosine(&left_terms, &right_terms);
    (SEMANTIC_EDIT_WEIGHT * normalized_edit + SEMANTIC_KEYWORD_WEIGHT * keyword).clamp(0.0, 1.0)
}

fn canonical_synonym(word: &str) -> &str {
    SYNONYMS
        .iter()
        .find(|(variant, _)| *variant == word)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(word)
}

fn split_identifier_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in text.split(|character: char| !character.is_alphanumeric()) {
        let characters = chunk.chars().collect::<Vec<_>>();
        let mut current = String::new();
        for (position, character) in characters.iter().enumerate() {
            if position > 0 && character.is_uppercase() && !current.is_empty() {
                let previous = characters[position - 1];
                let next_is_lower = characters
                    .get(position + 1)
                    .is_some_and(|next| next.is_lowercase());
                let boundary = previous.is_lowercase()
                    || previous.is_numeric()
                    || (previous.is_uppercase() && next_is_lower);
                if boundary {
                    words.push(std::mem::take(&mut current).to_lowercase());
                }
            }
            current.push(*character);
        }
        if !current.is_empty() {
            words.push(current.to_lowercase());
        }
    }
    words
}

fn term_frequencies(terms: Vec<String>) -> HashMap<String, f64> {
    let mut frequencies = HashMap::new();
    for term in terms {
        *frequencies.entry(term).or_insert(0.0) += 1.0;
    }
    frequencies
}

fn cosine(left: &HashMap<String, f64>, right: &HashMap<String, f64>) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let dot = left
        .iter()
        .filter_map(|(term, weight)| right.get(term).map(|other| weight * other))
        .sum::<f64>();
    let left_norm = left.values().map(|weight| weight * weight).sum::<f64>().sqrt();
    let right_norm = right.values().map(|weight| weight * weight).sum::<f64>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    (dot / (left_norm * right_norm)).clamp(0.0, 1.0)
}
