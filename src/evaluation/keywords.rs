//! Keyword extraction and rubric matching for answer scoring.
//!
//! Everything in this module is pure and deterministic; the evaluation
//! pipeline falls back to it whenever the external AI scorer is missing or
//! failing, so it must never touch the network.

use std::collections::HashSet;

/// Common English stop words stripped during keyword extraction.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "has", "have",
    "her", "him", "his", "how", "its", "our", "out", "she", "was", "were", "who", "why", "will",
    "with", "this", "that", "these", "those", "they", "them", "then", "than", "there", "their",
    "what", "when", "where", "which", "while", "would", "could", "should", "about", "above",
    "after", "again", "also", "been", "before", "being", "below", "between", "both", "does",
    "doing", "down", "during", "each", "from", "further", "here", "into", "just", "more", "most",
    "once", "only", "other", "over", "same", "some", "such", "under", "until", "very", "your",
    "yours", "because", "through",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Extracts normalized keyword tokens from free text: lowercased, split on
/// non-alphanumeric boundaries, stop words removed, tokens shorter than 3
/// characters discarded, deduplicated preserving first occurrence.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .filter(|token| token.chars().count() >= 3 && !is_stop_word(token))
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordMatch {
    pub matched_keywords: Vec<String>,
    pub score: u8,
    pub match_percentage: u8,
}

/// Scores candidate keywords against an expected-keyword rubric.
///
/// An empty rubric always scores 0 (cannot score without a rubric). A full
/// match is exactly 100 regardless of extra candidate keywords. Partial
/// matches get `min(100, round(pct * 1.2))` where `pct` is the raw match
/// percentage, rewarding partial coverage above linear.
pub fn match_keywords(candidate: &[String], expected: &[String]) -> KeywordMatch {
    let expected_set: HashSet<String> = expected.iter().map(|k| k.to_lowercase()).collect();
    if expected_set.is_empty() {
        return KeywordMatch {
            matched_keywords: Vec::new(),
            score: 0,
            match_percentage: 0,
        };
    }

    let mut seen = HashSet::new();
    let matched: Vec<String> = candidate
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| expected_set.contains(k))
        .filter(|k| seen.insert(k.clone()))
        .collect();

    let raw_percentage = (matched.len() as f64 / expected_set.len() as f64) * 100.0;

    let score = if matched.is_empty() {
        0
    } else if matched.len() == expected_set.len() {
        100
    } else {
        (raw_percentage * 1.2).round().min(100.0) as u8
    };

    KeywordMatch {
        matched_keywords: matched,
        score,
        match_percentage: raw_percentage.round() as u8,
    }
}

/// Normalized Levenshtein similarity (0-100) between two texts,
/// case-insensitive. Returns 0 when either side is empty.
pub fn text_similarity(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let distance = strsim::levenshtein(&a, &b);
    let max_len = a.chars().count().max(b.chars().count());
    (((max_len - distance) as f64 / max_len as f64) * 100.0).round() as u8
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub participant_keywords: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub score: u8,
    pub match_percentage: u8,
    pub text_similarity: u8,
}

/// Evaluates an answer against a rubric. When a reference answer is given,
/// the keyword score is blended with text similarity at 0.7/0.3.
pub fn evaluate_answer(
    answer: &str,
    expected_keywords: &[String],
    reference_answer: Option<&str>,
) -> EvaluationResult {
    let participant_keywords = extract_keywords(answer);
    let keyword_match = match_keywords(&participant_keywords, expected_keywords);

    let similarity = reference_answer
        .map(|reference| text_similarity(answer, reference))
        .unwrap_or(0);

    let score = match reference_answer {
        Some(_) => {
            (keyword_match.score as f64 * 0.7 + similarity as f64 * 0.3).round() as u8
        }
        None => keyword_match.score,
    };

    EvaluationResult {
        participant_keywords,
        matched_keywords: keyword_match.matched_keywords,
        score,
        match_percentage: keyword_match.match_percentage,
        text_similarity: similarity,
    }
}
