// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lexical similarity (Jaro-Winkler).
//!
//! Scores are in `[0, 1]`: `1.0` for identical non-empty strings, `0.0` when
//! either side is empty or no characters match. Comparison is per Unicode
//! scalar value, so Cyrillic titles score the same as ASCII ones.

/// Winkler prefix boost only applies above this Jaro score
const BOOST_THRESHOLD: f64 = 0.7;
/// Longest common prefix that earns a boost
const MAX_PREFIX: usize = 4;
const PREFIX_SCALE: f64 = 0.1;

/// Jaro similarity.
pub fn jaro(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let window = (a.len().max(b.len()) / 2).saturating_sub(1);

    let mut a_matched = vec![false; a.len()];
    let mut b_matched = vec![false; b.len()];
    let mut matches = 0usize;

    for (i, ca) in a.iter().enumerate() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(b.len());
        for j in start..end {
            if !b_matched[j] && b[j] == *ca {
                a_matched[i] = true;
                b_matched[j] = true;
                matches += 1;
                break;
            }
        }
    }

    if matches == 0 {
        return 0.0;
    }

    // Matched characters out of order, counted in pairs
    let mut half_transpositions = 0usize;
    let mut k = 0usize;
    for (i, ca) in a.iter().enumerate() {
        if !a_matched[i] {
            continue;
        }
        while !b_matched[k] {
            k += 1;
        }
        if *ca != b[k] {
            half_transpositions += 1;
        }
        k += 1;
    }

    let m = matches as f64;
    let t = (half_transpositions / 2) as f64;
    (m / a.len() as f64 + m / b.len() as f64 + (m - t) / m) / 3.0
}

/// Jaro-Winkler similarity: Jaro plus a bonus for a shared prefix of up to
/// four characters.
///
/// # Example
///
/// ```
/// use catalog_engine::search::similarity;
///
/// assert_eq!(similarity("розы", "розы"), 1.0);
/// assert!(similarity("роз", "розы красные") > 0.5);
/// assert_eq!(similarity("роз", "тюльпан"), 0.0);
/// ```
pub fn similarity(a: &str, b: &str) -> f64 {
    let score = jaro(a, b);
    if score < BOOST_THRESHOLD {
        return score;
    }

    let prefix = a
        .chars()
        .zip(b.chars())
        .take(MAX_PREFIX)
        .take_while(|(x, y)| x == y)
        .count();

    (score + PREFIX_SCALE * prefix as f64 * (1.0 - score)).min(1.0)
}
