//! # Similarity scorer
//! Dice's coefficient over character bigrams, the metric used to decide
//! whether two chat messages are near-duplicates.
//!
//! Pure and deterministic; no state, no I/O. Thresholding against the score
//! is the caller's business (see the repetition cache).

use std::collections::HashMap;

/// Degree of similarity of two strings in the range `[0.0, 1.0]`.
///
/// Whitespace is stripped from both inputs before comparison; it is never
/// significant for repetition detection. Bigrams are taken over Unicode
/// scalar values (`char`), not code units, so non-Latin text scores the
/// same regardless of its UTF encoding.
///
/// Edge cases: two blank strings are maximally similar (1.0); a blank
/// string never matches a non-blank one (0.0); inputs shorter than one
/// bigram only match by exact equality.
pub fn similarity(first: &str, second: &str) -> f64 {
    let a: Vec<char> = first.chars().filter(|c| !c.is_whitespace()).collect();
    let b: Vec<char> = second.chars().filter(|c| !c.is_whitespace()).collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    // Equal single-char inputs were caught by the identity check above.
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    // Multiset of `a`'s bigrams, with per-bigram multiplicity.
    let mut bigrams: HashMap<(char, char), u32> = HashMap::with_capacity(a.len() - 1);
    for w in a.windows(2) {
        *bigrams.entry((w[0], w[1])).or_insert(0) += 1;
    }

    // Multiset intersection: a repeated bigram in `b` only matches as many
    // times as it remains available in `a`.
    let mut intersection: usize = 0;
    for w in b.windows(2) {
        if let Some(count) = bigrams.get_mut(&(w[0], w[1])) {
            if *count > 0 {
                *count -= 1;
                intersection += 1;
            }
        }
    }

    2.0 * intersection as f64 / (a.len() + b.len() - 2) as f64
}
