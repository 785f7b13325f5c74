//! Near-duplicate detection for capability/cached-code descriptions.
//! Word-overlap scoring applied as a write-time guard: a
//! Jaccard-over-word-bags comparison between free-text descriptions.

use std::collections::HashSet;

/// Jaccard overlap between the lowercased word bags of `a` and `b`,
/// ignoring punctuation. `1.0` for identical non-empty strings, `0.0`
/// when either is empty or the two share no words.
pub fn description_overlap(a: &str, b: &str) -> f64 {
    let words_of = |s: &str| -> HashSet<String> {
        s.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_string())
            .collect()
    };

    let a_words = words_of(a);
    let b_words = words_of(b);

    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }

    let intersection = a_words.intersection(&b_words).count();
    let union = a_words.union(&b_words).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
