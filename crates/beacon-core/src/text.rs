// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-set helpers shared by matching, detection, and repetition checks.
//!
//! Text is lowercased, split on anything that is not alphanumeric, and
//! filtered of stopwords and tokens shorter than two characters. Numbers are
//! dropped so "treadmill #3" and "treadmill #5" share a signature.

use std::collections::BTreeSet;

/// Common English words that carry no category signal.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "get", "got", "had",
    "has", "have", "he", "her", "here", "him", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "just", "me", "my", "no", "not", "of", "on", "or", "our", "out", "please", "she", "so",
    "some", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "those", "time", "to", "too", "up", "us", "very", "was", "we", "week", "were", "what", "when",
    "where", "which", "who", "why", "will", "with", "would", "you", "your", "third", "second",
    "first", "still", "today", "yesterday",
];

/// Split text into its normalized token set.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Jaccard similarity |A ∩ B| / |A ∪ B|, 0 when both are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Overlap coefficient |A ∩ B| / min(|A|, |B|), 0 when either is empty.
pub fn overlap_coefficient(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / smaller as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn tokenize_drops_stopwords_numbers_and_punctuation() {
        let tokens = tokenize("Treadmill #3 is broken again, third time this week");
        assert_eq!(tokens, set(&["broken", "treadmill"]));
    }

    #[test]
    fn tokenize_is_case_insensitive() {
        assert_eq!(tokenize("SHOWER Cold"), tokenize("shower cold"));
    }

    #[test]
    fn jaccard_of_disjoint_and_identical() {
        assert_eq!(jaccard(&set(&["a1"]), &set(&["b1"])), 0.0);
        assert_eq!(jaccard(&set(&["a1", "b1"]), &set(&["a1", "b1"])), 1.0);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }

    #[test]
    fn overlap_uses_smaller_set() {
        let small = set(&["locker", "broken"]);
        let big = set(&["locker", "broken", "key", "room", "door"]);
        assert_eq!(overlap_coefficient(&small, &big), 1.0);
    }

    proptest! {
        #[test]
        fn similarities_are_bounded(a in proptest::collection::btree_set("[a-d]{2}", 0..6),
                                    b in proptest::collection::btree_set("[a-d]{2}", 0..6)) {
            let j = jaccard(&a, &b);
            let o = overlap_coefficient(&a, &b);
            prop_assert!((0.0..=1.0).contains(&j));
            prop_assert!((0.0..=1.0).contains(&o));
            prop_assert!(o >= j);
        }
    }
}
