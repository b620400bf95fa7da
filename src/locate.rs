//! Span localization: find where an annotated fragment lives inside a
//! longer text.
//!
//! Human annotations reference document text imprecisely: trailing
//! punctuation, stray spaces, paraphrased boundaries. This module recovers
//! the best contiguous character span for a fragment with a cascade of
//! increasingly tolerant strategies:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ 1. exact substring                → confidence 1.0       │
//! │ 2. trailing 。 removed, exact     → confidence 1.0       │
//! │ 3. whitespace removed, exact      → confidence 1.0       │
//! │ 4. fuzzy Rouge-L window search    → confidence (0, 1]    │
//! │    no window scores above zero    → no match             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! All offsets are **character** indices (the documents are Chinese, where
//! byte offsets disagree on every CJK char), and `end` is inclusive,
//! matching the downstream `(doc, start, end)` label format.

use std::collections::HashSet;

use crate::rouge::RougeL;

/// A located span with its match confidence.
///
/// `start` and `end` are inclusive char offsets into the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (inclusive).
    pub end: usize,
    /// Match confidence in `(0, 1]`; 1.0 for exact matches.
    pub score: f64,
}

impl Located {
    /// An exact match of `len` chars beginning at `start`.
    #[must_use]
    pub const fn exact(start: usize, len: usize) -> Self {
        Self {
            start,
            end: start + len - 1,
            score: 1.0,
        }
    }

    /// Number of chars covered (inclusive range).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Inclusive ranges are never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Find the first occurrence of `fragment` in `container`, by char.
#[must_use]
pub fn find_sub(container: &[char], fragment: &[char]) -> Option<usize> {
    if fragment.is_empty() || fragment.len() > container.len() {
        return None;
    }
    container.windows(fragment.len()).position(|w| w == fragment)
}

/// Locate the best-matching span for `fragment` inside `container`.
///
/// Returns `None` when the fragment is unlocatable (no shared characters,
/// or either input is empty). Exact containment (directly, after removing
/// a trailing `。`, or after stripping whitespace) short-circuits with
/// confidence 1.0; otherwise a bounded fuzzy search runs (see
/// [`fuzzy_locate`]).
///
/// # Examples
///
/// ```
/// use mrcprep::locate::locate;
///
/// let container: Vec<char> = "他在北京市工作".chars().collect();
/// let fragment: Vec<char> = "北京市。".chars().collect();
/// let hit = locate(&fragment, &container).unwrap();
/// assert_eq!((hit.start, hit.end), (2, 4));
/// assert_eq!(hit.score, 1.0);
/// ```
#[must_use]
pub fn locate(fragment: &[char], container: &[char]) -> Option<Located> {
    if fragment.is_empty() || container.is_empty() {
        return None;
    }

    if let Some(start) = find_sub(container, fragment) {
        return Some(Located::exact(start, fragment.len()));
    }

    // Annotators often copy the sentence-final 。 that the document lacks.
    if fragment.last() == Some(&'。') && fragment.len() > 1 {
        let trimmed = &fragment[..fragment.len() - 1];
        if let Some(start) = find_sub(container, trimmed) {
            return Some(Located::exact(start, trimmed.len()));
        }
    }

    // Some annotations carry stray spaces that the cleaned document lacks.
    let squeezed: Vec<char> = fragment
        .iter()
        .copied()
        .filter(|c| !c.is_whitespace())
        .collect();
    if squeezed.len() < fragment.len() && !squeezed.is_empty() {
        if let Some(start) = find_sub(container, &squeezed) {
            return Some(Located::exact(start, squeezed.len()));
        }
    }

    fuzzy_locate(fragment, container)
}

/// Similarity-guided fallback search.
///
/// Enumerates candidate `[start, end]` windows whose boundary chars occur
/// in the fragment's character set, scoring each with Rouge-L and keeping
/// the maximum. Two prunings bound the cost:
///
/// - boundary chars outside the fragment's char set are skipped outright;
/// - the end-enumeration ceiling tightens to the best end found so far
///   (`last_end`), so later starts scan progressively shorter suffixes.
///
/// This is a heuristic, not an exhaustive-optimal search: char-set pruning
/// can discard a valid start that shares no character with very short
/// fragments, and equal-scoring windows resolve by first-found (earliest
/// start, then the larger end at that start, per the descending end scan).
/// Downstream achievability ceilings were computed against exactly this
/// behavior, so the tie-break order is part of the contract.
#[must_use]
pub fn fuzzy_locate(fragment: &[char], container: &[char]) -> Option<Located> {
    if fragment.is_empty() || container.is_empty() {
        return None;
    }

    let charset: HashSet<char> = fragment.iter().copied().collect();
    let rouge = RougeL::default();

    let mut best: Option<Located> = None;
    let mut best_score = 0.0f64;
    let mut last_end = container.len() - 1;

    // Start positions past len(container) - len(fragment) cannot begin a
    // window at least as long as the fragment (exclusive bound).
    let start_bound = container.len().saturating_sub(fragment.len());
    for start in 0..start_bound {
        if !charset.contains(&container[start]) {
            continue;
        }

        let ceiling = last_end;
        for end in (start..=ceiling).rev() {
            if !charset.contains(&container[end]) {
                continue;
            }

            let score = rouge.score(&container[start..=end], fragment);
            if score > best_score {
                best_score = score;
                best = Some(Located { start, end, score });
                last_end = end;
            }
        }
    }

    best
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Exact containment always resolves to the first occurrence with
        /// confidence 1.
        #[test]
        fn exact_containment_is_found(
            prefix in "[a-z北京上海是的首都中心。]{0,10}",
            frag in "[a-z北京上海是的首都中心。]{1,8}",
            suffix in "[a-z北京上海是的首都中心。]{0,10}",
        ) {
            let container: Vec<char> =
                format!("{prefix}{frag}{suffix}").chars().collect();
            let fragment: Vec<char> = frag.chars().collect();

            let hit = locate(&fragment, &container).unwrap();
            let expected = find_sub(&container, &fragment).unwrap();
            prop_assert_eq!(hit.start, expected);
            prop_assert_eq!(hit.end, expected + fragment.len() - 1);
            prop_assert!((hit.score - 1.0).abs() < 1e-9);
        }

        /// Whatever the inputs, a returned span stays inside the container
        /// and its confidence stays in (0, 1].
        #[test]
        fn located_span_valid(a in ".{1,20}", b in ".{1,20}") {
            let fragment: Vec<char> = a.chars().collect();
            let container: Vec<char> = b.chars().collect();
            if let Some(hit) = locate(&fragment, &container) {
                prop_assert!(hit.start <= hit.end);
                prop_assert!(hit.end < container.len());
                prop_assert!(hit.score > 0.0);
                prop_assert!(hit.score <= 1.0 + 1e-9);
            }
        }
    }
}
