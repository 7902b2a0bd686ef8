//! Matcher Module
//!
//! Reconciles noisy OCR lines with the canonical vocabulary: exact lookup
//! first, then the closest entry by Ratcliff/Obershelp similarity.

use crate::vocabulary::Vocabulary;
use log::{info, warn};
use std::collections::BTreeSet;

/// Result of matching a set of candidates against the vocabulary.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// Canonical names accepted into the result.
    pub matched: BTreeSet<String>,
    /// Fuzzy corrections as (candidate, canonical) pairs.
    pub corrections: Vec<(String, String)>,
    /// Candidates dropped for lack of a close enough entry.
    pub unmatched: Vec<String>,
}

/// Similarity of two strings in `[0.0, 1.0]`: twice the number of matching
/// characters over the total length.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Sum of the matching blocks found by recursively taking the longest common
/// block and repeating on both sides of it.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
/// Among equally long blocks the one starting earliest in `a`, then in `b`,
/// wins.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
    // cur[j - blo + 1]: length of the common run ending at a[i], b[j]
    let mut prev = vec![0usize; bhi - blo + 1];
    let mut cur = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        for j in blo..bhi {
            let idx = j - blo + 1;
            if a[i] == b[j] {
                let len = prev[idx - 1] + 1;
                cur[idx] = len;
                if len > best_len {
                    best_i = i + 1 - len;
                    best_j = j + 1 - len;
                    best_len = len;
                }
            } else {
                cur[idx] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    (best_i, best_j, best_len)
}

/// Best vocabulary entry for `word` scoring at least `cutoff`.
///
/// Equal scores resolve to the lexicographically greatest entry.
pub fn closest_match<'v>(
    word: &str,
    vocabulary: &'v Vocabulary,
    cutoff: f64,
) -> Option<(&'v str, f64)> {
    let mut best: Option<(&'v str, f64)> = None;
    for entry in vocabulary.iter() {
        let score = sequence_ratio(entry, word);
        if score < cutoff {
            continue;
        }
        // Sorted iteration: a later entry with an equal score is greater.
        match best {
            Some((_, best_score)) if score < best_score => {}
            _ => best = Some((entry, score)),
        }
    }
    best
}

/// Maps every candidate to a canonical vocabulary entry, dropping the ones
/// that have none.
pub fn match_items<'c, I>(candidates: I, vocabulary: &Vocabulary, cutoff: f64) -> MatchOutcome
where
    I: IntoIterator<Item = &'c String>,
{
    let mut outcome = MatchOutcome::default();
    for candidate in candidates {
        if vocabulary.contains(candidate) {
            outcome.matched.insert(candidate.clone());
            continue;
        }

        match closest_match(candidate, vocabulary, cutoff) {
            Some((canonical, score)) => {
                info!("Matched {:?} to {:?} (score {:.3})", candidate, canonical, score);
                outcome.matched.insert(canonical.to_string());
                outcome
                    .corrections
                    .push((candidate.clone(), canonical.to_string()));
            }
            None => {
                warn!("No match found for {:?}", candidate);
                outcome.unmatched.push(candidate.clone());
            }
        }
    }
    outcome
}
