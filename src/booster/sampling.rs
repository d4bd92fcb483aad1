//! Weighted selection.
//!
//! Cumulative weights plus a binary search: O(n) to build, O(log n) per
//! draw. Zero-weight entries can never be selected, and a weight list whose
//! sum does not fit in `u64` is rejected rather than clamped.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Whether one slot may return the same card more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Every draw is independent; duplicates are possible.
    #[default]
    Independent,
    /// Draws within one slot never repeat a card.
    Distinct,
    /// Distinct unless the sheet allows duplicates.
    FollowSheet,
}

impl SamplingPolicy {
    pub fn allows_duplicates(self, sheet_allows: bool) -> bool {
        match self {
            Self::Independent => true,
            Self::Distinct => false,
            Self::FollowSheet => sheet_allows,
        }
    }
}

/// Why a weight list cannot be sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightError {
    /// Nothing has positive weight.
    Empty,
    /// The weights sum past `u64::MAX`.
    Overflow,
}

/// Prefix sums over a weight list.
#[derive(Debug, Clone)]
pub struct WeightedIndex {
    cumulative: Vec<u64>,
    total: u64,
}

impl WeightedIndex {
    pub fn new(weights: impl IntoIterator<Item = u64>) -> Result<Self, WeightError> {
        let mut total = 0u64;
        let mut cumulative = Vec::new();
        for w in weights {
            total = total.checked_add(w).ok_or(WeightError::Overflow)?;
            cumulative.push(total);
        }
        if total == 0 {
            return Err(WeightError::Empty);
        }
        Ok(Self { cumulative, total })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Index of the first cumulative weight exceeding a uniform draw in `[0, total)`.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        let draw = rng.random_range(0..self.total);
        self.cumulative.partition_point(|&c| c <= draw)
    }
}

/// Draw `count` items from weighted `entries`.
///
/// Without duplicates, each draw removes the picked item; asking for at
/// least as many items as have weight returns all of them shuffled.
pub fn draw<'a, R: Rng>(
    entries: &'a [(String, u64)],
    count: usize,
    duplicates: bool,
    rng: &mut R,
) -> Result<Vec<&'a str>, WeightError> {
    let index = WeightedIndex::new(entries.iter().map(|(_, w)| *w))?;
    if duplicates {
        return Ok((0..count)
            .map(|_| entries[index.sample(rng)].0.as_str())
            .collect());
    }

    let mut remaining: Vec<&(String, u64)> = entries.iter().filter(|(_, w)| *w > 0).collect();
    if count >= remaining.len() {
        remaining.shuffle(rng);
        return Ok(remaining.into_iter().map(|(id, _)| id.as_str()).collect());
    }

    let mut picked = Vec::with_capacity(count);
    for _ in 0..count {
        let index = WeightedIndex::new(remaining.iter().map(|(_, w)| *w))?;
        let (id, _) = remaining.swap_remove(index.sample(rng));
        picked.push(id.as_str());
    }
    Ok(picked)
}
