//! Delay voting between two fingerprint indices

use crate::config::TieBreak;
use crate::index::FrequencyIndex;
use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Vote tally of `sample_time - reference_time` over all matched landmark pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelayHistogram {
    votes: BTreeMap<i64, usize>,
}

/// Winning delay in frame-units, with its support
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayEstimate {
    /// Selected delay (frame-units); positive when the sample lags the reference
    pub delay_frames: i64,

    /// Votes for the selected delay
    pub votes: usize,

    /// Votes cast over all deltas
    pub total_votes: usize,

    /// Other deltas that received as many votes as the winner
    pub tied_deltas: Vec<i64>,
}

impl DelayEstimate {
    /// Whether another delay had the same support
    pub fn is_ambiguous(&self) -> bool {
        !self.tied_deltas.is_empty()
    }
}

impl DelayHistogram {
    /// Cross-match every time of every shared frequency bin
    pub fn from_indices(reference: &FrequencyIndex, sample: &FrequencyIndex) -> Self {
        let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
        for (_, sample_times, reference_times) in sample.shared_bins(reference) {
            for &sample_time in sample_times {
                for &reference_time in reference_times {
                    let delta = sample_time as i64 - reference_time as i64;
                    *votes.entry(delta).or_default() += 1;
                }
            }
        }
        Self { votes }
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Votes for one delta
    pub fn count(&self, delta: i64) -> usize {
        self.votes.get(&delta).copied().unwrap_or(0)
    }

    /// Number of distinct deltas
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn total_votes(&self) -> usize {
        self.votes.values().sum()
    }

    /// The `n` best `(delta, votes)` pairs, best first
    pub fn top(&self, n: usize, tie_break: TieBreak) -> Vec<(i64, usize)> {
        let mut ranked: Vec<(i64, usize)> = self.votes.iter().map(|(&d, &c)| (d, c)).collect();
        ranked.sort_by(|a, b| rank(*a, *b, tie_break));
        ranked.truncate(n);
        ranked
    }

    /// Select the most voted delta; fails when nothing matched
    pub fn best(&self, tie_break: TieBreak) -> Result<DelayEstimate> {
        log::debug!(
            "delay histogram: {} deltas from {} pairs",
            self.len(),
            self.total_votes()
        );

        let (delay_frames, votes) = self
            .votes
            .iter()
            .map(|(&d, &c)| (d, c))
            .min_by(|a, b| rank(*a, *b, tie_break))
            .ok_or(SyncError::NoOverlap)?;

        let tied_deltas = self
            .votes
            .iter()
            .filter(|&(&d, &c)| c == votes && d != delay_frames)
            .map(|(&d, _)| d)
            .collect();

        let estimate = DelayEstimate {
            delay_frames,
            votes,
            total_votes: self.total_votes(),
            tied_deltas,
        };
        if estimate.is_ambiguous() {
            log::warn!(
                "{} delays tie at {} votes; picked {} frames ({:?})",
                estimate.tied_deltas.len() + 1,
                estimate.votes,
                estimate.delay_frames,
                tie_break
            );
        }
        Ok(estimate)
    }
}

// Orders candidates best first: more votes, then the tie-break rule.
fn rank(a: (i64, usize), b: (i64, usize), tie_break: TieBreak) -> Ordering {
    b.1.cmp(&a.1).then_with(|| match tie_break {
        TieBreak::SmallestMagnitude => a.0.abs().cmp(&b.0.abs()).then(a.0.cmp(&b.0)),
        TieBreak::Earliest => a.0.cmp(&b.0),
        TieBreak::Latest => b.0.cmp(&a.0),
    })
}

/// Match two indices and pick the delay in frame-units
pub fn estimate_delay(
    reference: &FrequencyIndex,
    sample: &FrequencyIndex,
    tie_break: TieBreak,
) -> Result<DelayEstimate> {
    DelayHistogram::from_indices(reference, sample).best(tie_break)
}
