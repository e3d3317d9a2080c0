//! Delay-to-seconds conversion and human-readable results

use crate::delay::DelayEstimate;
use crate::spectral::round_to;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which recording has to be cut, and by how much
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncDecision {
    /// Delay of zero frames
    InSync,
    /// Reference has extra audio at its start
    TruncateReference { seconds: f64 },
    /// Sample has extra audio at its start
    TruncateSample { seconds: f64 },
}

/// Outcome of matching two fingerprints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignResult {
    /// Winning delay and its vote counts
    pub estimate: DelayEstimate,

    /// Frame-units per second of audio
    pub frames_per_second: f64,

    /// Signed offset in seconds (positive: sample lags), four decimals
    pub offset_seconds: f64,

    /// Best delay candidates as `(delta, votes)`
    pub candidates: Vec<(i64, usize)>,

    /// Landmarks in the reference fingerprint
    pub reference_landmarks: usize,

    /// Landmarks in the sample fingerprint
    pub sample_landmarks: usize,
}

impl AlignResult {
    /// Convert a frame-unit delay to seconds
    pub fn new(
        estimate: DelayEstimate,
        sample_rate: u32,
        hop_size: usize,
        candidates: Vec<(i64, usize)>,
        reference_landmarks: usize,
        sample_landmarks: usize,
    ) -> Self {
        let frames_per_second = sample_rate as f64 / hop_size as f64;
        let offset_seconds = round_to(estimate.delay_frames as f64 / frames_per_second, 4);
        Self {
            estimate,
            frames_per_second,
            offset_seconds,
            candidates,
            reference_landmarks,
            sample_landmarks,
        }
    }

    pub fn delay_frames(&self) -> i64 {
        self.estimate.delay_frames
    }

    pub fn decision(&self) -> SyncDecision {
        match self.estimate.delay_frames {
            0 => SyncDecision::InSync,
            d if d > 0 => SyncDecision::TruncateSample {
                seconds: self.offset_seconds,
            },
            _ => SyncDecision::TruncateReference {
                seconds: self.offset_seconds.abs(),
            },
        }
    }

    pub fn is_in_sync(&self) -> bool {
        self.decision() == SyncDecision::InSync
    }
}

/// Result of aligning two named files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignReport {
    pub reference_path: String,
    pub sample_path: String,
    pub decision: SyncDecision,
    pub result: AlignResult,
}

impl AlignReport {
    pub fn new(
        reference_path: impl Into<String>,
        sample_path: impl Into<String>,
        result: AlignResult,
    ) -> Self {
        Self {
            reference_path: reference_path.into(),
            sample_path: sample_path.into(),
            decision: result.decision(),
            result,
        }
    }

    /// File to truncate and by how many seconds
    pub fn truncation(&self) -> Option<(&str, f64)> {
        match self.decision {
            SyncDecision::InSync => None,
            SyncDecision::TruncateReference { seconds } => {
                Some((self.reference_path.as_str(), seconds))
            }
            SyncDecision::TruncateSample { seconds } => Some((self.sample_path.as_str(), seconds)),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }

    /// Multi-line report including the vote table
    pub fn detailed_report(&self) -> String {
        let mut report = format!("{}\n\n", self);
        report.push_str(&format!("Reference: {}\n", self.reference_path));
        report.push_str(&format!("  Landmarks: {}\n", self.result.reference_landmarks));
        report.push_str(&format!("Sample: {}\n", self.sample_path));
        report.push_str(&format!("  Landmarks: {}\n\n", self.result.sample_landmarks));
        report.push_str(&format!(
            "Delay: {} frames at {:.3} frames/s ({} of {} votes)\n",
            self.result.estimate.delay_frames,
            self.result.frames_per_second,
            self.result.estimate.votes,
            self.result.estimate.total_votes
        ));
        report.push_str("Candidates:\n");
        for (delta, votes) in &self.result.candidates {
            report.push_str(&format!("  {:>8} frames  {:>6} votes\n", delta, votes));
        }
        report
    }
}

impl fmt::Display for AlignReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.truncation() {
            None => write!(f, "files are in sync already")?,
            Some((path, seconds)) => {
                write!(f, "{} needs to be truncated by {} seconds", path, seconds)?
            }
        }
        let estimate = &self.result.estimate;
        if estimate.is_ambiguous() {
            write!(
                f,
                "\nnote: {} other delay(s) tied at {} votes ({:?}); this is a best-effort answer",
                estimate.tied_deltas.len(),
                estimate.votes,
                estimate.tied_deltas
            )?;
        }
        Ok(())
    }
}
