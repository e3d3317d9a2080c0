//! Configuration for alignment runs

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rule used to pick a delay when several deltas share the highest vote count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Smallest absolute delta; between `-d` and `+d` the negative one wins
    #[default]
    SmallestMagnitude,
    /// Smallest delta value
    Earliest,
    /// Largest delta value
    Latest,
}

/// Settings for the external media-to-audio step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Extraction program (ffmpeg-compatible command line)
    pub program: String,

    /// Resample extracted audio to this rate (Hz); `None` keeps the native rate
    pub sample_rate: Option<u32>,

    /// Parent directory for the per-comparison workspace (system temp if `None`)
    pub temp_root: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".into(),
            sample_rate: Some(44100),
            temp_root: None,
        }
    }
}

/// Configuration for a single alignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Samples per analysis frame
    pub frame_size: usize,

    /// Samples shared by consecutive frames
    pub overlap: usize,

    /// Frequency bins per grid cell
    pub box_height: usize,

    /// Frames per grid cell
    pub box_width: usize,

    /// Landmarks kept per grid cell
    pub landmarks_per_cell: usize,

    /// Seconds of the reference track analyzed (`None` = whole track)
    pub reference_limit_secs: Option<f64>,

    /// Seconds of the sample track analyzed (`None` = whole track)
    pub sample_limit_secs: Option<f64>,

    /// Tie-break between equally voted delays
    pub tie_break: TieBreak,

    /// External extraction settings
    pub extraction: ExtractionConfig,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            overlap: 0,
            box_height: 512,
            box_width: 43, // ~1 s of frames at 44.1 kHz
            landmarks_per_cell: 7,
            reference_limit_secs: Some(120.0),
            sample_limit_secs: Some(60.0),
            tie_break: TieBreak::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl AlignConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            SyncError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Samples between the starts of consecutive frames (one frame-unit)
    pub fn hop_size(&self) -> usize {
        self.frame_size - self.overlap
    }

    /// Reject parameter combinations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 2 || self.frame_size % 2 != 0 {
            return Err(SyncError::InvalidConfig(format!(
                "frame size must be even and at least 2, got {}",
                self.frame_size
            )));
        }
        if self.overlap >= self.frame_size {
            return Err(SyncError::InvalidConfig(format!(
                "overlap {} must be smaller than frame size {}",
                self.overlap, self.frame_size
            )));
        }
        if self.box_height == 0 || self.box_width == 0 {
            return Err(SyncError::InvalidConfig(
                "grid cells must be at least one bin by one frame".into(),
            ));
        }
        if self.landmarks_per_cell == 0 {
            return Err(SyncError::InvalidConfig(
                "at least one landmark per cell is required".into(),
            ));
        }
        for (name, limit) in [
            ("reference", self.reference_limit_secs),
            ("sample", self.sample_limit_secs),
        ] {
            if let Some(secs) = limit {
                if !(secs.is_finite() && secs > 0.0) {
                    return Err(SyncError::InvalidConfig(format!(
                        "{} limit must be a positive number of seconds, got {}",
                        name, secs
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builder pattern: set frame size and overlap
    pub fn with_frame(mut self, frame_size: usize, overlap: usize) -> Self {
        self.frame_size = frame_size;
        self.overlap = overlap;
        self
    }

    /// Builder pattern: set grid cell shape and capacity
    pub fn with_grid(mut self, box_height: usize, box_width: usize, per_cell: usize) -> Self {
        self.box_height = box_height;
        self.box_width = box_width;
        self.landmarks_per_cell = per_cell;
        self
    }

    /// Builder pattern: set analysis bounds in seconds
    pub fn with_limits(mut self, reference: Option<f64>, sample: Option<f64>) -> Self {
        self.reference_limit_secs = reference;
        self.sample_limit_secs = sample;
        self
    }

    /// Builder pattern: set tie-break rule
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Builder pattern: set extraction program
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.extraction.program = program.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AlignConfig::default();
        assert_eq!(config.frame_size, 1024);
        assert_eq!(config.hop_size(), 1024);
        assert_eq!(config.landmarks_per_cell, 7);
        assert_eq!(config.reference_limit_secs, Some(120.0));
        assert_eq!(config.sample_limit_secs, Some(60.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = AlignConfig::default()
            .with_frame(2048, 512)
            .with_grid(64, 20, 3)
            .with_tie_break(TieBreak::Latest);

        assert_eq!(config.hop_size(), 1536);
        assert_eq!(config.box_height, 64);
        assert_eq!(config.box_width, 20);
        assert_eq!(config.landmarks_per_cell, 3);
        assert_eq!(config.tie_break, TieBreak::Latest);
    }

    #[test]
    fn test_validate_rejects_bad_frames() {
        assert!(AlignConfig::default().with_frame(1023, 0).validate().is_err());
        assert!(AlignConfig::default().with_frame(1024, 1024).validate().is_err());
        assert!(AlignConfig::default().with_grid(0, 43, 7).validate().is_err());
        assert!(AlignConfig::default().with_grid(512, 43, 0).validate().is_err());
        assert!(AlignConfig::default()
            .with_limits(Some(-1.0), None)
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AlignConfig =
            serde_json::from_str(r#"{ "overlap": 512, "tie_break": "earliest" }"#).unwrap();
        assert_eq!(config.frame_size, 1024);
        assert_eq!(config.overlap, 512);
        assert_eq!(config.tie_break, TieBreak::Earliest);
        assert_eq!(config.extraction.program, "ffmpeg");
    }
}
