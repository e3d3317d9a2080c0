//! # av-sync
//!
//! Estimates the time offset between two recordings of the same event by
//! matching quantized spectral landmarks.
//!
//! ## Pipeline
//!
//! ```text
//! Waveform ─► SpectralBinner ─► LandmarkExtractor ─► FrequencyIndex ─┐
//!                                                                    ├─► DelayHistogram ─► AlignResult
//! Waveform ─► SpectralBinner ─► LandmarkExtractor ─► FrequencyIndex ─┘
//! ```
//!
//! Each track is cut into fixed-size frames, the (time, frequency) plane is
//! split into a grid of cells and the strongest few points per cell are kept
//! as landmarks. Landmarks sharing a frequency bin across the two tracks vote
//! for their time difference; the most voted difference is the delay.
//!
//! ## Example
//!
//! ```rust,ignore
//! use av_sync::{align_files, AlignConfig, FfmpegSource};
//!
//! let config = AlignConfig::default();
//! let source = FfmpegSource::new(config.extraction.clone());
//! let report = align_files("camera.mp4", "recorder.mp4", &source, &config)?;
//! println!("{}", report);
//! ```

pub mod align;
pub mod config;
pub mod delay;
pub mod index;
pub mod landmarks;
pub mod report;
pub mod source;
pub mod spectral;
pub mod waveform;

pub use align::{align_files, Aligner, Fingerprint};
pub use config::{AlignConfig, ExtractionConfig, TieBreak};
pub use delay::{estimate_delay, DelayEstimate, DelayHistogram};
pub use index::FrequencyIndex;
pub use landmarks::{CellId, GridParams, Landmark, LandmarkExtractor};
pub use report::{AlignReport, AlignResult, SyncDecision};
pub use source::{decode_native, read_wav, FfmpegSource, NativeSource, WaveformSource, Workspace};
pub use spectral::{Frame, Frames, SpectralBinner};
pub use waveform::Waveform;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while aligning two recordings
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{0} does not exist")]
    MissingInput(PathBuf),

    #[error("Audio extraction failed for {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Cannot determine sync: the recordings share no fingerprint frequency bins")]
    NoOverlap,

    #[error("Sample rate mismatch: reference={0}Hz, sample={1}Hz")]
    SampleRateMismatch(u32, u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for SyncError {
    fn from(err: hound::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for SyncError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Check that both inputs exist before any work is done
pub fn ensure_inputs_exist<P: AsRef<std::path::Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SyncError::MissingInput(path.to_path_buf()));
        }
    }
    Ok(())
}
