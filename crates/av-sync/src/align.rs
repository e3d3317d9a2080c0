//! End-to-end alignment of two recordings

use crate::config::AlignConfig;
use crate::delay::DelayHistogram;
use crate::index::FrequencyIndex;
use crate::landmarks::{GridParams, LandmarkExtractor};
use crate::report::{AlignReport, AlignResult};
use crate::source::{WaveformSource, Workspace};
use crate::spectral::SpectralBinner;
use crate::waveform::Waveform;
use crate::{Result, SyncError};
use std::path::Path;

/// Number of histogram candidates kept in results
const CANDIDATES: usize = 5;

/// Landmark index of one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub index: FrequencyIndex,
    /// Complete frames analyzed
    pub frames: usize,
    /// Landmarks selected
    pub landmarks: usize,
}

/// Runs the fingerprint and delay pipeline with one configuration
pub struct Aligner {
    config: AlignConfig,
    binner: SpectralBinner,
    extractor: LandmarkExtractor,
}

impl Aligner {
    pub fn new(config: AlignConfig) -> Result<Self> {
        config.validate()?;
        let binner = SpectralBinner::new(config.frame_size, config.overlap)?;
        let extractor = LandmarkExtractor::new(GridParams::new(
            config.box_height,
            config.box_width,
            config.landmarks_per_cell,
        ));
        Ok(Self {
            config,
            binner,
            extractor,
        })
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Fingerprint the first `limit_secs` seconds of a waveform
    pub fn fingerprint(&self, waveform: &Waveform, limit_secs: Option<f64>) -> Result<Fingerprint> {
        let samples = waveform.head(limit_secs);
        let frames = self.binner.frame_count(samples.len());
        let landmarks = self.extractor.extract(self.binner.frames(samples))?;
        let index = FrequencyIndex::from_landmarks(&landmarks);

        log::debug!(
            "fingerprint: {} samples, {} frames, {} landmarks over {} bins",
            samples.len(),
            frames,
            landmarks.len(),
            index.num_bins()
        );

        Ok(Fingerprint {
            index,
            frames,
            landmarks: landmarks.len(),
        })
    }

    /// Estimate how far `sample` lags `reference`
    pub fn align(&self, reference: &Waveform, sample: &Waveform) -> Result<AlignResult> {
        if reference.sample_rate != sample.sample_rate {
            return Err(SyncError::SampleRateMismatch(
                reference.sample_rate,
                sample.sample_rate,
            ));
        }
        if reference.sample_rate == 0 {
            return Err(SyncError::Decode("sample rate of 0 Hz".into()));
        }

        let reference_print = self.fingerprint(reference, self.config.reference_limit_secs)?;
        let sample_print = self.fingerprint(sample, self.config.sample_limit_secs)?;

        let histogram = DelayHistogram::from_indices(&reference_print.index, &sample_print.index);
        let estimate = histogram.best(self.config.tie_break)?;

        let result = AlignResult::new(
            estimate,
            reference.sample_rate,
            self.binner.hop_size(),
            histogram.top(CANDIDATES, self.config.tie_break),
            reference_print.landmarks,
            sample_print.landmarks,
        );
        log::info!(
            "delay {} frames ({} s), {} of {} votes",
            result.delay_frames(),
            result.offset_seconds,
            result.estimate.votes,
            result.estimate.total_votes
        );
        Ok(result)
    }
}

/// Load both files through `source` and align them.
///
/// The extraction workspace lives exactly as long as this call and is removed
/// whether or not alignment succeeds.
pub fn align_files<P: AsRef<Path>>(
    reference_path: P,
    sample_path: P,
    source: &dyn WaveformSource,
    config: &AlignConfig,
) -> Result<AlignReport> {
    let reference_path = reference_path.as_ref();
    let sample_path = sample_path.as_ref();
    crate::ensure_inputs_exist(&[reference_path, sample_path])?;

    let aligner = Aligner::new(config.clone())?;
    let workspace = Workspace::acquire(config.extraction.temp_root.as_deref())?;

    let reference = source.load(reference_path, &workspace)?;
    let sample = source.load(sample_path, &workspace)?;
    let result = aligner.align(&reference, &sample)?;

    workspace.release()?;

    Ok(AlignReport::new(
        reference_path.display().to_string(),
        sample_path.display().to_string(),
        result,
    ))
}
