//! Framing and magnitude spectra

use crate::{Result, SyncError};
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Magnitude spectrum of one analysis window
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the frame sequence (frame-units)
    pub index: usize,

    /// `frame_size / 2` magnitudes, rounded to two decimals
    pub magnitudes: Vec<f64>,
}

/// Cuts a waveform into fixed-size frames and computes their spectra.
///
/// No window function is applied: each frame is transformed as-is
/// (rectangular window).
pub struct SpectralBinner {
    frame_size: usize,
    hop_size: usize,
    fft: Arc<dyn RealToComplex<f64>>,
}

impl SpectralBinner {
    /// Create a binner producing `frame_size` windows that share `overlap` samples
    pub fn new(frame_size: usize, overlap: usize) -> Result<Self> {
        if frame_size < 2 || overlap >= frame_size {
            return Err(SyncError::InvalidConfig(format!(
                "cannot frame with size {} and overlap {}",
                frame_size, overlap
            )));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(frame_size);

        Ok(Self {
            frame_size,
            hop_size: frame_size - overlap,
            fft,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples between consecutive frame starts
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of magnitudes per frame
    pub fn num_bins(&self) -> usize {
        self.frame_size / 2
    }

    /// Number of complete frames `samples` yields
    pub fn frame_count(&self, num_samples: usize) -> usize {
        if num_samples < self.frame_size {
            0
        } else {
            (num_samples - self.frame_size) / self.hop_size + 1
        }
    }

    /// Lazily iterate the frames of `samples`; a short trailing window is dropped
    pub fn frames<'a>(&'a self, samples: &'a [i32]) -> Frames<'a> {
        Frames {
            binner: self,
            samples,
            next_index: 0,
            input: self.fft.make_input_vec(),
            spectrum: self.fft.make_output_vec(),
        }
    }
}

/// Iterator over the frames of one waveform
pub struct Frames<'a> {
    binner: &'a SpectralBinner,
    samples: &'a [i32],
    next_index: usize,
    input: Vec<f64>,
    spectrum: Vec<Complex64>,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_index * self.binner.hop_size;
        let window = self.samples.get(start..start + self.binner.frame_size)?;

        for (dst, &src) in self.input.iter_mut().zip(window) {
            *dst = src as f64;
        }

        if let Err(e) = self.binner.fft.process(&mut self.input, &mut self.spectrum) {
            return Some(Err(SyncError::Fft(e.to_string())));
        }

        let magnitudes = self.spectrum[..self.binner.num_bins()]
            .iter()
            .map(|bin| round_to(bin.norm(), 2))
            .collect();

        let index = self.next_index;
        self.next_index += 1;
        Some(Ok(Frame { index, magnitudes }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .binner
            .frame_count(self.samples.len())
            .saturating_sub(self.next_index);
        (remaining, Some(remaining))
    }
}

/// Round to a fixed number of decimal places
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
