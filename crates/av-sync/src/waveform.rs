//! Decoded mono audio

/// Single-channel integer samples at a fixed rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waveform {
    /// Sample amplitudes
    pub samples: Vec<i32>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<i32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build a mono waveform from interleaved frames by averaging channels
    pub fn from_interleaved(interleaved: &[i32], num_channels: usize, sample_rate: u32) -> Self {
        Self::new(downmix(interleaved, num_channels), sample_rate)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples covering at most the first `limit_secs` seconds
    pub fn head(&self, limit_secs: Option<f64>) -> &[i32] {
        match limit_secs {
            Some(secs) => {
                let limit = (self.sample_rate as f64 * secs) as usize;
                &self.samples[..limit.min(self.samples.len())]
            }
            None => &self.samples,
        }
    }
}

/// Average interleaved channels into one
pub(crate) fn downmix(interleaved: &[i32], num_channels: usize) -> Vec<i32> {
    if num_channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(num_channels)
        .map(|frame| {
            let sum: i64 = frame.iter().map(|&s| s as i64).sum();
            (sum / num_channels as i64) as i32
        })
        .collect()
}
