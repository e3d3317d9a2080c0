//! Frequency-to-time lookup built from one track's landmarks

use crate::landmarks::Landmark;
use std::collections::BTreeMap;

/// Maps each landmark frequency bin to the frames it occurred in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyIndex {
    bins: BTreeMap<usize, Vec<usize>>,
}

impl FrequencyIndex {
    pub fn from_landmarks(landmarks: &[Landmark]) -> Self {
        let mut bins: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for landmark in landmarks {
            bins.entry(landmark.freq_index)
                .or_default()
                .push(landmark.time_index);
        }
        Self { bins }
    }

    /// Time indices recorded for a frequency bin
    pub fn times(&self, freq_index: usize) -> &[usize] {
        self.bins.get(&freq_index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct frequency bins present
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    /// Total number of (frequency, time) entries
    pub fn num_entries(&self) -> usize {
        self.bins.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.bins.iter().map(|(&freq, times)| (freq, times.as_slice()))
    }

    /// Bins present in both indices, with each side's time indices
    pub fn shared_bins<'a>(
        &'a self,
        other: &'a FrequencyIndex,
    ) -> impl Iterator<Item = (usize, &'a [usize], &'a [usize])> + 'a {
        self.iter().filter_map(move |(freq, times)| {
            other
                .bins
                .get(&freq)
                .map(|other_times| (freq, times, other_times.as_slice()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(time_index: usize, freq_index: usize) -> Landmark {
        Landmark {
            time_index,
            freq_index,
            magnitude: 1.0,
        }
    }

    #[test]
    fn test_groups_times_by_frequency() {
        let index = FrequencyIndex::from_landmarks(&[lm(0, 5), lm(3, 5), lm(1, 9)]);
        assert_eq!(index.times(5), &[0, 3]);
        assert_eq!(index.times(9), &[1]);
        assert!(index.times(7).is_empty());
        assert_eq!(index.num_bins(), 2);
        assert_eq!(index.num_entries(), 3);
    }

    #[test]
    fn test_shared_bins() {
        let a = FrequencyIndex::from_landmarks(&[lm(0, 1), lm(2, 4), lm(5, 8)]);
        let b = FrequencyIndex::from_landmarks(&[lm(7, 4), lm(9, 8), lm(9, 10)]);
        let shared: Vec<usize> = a.shared_bins(&b).map(|(f, _, _)| f).collect();
        assert_eq!(shared, vec![4, 8]);
    }

    #[test]
    fn test_empty() {
        let index = FrequencyIndex::from_landmarks(&[]);
        assert!(index.is_empty());
        assert_eq!(index.shared_bins(&index).count(), 0);
    }
}
