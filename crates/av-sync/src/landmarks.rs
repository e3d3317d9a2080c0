//! Per-cell landmark selection over the time/frequency grid

use crate::spectral::Frame;
use crate::Result;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Shape and capacity of the landmark grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridParams {
    /// Frequency bins per cell
    pub box_height: usize,
    /// Frames per cell
    pub box_width: usize,
    /// Maximum landmarks kept per cell
    pub landmarks_per_cell: usize,
}

impl GridParams {
    pub fn new(box_height: usize, box_width: usize, landmarks_per_cell: usize) -> Self {
        Self {
            box_height,
            box_width,
            landmarks_per_cell,
        }
    }

    /// Cell containing the point `(time_index, freq_index)`
    pub fn cell_of(&self, time_index: usize, freq_index: usize) -> CellId {
        CellId {
            time_block: time_index / self.box_width,
            freq_block: freq_index / self.box_height,
        }
    }
}

/// Grid cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    pub time_block: usize,
    pub freq_block: usize,
}

/// A spectral point kept as a fingerprint feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub time_index: usize,
    pub freq_index: usize,
    pub magnitude: f64,
}

impl Eq for Landmark {}

impl Ord for Landmark {
    // Magnitude first; position only settles exact ties
    fn cmp(&self, other: &Self) -> Ordering {
        self.magnitude
            .total_cmp(&other.magnitude)
            .then(self.time_index.cmp(&other.time_index))
            .then(self.freq_index.cmp(&other.freq_index))
    }
}

impl PartialOrd for Landmark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fixed-capacity min-heap holding the strongest points of one cell.
///
/// A point is admitted freely while under capacity. At capacity it must be
/// strictly stronger than the weakest held point, which it replaces. Exactly
/// one point is evicted per admission, so the cell never exceeds capacity;
/// among equally weak points the earliest (then lowest bin) goes first.
#[derive(Debug, Clone)]
struct CellMaxima {
    capacity: usize,
    heap: BinaryHeap<Reverse<Landmark>>,
}

impl CellMaxima {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    fn offer(&mut self, point: Landmark) {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(point));
            return;
        }
        if let Some(Reverse(weakest)) = self.heap.peek() {
            if point.magnitude > weakest.magnitude {
                self.heap.pop();
                self.heap.push(Reverse(point));
            }
        }
    }

    fn drain_into(&mut self, out: &mut Vec<Landmark>) {
        out.extend(self.heap.drain().map(|Reverse(point)| point));
    }
}

/// Selects the strongest spectral points of every grid cell
#[derive(Debug, Clone)]
pub struct LandmarkExtractor {
    grid: GridParams,
}

impl LandmarkExtractor {
    pub fn new(grid: GridParams) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> GridParams {
        self.grid
    }

    /// Consume a frame sequence and return its landmarks ordered by time, then frequency.
    ///
    /// Frames must arrive in index order; a column of cells is finalized once
    /// the sequence moves past its time block.
    pub fn extract<I>(&self, frames: I) -> Result<Vec<Landmark>>
    where
        I: IntoIterator<Item = Result<Frame>>,
    {
        let mut landmarks = Vec::new();
        let mut column: Vec<CellMaxima> = Vec::new();
        let mut current_block = None;

        for frame in frames {
            let frame = frame?;
            let time_block = frame.index / self.grid.box_width;

            if current_block != Some(time_block) {
                flush_column(&mut column, &mut landmarks);
                current_block = Some(time_block);
            }

            let needed = frame.magnitudes.len().div_ceil(self.grid.box_height);
            if column.len() < needed {
                column.resize_with(needed, || CellMaxima::new(self.grid.landmarks_per_cell));
            }

            for (freq_index, &magnitude) in frame.magnitudes.iter().enumerate() {
                column[freq_index / self.grid.box_height].offer(Landmark {
                    time_index: frame.index,
                    freq_index,
                    magnitude,
                });
            }
        }
        flush_column(&mut column, &mut landmarks);

        Ok(landmarks)
    }
}

fn flush_column(column: &mut Vec<CellMaxima>, out: &mut Vec<Landmark>) {
    let start = out.len();
    for cell in column.iter_mut() {
        cell.drain_into(out);
    }
    out[start..].sort_by_key(|l| (l.time_index, l.freq_index));
    column.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn frame(index: usize, magnitudes: Vec<f64>) -> Result<Frame> {
        Ok(Frame { index, magnitudes })
    }

    #[test]
    fn test_cell_of_integer_division() {
        let grid = GridParams::new(512, 43, 7);
        assert_eq!(
            grid.cell_of(42, 511),
            CellId {
                time_block: 0,
                freq_block: 0
            }
        );
        assert_eq!(
            grid.cell_of(43, 512),
            CellId {
                time_block: 1,
                freq_block: 1
            }
        );
    }

    #[test]
    fn test_keeps_strongest_per_cell() {
        let extractor = LandmarkExtractor::new(GridParams::new(4, 2, 2));
        let frames = vec![
            frame(0, vec![1.0, 9.0, 3.0, 4.0]),
            frame(1, vec![8.0, 2.0, 7.0, 0.5]),
        ];

        let landmarks = extractor.extract(frames).unwrap();
        let points: Vec<(usize, usize)> = landmarks
            .iter()
            .map(|l| (l.time_index, l.freq_index))
            .collect();
        assert_eq!(points, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_under_capacity_admits_everything() {
        let extractor = LandmarkExtractor::new(GridParams::new(8, 8, 5));
        let landmarks = extractor
            .extract(vec![frame(0, vec![0.0, 0.0, 1.0])])
            .unwrap();
        assert_eq!(landmarks.len(), 3);
    }

    #[test]
    fn test_equal_point_does_not_displace() {
        let extractor = LandmarkExtractor::new(GridParams::new(8, 8, 1));
        let landmarks = extractor
            .extract(vec![frame(0, vec![5.0, 5.0]), frame(1, vec![5.0, 4.0])])
            .unwrap();
        assert_eq!(landmarks.len(), 1);
        assert_eq!((landmarks[0].time_index, landmarks[0].freq_index), (0, 0));
    }

    #[test]
    fn test_tied_minimum_evicts_one() {
        let extractor = LandmarkExtractor::new(GridParams::new(8, 8, 3));
        let landmarks = extractor
            .extract(vec![frame(0, vec![2.0, 2.0, 2.0, 6.0])])
            .unwrap();
        assert_eq!(landmarks.len(), 3);
        let bins: Vec<usize> = landmarks.iter().map(|l| l.freq_index).collect();
        assert_eq!(bins, vec![1, 2, 3]);
    }

    #[test]
    fn test_cap_respected_across_grid() {
        let grid = GridParams::new(3, 4, 2);
        let extractor = LandmarkExtractor::new(grid);
        let frames: Vec<Result<Frame>> = (0..10)
            .map(|t| {
                frame(
                    t,
                    (0..10).map(|f| ((t * 31 + f * 17) % 23) as f64).collect(),
                )
            })
            .collect();

        let landmarks = extractor.extract(frames).unwrap();
        let mut per_cell: HashMap<CellId, usize> = HashMap::new();
        for l in &landmarks {
            *per_cell.entry(grid.cell_of(l.time_index, l.freq_index)).or_default() += 1;
        }
        // 3 time blocks x 4 frequency blocks
        assert_eq!(per_cell.len(), 12);
        assert!(per_cell.values().all(|&n| n <= 2));
    }

    #[test]
    fn test_output_ordered_by_time() {
        let extractor = LandmarkExtractor::new(GridParams::new(2, 1, 1));
        let landmarks = extractor
            .extract(vec![
                frame(0, vec![1.0, 0.0, 0.0, 3.0]),
                frame(1, vec![0.0, 2.0, 5.0, 0.0]),
            ])
            .unwrap();
        let points: Vec<(usize, usize)> = landmarks
            .iter()
            .map(|l| (l.time_index, l.freq_index))
            .collect();
        assert_eq!(points, vec![(0, 0), (0, 3), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_frame_error_propagates() {
        let extractor = LandmarkExtractor::new(GridParams::new(2, 1, 1));
        let frames = vec![Err(crate::SyncError::Fft("boom".into()))];
        assert!(extractor.extract(frames).is_err());
    }
}
