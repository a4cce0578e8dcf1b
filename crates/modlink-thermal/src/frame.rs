use crate::wire::{FRAME_SAMPLES, HEIGHT, WIDTH};

/// One complete decoded sensor frame.
///
/// Samples are row-major, already masked to 14 bits, and always exactly
/// [`FRAME_SAMPLES`] long. `min`/`max` are the range observed while decoding
/// and drive normalization in [`crate::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalFrame {
    samples: Box<[u16]>,
    min: u16,
    max: u16,
}

impl ThermalFrame {
    /// Build a frame from a full sample buffer, computing its range.
    ///
    /// Returns `None` unless `samples` holds exactly one frame.
    pub fn from_samples(samples: Vec<u16>) -> Option<Self> {
        if samples.len() != FRAME_SAMPLES {
            return None;
        }
        let min = samples.iter().copied().min()?;
        let max = samples.iter().copied().max()?;
        Some(Self {
            samples: samples.into_boxed_slice(),
            min,
            max,
        })
    }

    pub(crate) fn from_decoded(samples: Box<[u16]>, min: u16, max: u16) -> Self {
        debug_assert_eq!(samples.len(), FRAME_SAMPLES);
        Self { samples, min, max }
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Sample at column `x`, row `y`.
    pub fn sample(&self, x: usize, y: usize) -> Option<u16> {
        if x >= WIDTH || y >= HEIGHT {
            return None;
        }
        self.samples.get(y * WIDTH + x).copied()
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    /// True when every sample has the same value.
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_samples_computes_range() {
        let mut samples = vec![100u16; FRAME_SAMPLES];
        samples[10] = 42;
        samples[FRAME_SAMPLES - 1] = 9000;

        let frame = ThermalFrame::from_samples(samples).unwrap();
        assert_eq!((frame.min(), frame.max()), (42, 9000));
        assert_eq!(frame.sample(10, 0), Some(42));
        assert_eq!(frame.sample(WIDTH - 1, HEIGHT - 1), Some(9000));
        assert_eq!(frame.sample(WIDTH, 0), None);
        assert!(!frame.is_degenerate());
    }

    #[test]
    fn from_samples_rejects_partial_frame() {
        assert!(ThermalFrame::from_samples(vec![0; FRAME_SAMPLES - 1]).is_none());
    }
}
