use std::ops::Range;
use std::sync::Arc;

/// Immutable mono PCM at a fixed sample rate. Samples are floats in [-1, 1].
///
/// Trimming and slicing always produce a new buffer; nothing mutates in
/// place. Cloning is cheap (shared sample storage).
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SignalBuffer {
    /// Invariant: `sample_rate > 0`. A zero rate is a programming error, not
    /// a runtime condition, so this panics rather than returning a Result.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be positive");
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Concatenates captured frames into one contiguous buffer.
    pub fn from_frames<F: AsRef<[f32]>>(frames: &[F], sample_rate: u32) -> Self {
        let total: usize = frames.iter().map(|f| f.as_ref().len()).sum();
        let mut samples = Vec::with_capacity(total);
        for frame in frames {
            samples.extend_from_slice(frame.as_ref());
        }
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    /// Sample count for a span of milliseconds at this buffer's rate.
    pub fn ms_to_samples(&self, ms: u64) -> usize {
        ((self.sample_rate as u64 * ms) / 1000) as usize
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |p, &s| p.max(s.abs()))
    }

    /// New buffer over `range`, clamped to the underlying length.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let start = range.start.min(self.samples.len());
        let end = range.end.min(self.samples.len()).max(start);
        Self {
            samples: self.samples[start..end].into(),
            sample_rate: self.sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_frames_concatenates_in_order() {
        let frames = [vec![0.1f32, 0.2], vec![0.3], vec![], vec![0.4, 0.5]];
        let buf = SignalBuffer::from_frames(&frames, 16_000);
        assert_eq!(buf.samples(), &[0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(buf.sample_rate(), 16_000);
    }

    #[test]
    fn duration_and_sample_conversion() {
        let buf = SignalBuffer::new(vec![0.0; 16_000], 16_000);
        assert_eq!(buf.duration_ms(), 1000);
        assert_eq!(buf.ms_to_samples(100), 1600);
        assert_eq!(buf.ms_to_samples(20), 320);
    }

    #[test]
    fn slice_is_clamped_and_fresh() {
        let buf = SignalBuffer::new(vec![0.5; 100], 8000);
        let cut = buf.slice(50..500);
        assert_eq!(cut.len(), 50);
        // original untouched
        assert_eq!(buf.len(), 100);

        let empty = buf.slice(200..300);
        assert!(empty.is_empty());
    }

    #[test]
    fn peak_over_mixed_signs() {
        let buf = SignalBuffer::new(vec![0.1, -0.7, 0.3], 16_000);
        assert!((buf.peak() - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    #[should_panic(expected = "sample rate must be positive")]
    fn zero_sample_rate_rejected() {
        let _ = SignalBuffer::new(vec![], 0);
    }
}
