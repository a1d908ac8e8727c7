/// Instantaneous peak and RMS amplitude over one analysis frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameLevel {
    pub peak: f32,
    pub rms: f32,
}

pub struct LevelMeter {
    epsilon: f32,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self { epsilon: 1e-10 }
    }

    /// O(N), deterministic. An empty frame yields zeros for both figures.
    pub fn measure(&self, frame: &[f32]) -> FrameLevel {
        if frame.is_empty() {
            return FrameLevel::default();
        }
        let mut peak = 0.0f32;
        let mut sum_sq = 0.0f64;
        for &s in frame {
            peak = peak.max(s.abs());
            sum_sq += (s as f64) * (s as f64);
        }
        FrameLevel {
            peak,
            rms: (sum_sq / frame.len() as f64).sqrt() as f32,
        }
    }

    pub fn rms_to_dbfs(&self, rms: f32) -> f32 {
        if rms <= self.epsilon {
            return -100.0;
        }
        20.0 * rms.log10()
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of adjacent sample pairs that change sign. High-frequency,
/// low-amplitude fricatives ("s", "f") show up here when pure amplitude
/// thresholding misses them.
pub fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let mut crosses = 0usize;
    for pair in frame.windows(2) {
        if (pair[0] > 0.0) != (pair[1] > 0.0) {
            crosses += 1;
        }
    }
    crosses as f32 / frame.len() as f32
}

/// Input-level classification for the settings meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelStatus {
    Low,
    Good,
    Clipping,
}

/// The meter scale amplifies peak by 400x into a 0..100 percent range so
/// normal speech sits mid-scale; above 95% the input is clipping.
pub fn classify_peak(peak: f32) -> LevelStatus {
    let percent = (peak * 400.0).clamp(0.0, 100.0);
    if percent > 95.0 {
        LevelStatus::Clipping
    } else if percent > 10.0 {
        LevelStatus::Good
    } else {
        LevelStatus::Low
    }
}
