//! Silence trimming for short isolated-word utterances.
//!
//! Two engines share one contract: the result is a new buffer no longer than
//! the input and never shorter than the minimum span; when trimming would
//! remove everything (or nearly everything) the input comes back unchanged.

use echocoach_audio::{zero_crossing_rate, LevelMeter, SignalBuffer};

use crate::config::{TrimConfig, TrimStrategy};

pub trait Trimmer: Send {
    /// `live_floor` is the ambient estimate, if a monitor has one. Engines
    /// may fall back to content-derived statistics when it is absent or
    /// implausibly near zero.
    fn trim(&self, buffer: &SignalBuffer, live_floor: Option<f32>) -> SignalBuffer;
}

/// Canonical engine: 20 ms frames classified by RMS and zero-crossing rate.
/// The ZCR branch rescues low-amplitude fricatives ("s", "f") that pure
/// amplitude thresholding discards.
pub struct FrameClassifier {
    cfg: TrimConfig,
    meter: LevelMeter,
}

impl FrameClassifier {
    pub fn new(cfg: TrimConfig) -> Self {
        Self {
            cfg,
            meter: LevelMeter::new(),
        }
    }

    /// 10th percentile of per-frame RMS: a content-derived floor for when
    /// the live monitor is dead or was never running.
    fn local_floor(rms_values: &[f32]) -> f32 {
        if rms_values.is_empty() {
            return 0.01;
        }
        let mut sorted = rms_values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted[sorted.len() / 10].max(1e-6)
    }
}

impl Trimmer for FrameClassifier {
    fn trim(&self, buffer: &SignalBuffer, live_floor: Option<f32>) -> SignalBuffer {
        let frame_size = buffer.ms_to_samples(self.cfg.frame_ms);
        if frame_size == 0 || buffer.len() < frame_size {
            return buffer.clone();
        }
        let samples = buffer.samples();
        let n_frames = samples.len() / frame_size;

        let rms: Vec<f32> = (0..n_frames)
            .map(|i| self.meter.measure(&samples[i * frame_size..(i + 1) * frame_size]).rms)
            .collect();

        let effective_floor = live_floor
            .filter(|&f| f > self.cfg.floor_trust_epsilon)
            .unwrap_or_else(|| Self::local_floor(&rms));

        let volume_thresh = self.cfg.volume_min.max(effective_floor * self.cfg.volume_factor);
        let sensitive_thresh = self
            .cfg
            .sensitive_min
            .max(effective_floor * self.cfg.sensitive_factor);

        let is_speech = |idx: usize| -> bool {
            if rms[idx] > volume_thresh {
                return true;
            }
            if rms[idx] > sensitive_thresh {
                let frame = &samples[idx * frame_size..(idx + 1) * frame_size];
                return zero_crossing_rate(frame) > self.cfg.zcr_threshold;
            }
            false
        };

        let Some(start_frame) = (0..n_frames).find(|&i| is_speech(i)) else {
            // Nothing classified as speech; never produce a near-empty result.
            return buffer.clone();
        };
        let end_frame = (start_frame..n_frames)
            .rev()
            .find(|&i| is_speech(i))
            .unwrap_or(start_frame);

        let span = (end_frame + 1 - start_frame) * frame_size;
        if span < buffer.ms_to_samples(self.cfg.min_span_ms) {
            return buffer.clone();
        }

        let padding = buffer.ms_to_samples(self.cfg.pad_ms);
        let start = (start_frame * frame_size).saturating_sub(padding);
        let end = ((end_frame + 1) * frame_size + padding).min(samples.len());

        tracing::debug!(
            start,
            end,
            floor = effective_floor,
            volume_thresh,
            "frame-classifier trim"
        );
        buffer.slice(start..end)
    }
}

/// Amplitude scan against `max(peak * 5%, floor)`. Breath and lip-smack
/// artifacts sit below 5% of peak voice energy; the floor keeps the cutoff
/// above real background hiss in very quiet rooms.
pub struct PeakScan {
    cfg: TrimConfig,
}

impl PeakScan {
    pub fn new(cfg: TrimConfig) -> Self {
        Self { cfg }
    }
}

impl Trimmer for PeakScan {
    fn trim(&self, buffer: &SignalBuffer, live_floor: Option<f32>) -> SignalBuffer {
        let samples = buffer.samples();
        if samples.is_empty() {
            return buffer.clone();
        }

        let peak = buffer.peak();
        let floor = live_floor.unwrap_or(self.cfg.fallback_floor);
        let threshold = (peak * self.cfg.peak_fraction).max(floor);

        let sustain_window = buffer.ms_to_samples(self.cfg.sustain_window_ms).max(1);
        let mut start = 0usize;
        let mut end = samples.len() - 1;

        while start < end {
            if samples[start].abs() >= threshold {
                // Anti-click: a real onset has more energy somewhere in the
                // following window. An isolated spike is skipped wholesale.
                let sustained = samples[start + 1..(start + sustain_window).min(end)]
                    .iter()
                    .any(|s| s.abs() > threshold);
                if sustained {
                    break;
                }
                start += sustain_window;
                continue;
            }
            start += 1;
        }

        // Trailing breath noise is cut more aggressively than onset.
        let end_threshold = threshold * self.cfg.end_tighten;
        while end > start && samples[end].abs() < end_threshold {
            end -= 1;
        }

        if end.saturating_sub(start) < buffer.ms_to_samples(self.cfg.min_span_ms) {
            return buffer.clone();
        }

        let padding = buffer.ms_to_samples(self.cfg.pad_ms);
        let padded_start = start.saturating_sub(padding);
        let padded_end = (end + 1 + padding).min(samples.len());

        tracing::debug!(
            padded_start,
            padded_end,
            peak,
            threshold,
            "peak-scan trim"
        );
        buffer.slice(padded_start..padded_end)
    }
}

/// Facade that owns the configured engine and the fixed-threshold fallback.
pub struct Endpointer {
    cfg: TrimConfig,
    engine: Box<dyn Trimmer>,
}

impl Endpointer {
    pub fn new(cfg: TrimConfig) -> Self {
        let engine: Box<dyn Trimmer> = match cfg.strategy {
            TrimStrategy::FrameClassifier => Box::new(FrameClassifier::new(cfg)),
            TrimStrategy::PeakScan => Box::new(PeakScan::new(cfg)),
        };
        Self { cfg, engine }
    }

    pub fn trim(&self, buffer: &SignalBuffer, live_floor: Option<f32>) -> SignalBuffer {
        self.engine.trim(buffer, live_floor)
    }

    /// Non-adaptive variant for studio-recorded reference clips, where noise
    /// is not a concern: a single fixed threshold, no anti-click check, and
    /// coarser padding.
    pub fn trim_reference(&self, buffer: &SignalBuffer, live_floor: f32) -> SignalBuffer {
        let threshold = (live_floor * 0.5).min(0.01);
        fixed_trim(buffer, threshold, self.cfg.reference_pad_ms, self.cfg.min_span_ms)
    }
}

/// Plain forward/backward scan against one fixed threshold.
pub fn fixed_trim(
    buffer: &SignalBuffer,
    threshold: f32,
    pad_ms: u64,
    min_span_ms: u64,
) -> SignalBuffer {
    let samples = buffer.samples();
    if samples.is_empty() {
        return buffer.clone();
    }

    let mut start = 0usize;
    while start < samples.len() && samples[start].abs() < threshold {
        start += 1;
    }
    let mut end = samples.len() - 1;
    while end > start && samples[end].abs() < threshold {
        end -= 1;
    }

    if end.saturating_sub(start) < buffer.ms_to_samples(min_span_ms) {
        return buffer.clone();
    }

    let padding = buffer.ms_to_samples(pad_ms);
    buffer.slice(start.saturating_sub(padding)..(end + 1 + padding).min(samples.len()))
}
