use serde::{Deserialize, Serialize};

/// Trimming engine selection. The frame classifier is canonical; the peak
/// scan under-trims sibilants but is cheaper and has no frame alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrimStrategy {
    FrameClassifier,
    PeakScan,
}

impl Default for TrimStrategy {
    fn default() -> Self {
        Self::FrameClassifier
    }
}

/// Ambient noise-floor tracking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FloorConfig {
    /// Conservative startup estimate, before any room has been heard.
    pub initial: f32,
    /// Hard lower bound applied at pause-commit time.
    pub default_floor: f32,
    /// EMA weight of a new, quieter peak (fast decay).
    pub decay_alpha: f32,
    /// EMA weight of a new, louder peak (slow attack, so speech transients
    /// do not inflate the floor).
    pub attack_alpha: f32,
    /// Weight for the faster display-only level EMA.
    pub display_alpha: f32,
    /// Pause-commit scale applied to the smoothed peak.
    pub snapshot_scale: f32,
    /// Pause-commit cap. Ambient floors in realistic rooms rarely exceed 15%
    /// of full scale; anything above is a transient, not sustained noise.
    pub snapshot_cap: f32,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            initial: 0.015,
            default_floor: 0.01,
            decay_alpha: 0.10,
            attack_alpha: 0.0005,
            display_alpha: 0.1,
            snapshot_scale: 1.5,
            snapshot_cap: 0.15,
        }
    }
}

/// Silence trimming thresholds. The multipliers vary across tuning passes,
/// so they are configuration rather than constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrimConfig {
    pub strategy: TrimStrategy,
    /// Analysis frame length for the frame classifier.
    pub frame_ms: u64,
    /// A frame is loud speech above `max(volume_min, floor * volume_factor)`.
    pub volume_factor: f32,
    pub volume_min: f32,
    /// Quiet-but-hissy frames (fricatives) pass the sensitive threshold
    /// `max(sensitive_min, floor * sensitive_factor)` when ZCR is also high.
    pub sensitive_factor: f32,
    pub sensitive_min: f32,
    pub zcr_threshold: f32,
    /// Live floor readings at or below this are treated as a dead monitor
    /// and the content-derived local floor is used instead.
    pub floor_trust_epsilon: f32,
    /// Peak-scan cutoff as a fraction of the utterance's own peak.
    pub peak_fraction: f32,
    /// Trailing-edge threshold multiplier; breath trails are cut harder.
    pub end_tighten: f32,
    /// Floor assumed by the peak scan when no live floor is supplied.
    pub fallback_floor: f32,
    /// Anti-click sustain window.
    pub sustain_window_ms: u64,
    /// Below this span, trimming aborts and returns the input unchanged.
    pub min_span_ms: u64,
    pub pad_ms: u64,
    /// Coarser padding for the fixed-threshold reference-clip variant.
    pub reference_pad_ms: u64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            strategy: TrimStrategy::default(),
            frame_ms: 20,
            volume_factor: 3.5,
            volume_min: 0.015,
            sensitive_factor: 2.5,
            sensitive_min: 0.005,
            zcr_threshold: 0.1,
            floor_trust_epsilon: 1e-4,
            peak_fraction: 0.05,
            end_tighten: 0.8,
            fallback_floor: 0.01,
            sustain_window_ms: 100,
            min_span_ms: 100,
            pad_ms: 20,
            reference_pad_ms: 30,
        }
    }
}

/// Real-time auto-stop during capture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AutoStopConfig {
    /// Students often pause before speaking; silence inside the grace period
    /// is ignored outright.
    pub grace_ms: u64,
    /// Continuous silence required to stop capture.
    pub silence_hold_ms: u64,
    /// Hard cap, fires unconditionally.
    pub max_recording_ms: u64,
    /// Silence threshold is `max(min_threshold, floor * floor_multiplier)`.
    pub floor_multiplier: f32,
    pub min_threshold: f32,
    /// Suggested poll cadence; correctness does not depend on it.
    pub check_interval_ms: u64,
}

impl Default for AutoStopConfig {
    fn default() -> Self {
        Self {
            grace_ms: 2000,
            silence_hold_ms: 1500,
            max_recording_ms: 5000,
            floor_multiplier: 2.5,
            min_threshold: 0.012,
            check_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub floor: FloorConfig,
    pub trim: TrimConfig,
    pub auto_stop: AutoStopConfig,
    /// Attempts whose trimmed content is shorter than this are rejected.
    pub min_attempt_ms: u64,
    /// Peaks below this classify the room as quiet.
    pub quiet_room_peak: f32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointConfig {
    pub fn new() -> Self {
        Self {
            floor: FloorConfig::default(),
            trim: TrimConfig::default(),
            auto_stop: AutoStopConfig::default(),
            min_attempt_ms: 100,
            quiet_room_peak: 0.02,
        }
    }
}
