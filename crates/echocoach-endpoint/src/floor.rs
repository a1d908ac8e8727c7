use crate::config::FloorConfig;

/// Running estimate of the room's background amplitude.
///
/// The floor follows observed frame peaks with an asymmetric EMA: a quieter
/// room pulls the floor down quickly, while louder input (usually speech)
/// raises it only very slowly. A separate, faster EMA feeds the live level
/// display and the pause-time snapshot; it never gates trimming directly.
#[derive(Debug, Clone)]
pub struct NoiseFloorEstimator {
    cfg: FloorConfig,
    floor: f32,
    display_peak: f32,
}

impl NoiseFloorEstimator {
    pub fn new(cfg: FloorConfig) -> Self {
        Self {
            floor: cfg.initial,
            display_peak: 0.0,
            cfg,
        }
    }

    /// Per-tick update from one analysis frame's peak. Both the ambient
    /// monitor and an in-flight recording feed this; the two write paths are
    /// mutually exclusive in time, so the value is always a plausible floor
    /// regardless of who wrote last.
    pub fn observe_peak(&mut self, peak: f32) {
        let peak = peak.max(0.0);
        self.display_peak =
            self.display_peak * (1.0 - self.cfg.display_alpha) + peak * self.cfg.display_alpha;

        if peak < self.floor {
            self.floor = self.floor * (1.0 - self.cfg.decay_alpha) + peak * self.cfg.decay_alpha;
        } else {
            self.floor = self.floor * (1.0 - self.cfg.attack_alpha) + peak * self.cfg.attack_alpha;
        }
    }

    /// Pause-time commit. Clamping keeps a transient loud event (a door
    /// slam) from poisoning the floor for the rest of the session.
    pub fn commit_snapshot(&mut self) {
        let measured = (self.display_peak * self.cfg.snapshot_scale).min(self.cfg.snapshot_cap);
        self.floor = measured.max(self.cfg.default_floor);
    }

    /// Explicit recalibration; the only way the floor is ever reset.
    pub fn recalibrate(&mut self) {
        self.floor = self.cfg.initial;
        self.display_peak = 0.0;
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    /// Smoothed peak for the live level readout only.
    pub fn display_level(&self) -> f32 {
        self.display_peak
    }
}
