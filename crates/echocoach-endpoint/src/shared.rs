use std::sync::Arc;

use parking_lot::RwLock;

use echocoach_foundation::{DeviceError, GateFlags};
use echocoach_audio::AnalysisFrame;

use crate::config::FloorConfig;
use crate::floor::NoiseFloorEstimator;

/// Session-scoped mutable state: the gate flags and the one noise-floor
/// estimate shared between the ambient monitor and in-flight recordings.
/// All writers run on the same cooperative timeline; the lock exists for the
/// capture thread handing frames across, not for contention.
pub struct SessionState {
    pub gates: GateFlags,
    pub floor: NoiseFloorEstimator,
}

impl SessionState {
    pub fn new(cfg: FloorConfig) -> Self {
        Self {
            gates: GateFlags::default(),
            floor: NoiseFloorEstimator::new(cfg),
        }
    }

    pub fn noise_floor(&self) -> f32 {
        self.floor.floor()
    }
}

pub type SharedSession = Arc<RwLock<SessionState>>;

pub fn shared_session(cfg: FloorConfig) -> SharedSession {
    Arc::new(RwLock::new(SessionState::new(cfg)))
}

/// A live analysis tap on the microphone. Dropping the tap releases the
/// hardware synchronously; there is no deferred cleanup.
pub trait AnalysisTap {
    /// Next queued frame, non-blocking. Callers poll on their own tick and
    /// must tolerate zero or several frames per call.
    fn try_next_frame(&mut self) -> Option<AnalysisFrame>;
}

/// Port to the microphone collaborator. Exactly one holder may own a live
/// tap at a time; acquiring for a new purpose requires the previous holder
/// to have dropped its tap first.
pub trait AudioInput {
    type Tap: AnalysisTap;

    fn acquire(&mut self) -> Result<Self::Tap, DeviceError>;
}
