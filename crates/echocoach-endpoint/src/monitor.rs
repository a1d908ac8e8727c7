use std::time::{Duration, Instant};

use echocoach_audio::{classify_peak, LevelMeter, LevelStatus};
use echocoach_foundation::{DeviceError, MonitorState, MonitorStateCell};

use crate::shared::{AnalysisTap, AudioInput, SharedSession};

/// Room-noise classification for the UI status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Quiet,
    Noisy,
}

/// Continuous ambient-noise monitor.
///
/// Owns a microphone tap used purely for listening, never recording. The
/// resume transition is gated four ways: the app must be idle, the tab
/// visible, the session active, and the monitor currently stopped. Pausing
/// releases the hardware synchronously and commits a clamped snapshot of the
/// smoothed peak into the shared noise floor.
pub struct AmbientMonitor<A: AudioInput> {
    input: A,
    tap: Option<A::Tap>,
    state: MonitorStateCell,
    shared: SharedSession,
    meter: LevelMeter,
    quiet_room_peak: f32,
    room: RoomStatus,
    last_peak: f32,
    last_noise_log: Option<Instant>,
}

const NOISE_LOG_INTERVAL: Duration = Duration::from_secs(1);

impl<A: AudioInput> AmbientMonitor<A> {
    pub fn new(input: A, shared: SharedSession, quiet_room_peak: f32) -> Self {
        Self {
            input,
            tap: None,
            state: MonitorStateCell::new(),
            shared,
            meter: LevelMeter::new(),
            quiet_room_peak,
            room: RoomStatus::Quiet,
            last_peak: 0.0,
            last_noise_log: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state.get()
    }

    pub fn state_cell(&self) -> &MonitorStateCell {
        &self.state
    }

    /// Attempts the Stopped -> Running transition. Returns Ok(false) when a
    /// gate holds it closed, Ok(true) on a successful start. A device
    /// failure leaves the state Stopped and surfaces to the UI collaborator.
    pub fn resume(&mut self) -> Result<bool, DeviceError> {
        if self.state.get() == MonitorState::Running {
            return Ok(false);
        }
        if !self.shared.read().gates.permit_monitoring() {
            return Ok(false);
        }

        let tap = self.input.acquire()?;
        self.tap = Some(tap);
        self.state.set(MonitorState::Running);
        Ok(true)
    }

    /// Running -> Stopped. Permitted any time; releases the tap immediately
    /// and commits the pause-time floor snapshot.
    pub fn pause(&mut self) {
        if self.state.get() == MonitorState::Stopped {
            return;
        }
        // Dropping the tap frees the hardware before anything else runs.
        self.tap = None;
        self.shared.write().floor.commit_snapshot();
        self.state.set(MonitorState::Stopped);
    }

    /// Periodic analysis tick; a no-op unless Running. Drains queued frames,
    /// feeding each peak into the display EMA and the continuous asymmetric
    /// floor estimate.
    pub fn tick(&mut self, now: Instant) {
        if self.state.get() != MonitorState::Running {
            return;
        }
        let Some(tap) = self.tap.as_mut() else {
            return;
        };

        while let Some(frame) = tap.try_next_frame() {
            let level = self.meter.measure(&frame.samples);
            self.last_peak = level.peak;
            self.shared.write().floor.observe_peak(level.peak);
        }

        self.room = if self.last_peak < self.quiet_room_peak {
            RoomStatus::Quiet
        } else {
            RoomStatus::Noisy
        };

        // Throttled noise sampling for diagnostics, one line per second.
        let due = self
            .last_noise_log
            .map(|t| now.duration_since(t) >= NOISE_LOG_INTERVAL)
            .unwrap_or(true);
        if due {
            let shared = self.shared.read();
            tracing::debug!(
                peak = self.last_peak,
                dbfs = self.meter.rms_to_dbfs(self.last_peak),
                floor = shared.noise_floor(),
                "noise sample"
            );
            drop(shared);
            self.last_noise_log = Some(now);
        }
    }

    pub fn noise_floor(&self) -> f32 {
        self.shared.read().noise_floor()
    }

    pub fn room_status(&self) -> RoomStatus {
        self.room
    }

    /// Input-level classification for the settings meter.
    pub fn level_status(&self) -> LevelStatus {
        classify_peak(self.shared.read().floor.display_level())
    }
}
