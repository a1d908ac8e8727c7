use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Ambient monitor lifecycle. Transitions only through the 4-gate rule
/// enforced by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    Stopped,
    Running,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::Stopped
    }
}

/// The three externally-owned gate flags. The fourth gate (already
/// monitoring) is the monitor's own `MonitorState` and lives with it.
///
/// Each flag is written by a different trigger: `app_busy` by the
/// recording/playback lifecycle, `hidden` by visibility and focus signals,
/// `session_active` by the first student-identity interaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateFlags {
    pub app_busy: bool,
    pub hidden: bool,
    pub session_active: bool,
}

impl GateFlags {
    /// True when the externally-owned gates allow ambient monitoring.
    pub fn permit_monitoring(&self) -> bool {
        !self.app_busy && !self.hidden && self.session_active
    }
}

/// Named events dispatched through the controller's single entry point, so
/// transition legality is checked in one place rather than scattered across
/// UI handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// First interaction with the student-identity field.
    SessionStarted,
    TabHidden,
    TabVisible,
    WindowFocused,
    WindowBlurred,
    PageUnload,
    /// Reference or attempt playback began / finished (errors included).
    PlaybackStarted,
    PlaybackFinished,
    StartCapture { word: String },
    ManualStop,
}

/// Broadcasts monitor state changes to observers (UI status dot, logs).
pub struct MonitorStateCell {
    state: parking_lot::RwLock<MonitorState>,
    tx: Sender<MonitorState>,
    rx: Receiver<MonitorState>,
}

impl Default for MonitorStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorStateCell {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            state: parking_lot::RwLock::new(MonitorState::Stopped),
            tx,
            rx,
        }
    }

    pub fn set(&self, new_state: MonitorState) {
        let mut current = self.state.write();
        if *current != new_state {
            tracing::info!("Monitor state: {:?} -> {:?}", *current, new_state);
            *current = new_state;
            let _ = self.tx.send(new_state);
        }
    }

    pub fn get(&self) -> MonitorState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> Receiver<MonitorState> {
        self.rx.clone()
    }
}
