use std::time::Instant;

use echocoach_foundation::{AppError, ControlEvent};

use crate::config::EndpointConfig;
use crate::monitor::AmbientMonitor;
use crate::session::{RecordingAttempt, RecordingSession, StopReason};
use crate::shared::{shared_session, AudioInput, SharedSession};
use crate::trim::Endpointer;

/// Orchestrates the ambient monitor and recording sessions behind one
/// `dispatch` entry point, so the 4-gate rule and the pause-before-resume
/// hardware ordering are enforced in a single place instead of being
/// scattered across UI handlers.
///
/// Holds two independent `AudioInput`s: one for ambient listening, one for
/// capture. The microphone is only ever time-shared — the monitor's tap is
/// dropped before a capture tap is acquired, and re-acquired after capture
/// releases it.
pub struct SessionController<A: AudioInput> {
    shared: SharedSession,
    monitor: AmbientMonitor<A>,
    capture_input: A,
    session: Option<RecordingSession<A::Tap>>,
    endpointer: Endpointer,
    cfg: EndpointConfig,
    /// Monotonic attempt counter; completions from a superseded attempt are
    /// stale and discarded.
    attempt_seq: u64,
    attempt: Option<(u64, RecordingAttempt)>,
}

impl<A: AudioInput> SessionController<A> {
    pub fn new(monitor_input: A, capture_input: A, cfg: EndpointConfig) -> Self {
        let shared = shared_session(cfg.floor);
        let monitor = AmbientMonitor::new(monitor_input, shared.clone(), cfg.quiet_room_peak);
        Self {
            shared,
            monitor,
            capture_input,
            session: None,
            endpointer: Endpointer::new(cfg.trim),
            cfg,
            attempt_seq: 0,
            attempt: None,
        }
    }

    pub fn shared(&self) -> &SharedSession {
        &self.shared
    }

    pub fn monitor(&self) -> &AmbientMonitor<A> {
        &self.monitor
    }

    pub fn is_capturing(&self) -> bool {
        self.session.is_some()
    }

    pub fn noise_floor(&self) -> f32 {
        self.shared.read().noise_floor()
    }

    pub fn dispatch(&mut self, event: ControlEvent, now: Instant) -> Result<(), AppError> {
        tracing::debug!(?event, "control event");
        match event {
            ControlEvent::SessionStarted => {
                self.shared.write().gates.session_active = true;
                self.try_resume()
            }
            ControlEvent::TabHidden | ControlEvent::WindowBlurred | ControlEvent::PageUnload => {
                self.shared.write().gates.hidden = true;
                self.monitor.pause();
                Ok(())
            }
            ControlEvent::TabVisible | ControlEvent::WindowFocused => {
                self.shared.write().gates.hidden = false;
                self.try_resume()
            }
            ControlEvent::PlaybackStarted => {
                self.shared.write().gates.app_busy = true;
                self.monitor.pause();
                Ok(())
            }
            // Fired on playback error paths as well; a failed load must
            // still attempt resume.
            ControlEvent::PlaybackFinished => {
                self.shared.write().gates.app_busy = false;
                self.try_resume()
            }
            ControlEvent::StartCapture { word } => self.start_capture(&word, now),
            ControlEvent::ManualStop => self.finish(StopReason::Manual),
        }
    }

    /// Periodic tick: drives the in-flight capture if any, the ambient
    /// monitor otherwise. Returns the stop reason when a capture finished
    /// this tick (the attempt is then available via `take_attempt`).
    pub fn tick(&mut self, now: Instant) -> Result<Option<StopReason>, AppError> {
        if let Some(session) = self.session.as_mut() {
            if let Some(reason) = session.poll(now) {
                self.finish(reason)?;
                return Ok(Some(reason));
            }
        } else {
            self.monitor.tick(now);
        }
        Ok(None)
    }

    /// The completed attempt, unless a newer attempt has superseded it.
    pub fn take_attempt(&mut self) -> Option<RecordingAttempt> {
        let (seq, attempt) = self.attempt.take()?;
        if seq != self.attempt_seq {
            tracing::debug!(seq, current = self.attempt_seq, "discarding stale attempt");
            return None;
        }
        Some(attempt)
    }

    fn start_capture(&mut self, word: &str, now: Instant) -> Result<(), AppError> {
        // Selecting a new word discards any prior attempt.
        self.attempt = None;
        self.attempt_seq += 1;

        // The monitor must fully release the microphone before the capture
        // tap is acquired.
        self.monitor.pause();

        match RecordingSession::start(
            word,
            &mut self.capture_input,
            self.shared.clone(),
            self.cfg,
            now,
        ) {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(err) => {
                // Busy flag is already reset by the failed start; give the
                // monitor its hardware back.
                let resumed = self.try_resume();
                if let Err(resume_err) = resumed {
                    tracing::warn!("monitor resume after failed capture: {}", resume_err);
                }
                Err(err)
            }
        }
    }

    fn finish(&mut self, reason: StopReason) -> Result<(), AppError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        let outcome = session.stop(reason, &self.endpointer);
        // Busy is clear now whatever happened; resume before propagating so
        // an error never strands the monitor.
        let resume = self.try_resume();

        let attempt = outcome?;
        self.attempt = Some((self.attempt_seq, attempt));
        resume
    }

    fn try_resume(&mut self) -> Result<(), AppError> {
        if !self.shared.read().gates.permit_monitoring() {
            return Ok(());
        }
        self.monitor.resume()?;
        Ok(())
    }
}
