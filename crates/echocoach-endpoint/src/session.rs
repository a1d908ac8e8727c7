use std::sync::Arc;
use std::time::Instant;

use echocoach_audio::{encode_wav, LevelMeter, SignalBuffer};
use echocoach_foundation::AppError;

use crate::config::{AutoStopConfig, EndpointConfig};
use crate::shared::{AnalysisTap, AudioInput, SharedSession};
use crate::trim::Endpointer;

/// Why a capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    AutoSilence,
    HardCap,
}

/// One finished attempt at a target word. At most one attempt is live at a
/// time; starting a new one (or selecting a new word) discards the prior.
#[derive(Debug, Clone)]
pub struct RecordingAttempt {
    pub word: String,
    pub captured: SignalBuffer,
    pub trimmed: SignalBuffer,
    pub encoded: Vec<u8>,
    pub reason: StopReason,
    /// Floor at finalize time, forwarded to the upload collaborator.
    pub noise_floor: f32,
}

/// Pure auto-stop detector. Driven by explicit `Instant`s so tests use
/// virtual time; only monotonic elapsed-time comparisons matter, never the
/// exact poll cadence.
#[derive(Debug)]
pub struct AutoStopDetector {
    cfg: AutoStopConfig,
    started: Instant,
    threshold: f32,
    silence_since: Option<Instant>,
}

impl AutoStopDetector {
    pub fn new(cfg: AutoStopConfig, noise_floor: f32, now: Instant) -> Self {
        Self {
            threshold: cfg.min_threshold.max(noise_floor * cfg.floor_multiplier),
            cfg,
            started: now,
            silence_since: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Evaluates the latest frame RMS. The hard cap fires unconditionally;
    /// inside the grace period silence is ignored outright (students often
    /// pause before speaking); afterwards, silence held continuously for the
    /// hold duration stops the capture, and any loud frame resets the timer.
    pub fn observe(&mut self, rms: f32, now: Instant) -> Option<StopReason> {
        let elapsed = now.duration_since(self.started).as_millis() as u64;
        if elapsed >= self.cfg.max_recording_ms {
            return Some(StopReason::HardCap);
        }
        if elapsed <= self.cfg.grace_ms {
            return None;
        }

        if rms < self.threshold {
            let since = *self.silence_since.get_or_insert(now);
            if now.duration_since(since).as_millis() as u64 >= self.cfg.silence_hold_ms {
                return Some(StopReason::AutoSilence);
            }
        } else {
            self.silence_since = None;
        }
        None
    }
}

/// A single in-flight capture: raw frame accumulation plus the concurrent
/// auto-stop check. Created in Capturing, consumed by `stop`.
pub struct RecordingSession<T: AnalysisTap> {
    word: String,
    tap: Option<T>,
    frames: Vec<Arc<[f32]>>,
    sample_rate: u32,
    meter: LevelMeter,
    detector: AutoStopDetector,
    shared: SharedSession,
    cfg: EndpointConfig,
    last_rms: f32,
}

impl<T: AnalysisTap> RecordingSession<T> {
    /// Preconditions: a word is selected and the app is idle. Sets the busy
    /// flag (the caller has already paused the ambient monitor, so the
    /// hardware is free) and acquires the dedicated capture tap. On device
    /// failure the busy flag is reset so the system is not left stuck.
    pub fn start<A: AudioInput<Tap = T>>(
        word: &str,
        input: &mut A,
        shared: SharedSession,
        cfg: EndpointConfig,
        now: Instant,
    ) -> Result<Self, AppError> {
        if word.is_empty() {
            return Err(AppError::Config("no word selected".into()));
        }
        {
            let mut state = shared.write();
            if state.gates.app_busy {
                return Err(AppError::Config("capture already in progress".into()));
            }
            state.gates.app_busy = true;
        }

        let tap = match input.acquire() {
            Ok(tap) => tap,
            Err(err) => {
                shared.write().gates.app_busy = false;
                return Err(err.into());
            }
        };

        let floor = shared.read().noise_floor();
        let detector = AutoStopDetector::new(cfg.auto_stop, floor, now);
        tracing::info!(word, floor, threshold = detector.threshold(), "capture started");

        Ok(Self {
            word: word.to_string(),
            tap: Some(tap),
            frames: Vec::new(),
            sample_rate: 0,
            meter: LevelMeter::new(),
            detector,
            shared,
            cfg,
            last_rms: 0.0,
        })
    }

    /// Drains queued frames into the accumulator and runs the auto-stop
    /// check against the latest frame's RMS. A returned reason means the
    /// caller must invoke `stop`; further polling is undefined.
    pub fn poll(&mut self, now: Instant) -> Option<StopReason> {
        if let Some(tap) = self.tap.as_mut() {
            while let Some(frame) = tap.try_next_frame() {
                self.sample_rate = frame.sample_rate;
                let level = self.meter.measure(&frame.samples);
                self.last_rms = level.rms;
                // Same smoothing as the ambient tick; the two write paths
                // are exclusive in time.
                self.shared.write().floor.observe_peak(level.peak);
                self.frames.push(frame.samples);
            }
        }
        self.detector.observe(self.last_rms, now)
    }

    /// Finalizes the attempt: releases the microphone first, then trims,
    /// encodes, and always clears the busy flag — on the error paths too.
    pub fn stop(
        mut self,
        reason: StopReason,
        endpointer: &Endpointer,
    ) -> Result<RecordingAttempt, AppError> {
        // The detector is consumed with self; no timer can fire against
        // released state. Hardware goes first.
        self.tap = None;

        let outcome = self.finalize(reason, endpointer);
        self.shared.write().gates.app_busy = false;
        outcome
    }

    fn finalize(
        &mut self,
        reason: StopReason,
        endpointer: &Endpointer,
    ) -> Result<RecordingAttempt, AppError> {
        if self.frames.is_empty() || self.sample_rate == 0 {
            return Err(AppError::TooShort {
                got_ms: 0,
                min_ms: self.cfg.min_attempt_ms,
            });
        }

        let captured = SignalBuffer::from_frames(&self.frames, self.sample_rate);
        let noise_floor = self.shared.read().noise_floor();
        let trimmed = endpointer.trim(&captured, Some(noise_floor));

        if trimmed.duration_ms() < self.cfg.min_attempt_ms {
            return Err(AppError::TooShort {
                got_ms: trimmed.duration_ms(),
                min_ms: self.cfg.min_attempt_ms,
            });
        }

        let encoded = encode_wav(&trimmed);
        tracing::info!(
            word = %self.word,
            ?reason,
            captured_ms = captured.duration_ms(),
            trimmed_ms = trimmed.duration_ms(),
            "capture finalized"
        );

        Ok(RecordingAttempt {
            word: std::mem::take(&mut self.word),
            captured,
            trimmed,
            encoded,
            reason,
            noise_floor,
        })
    }
}
