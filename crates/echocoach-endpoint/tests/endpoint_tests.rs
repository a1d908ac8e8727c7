//! End-to-end scenarios driving the controller with a fake microphone and
//! virtual time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use echocoach_audio::{AnalysisFrame, LevelStatus};
use echocoach_foundation::{AppError, ControlEvent, DeviceError, MonitorState};
use echocoach_endpoint::{
    AnalysisTap, AudioInput, EndpointConfig, FloorConfig, NoiseFloorEstimator, RoomStatus,
    SessionController, StopReason,
};

const RATE: u32 = 16_000;

/// Fake microphone. All clones share one frame queue (frames go to whoever
/// holds a tap) and one active-tap counter, so the tests can assert the
/// hardware is never double-held.
#[derive(Clone)]
struct FakeInput {
    queue: Arc<Mutex<VecDeque<AnalysisFrame>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

struct FakeTap {
    queue: Arc<Mutex<VecDeque<AnalysisFrame>>>,
    active: Arc<AtomicUsize>,
}

impl FakeInput {
    fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A clone backed by the same hardware but with its own failure switch.
    fn sibling(&self) -> Self {
        Self {
            fail: Arc::new(AtomicBool::new(false)),
            ..self.clone()
        }
    }

    fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn push(&self, samples: Vec<f32>) {
        self.queue.lock().push_back(AnalysisFrame {
            samples: samples.into(),
            timestamp: Instant::now(),
            sample_rate: RATE,
        });
    }

    fn active_taps(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn max_active_taps(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl AudioInput for FakeInput {
    type Tap = FakeTap;

    fn acquire(&mut self) -> Result<FakeTap, DeviceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeviceError::Busy);
        }
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        Ok(FakeTap {
            queue: self.queue.clone(),
            active: self.active.clone(),
        })
    }
}

impl AnalysisTap for FakeTap {
    fn try_next_frame(&mut self) -> Option<AnalysisFrame> {
        self.queue.lock().pop_front()
    }
}

impl Drop for FakeTap {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 100ms of a 440Hz tone at the given amplitude.
fn tone_frame(amplitude: f32) -> Vec<f32> {
    (0..RATE as usize / 10)
        .map(|i| {
            amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / RATE as f32).sin()
        })
        .collect()
}

fn silent_frame() -> Vec<f32> {
    vec![0.0; RATE as usize / 10]
}

fn controller(mic: &FakeInput) -> SessionController<FakeInput> {
    SessionController::new(mic.clone(), mic.sibling(), EndpointConfig::new())
}

fn begin_session(ctl: &mut SessionController<FakeInput>, t0: Instant) {
    ctl.dispatch(ControlEvent::SessionStarted, t0).unwrap();
}

#[test]
fn capture_trims_flanking_silence() {
    let mic = FakeInput::new();
    let mut ctl = controller(&mic);
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);

    ctl.dispatch(ControlEvent::StartCapture { word: "thought".into() }, t0)
        .unwrap();
    // 300ms silence, 500ms tone, 400ms silence.
    for _ in 0..3 {
        mic.push(silent_frame());
    }
    for _ in 0..5 {
        mic.push(tone_frame(0.4));
    }
    for _ in 0..4 {
        mic.push(silent_frame());
    }
    ctl.tick(t0 + Duration::from_millis(100)).unwrap();
    ctl.dispatch(ControlEvent::ManualStop, t0 + Duration::from_millis(200))
        .unwrap();

    let attempt = ctl.take_attempt().unwrap();
    assert_eq!(attempt.word, "thought");
    assert_eq!(attempt.reason, StopReason::Manual);
    assert_eq!(attempt.captured.len(), 12 * 1600);

    // 500ms tone plus one 20ms pad on each side.
    assert_eq!(attempt.trimmed.len(), 8640);
    let removed = attempt.captured.len() - attempt.trimmed.len();
    let flanking = 7 * 1600;
    assert!(
        removed as f32 >= flanking as f32 * 0.9,
        "only removed {} of {} silent samples",
        removed,
        flanking
    );
    assert!(!attempt.encoded.is_empty());
}

#[test]
fn all_silent_capture_is_returned_unchanged() {
    let mic = FakeInput::new();
    let mut ctl = controller(&mic);
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);

    ctl.dispatch(ControlEvent::StartCapture { word: "sofa".into() }, t0)
        .unwrap();
    for _ in 0..4 {
        mic.push(silent_frame());
    }
    ctl.tick(t0 + Duration::from_millis(100)).unwrap();
    ctl.dispatch(ControlEvent::ManualStop, t0 + Duration::from_millis(200))
        .unwrap();

    // Nothing resembling speech: the attempt survives untrimmed rather than
    // coming back empty.
    let attempt = ctl.take_attempt().unwrap();
    assert_eq!(attempt.trimmed.len(), attempt.captured.len());
    assert!(attempt.trimmed.len() > 0);
}

#[test]
fn auto_stop_fires_after_held_silence() {
    let mic = FakeInput::new();
    let mut ctl = controller(&mic);
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);

    ctl.dispatch(ControlEvent::StartCapture { word: "water".into() }, t0)
        .unwrap();

    let mut stopped_at = None;
    for step in 1u64..=60 {
        if step <= 20 {
            mic.push(tone_frame(0.5));
        } else {
            mic.push(silent_frame());
        }
        let now = t0 + Duration::from_millis(step * 100);
        if let Some(reason) = ctl.tick(now).unwrap() {
            stopped_at = Some((step * 100, reason));
            break;
        }
    }

    // Speech until 2000ms; silence is first seen past the grace period at
    // 2100ms and must hold 1500ms, so the stop lands at 3600ms.
    let (at_ms, reason) = stopped_at.expect("capture never auto-stopped");
    assert_eq!(reason, StopReason::AutoSilence);
    assert!(
        (3500..=3800).contains(&at_ms),
        "auto-stop at {}ms, expected ~3600ms",
        at_ms
    );

    let attempt = ctl.take_attempt().unwrap();
    assert_eq!(attempt.reason, StopReason::AutoSilence);
    assert!(!ctl.shared().read().gates.app_busy);
    assert_eq!(ctl.monitor().state(), MonitorState::Running);
}

#[test]
fn hard_cap_stops_continuous_speech() {
    let mic = FakeInput::new();
    let mut ctl = controller(&mic);
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);

    ctl.dispatch(ControlEvent::StartCapture { word: "refrigerator".into() }, t0)
        .unwrap();

    let mut stopped_at = None;
    for step in 1u64..=60 {
        mic.push(tone_frame(0.5));
        let now = t0 + Duration::from_millis(step * 100);
        if let Some(reason) = ctl.tick(now).unwrap() {
            stopped_at = Some((step * 100, reason));
            break;
        }
    }

    let (at_ms, reason) = stopped_at.expect("capture never hit the cap");
    assert_eq!(reason, StopReason::HardCap);
    assert_eq!(at_ms, 5000);
    assert!(!ctl.shared().read().gates.app_busy);
}

#[test]
fn too_short_attempt_rejected_but_system_recovers() {
    let mic = FakeInput::new();
    let mut ctl = controller(&mic);
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);

    ctl.dispatch(ControlEvent::StartCapture { word: "cat".into() }, t0)
        .unwrap();
    // Stop before any audio arrives.
    let err = ctl
        .dispatch(ControlEvent::ManualStop, t0 + Duration::from_millis(50))
        .unwrap_err();
    assert!(matches!(err, AppError::TooShort { .. }));

    // The failure must not strand the system: idle again, monitor back up.
    assert!(!ctl.shared().read().gates.app_busy);
    assert_eq!(ctl.monitor().state(), MonitorState::Running);
    assert!(ctl.take_attempt().is_none());
}

#[test]
fn monitor_obeys_every_gate_combination() {
    for bits in 0u8..8 {
        let busy = bits & 1 != 0;
        let hidden = bits & 2 != 0;
        let session_active = bits & 4 != 0;

        let mic = FakeInput::new();
        let mut ctl = controller(&mic);
        let t0 = Instant::now();

        if session_active {
            let _ = ctl.dispatch(ControlEvent::SessionStarted, t0);
        }
        if hidden {
            let _ = ctl.dispatch(ControlEvent::TabHidden, t0);
        }
        if busy {
            let _ = ctl.dispatch(ControlEvent::PlaybackStarted, t0);
        }

        let expect_running = !busy && !hidden && session_active;
        assert_eq!(
            ctl.monitor().state() == MonitorState::Running,
            expect_running,
            "gates busy={} hidden={} active={}",
            busy,
            hidden,
            session_active
        );
        assert_eq!(mic.active_taps(), usize::from(expect_running));
    }
}

#[test]
fn playback_round_trip_restores_monitoring() {
    let mic = FakeInput::new();
    let mut ctl = controller(&mic);
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);
    assert_eq!(ctl.monitor().state(), MonitorState::Running);

    ctl.dispatch(ControlEvent::PlaybackStarted, t0).unwrap();
    assert_eq!(ctl.monitor().state(), MonitorState::Stopped);
    assert_eq!(mic.active_taps(), 0);

    ctl.dispatch(ControlEvent::PlaybackFinished, t0).unwrap();
    assert_eq!(ctl.monitor().state(), MonitorState::Running);
}

#[test]
fn microphone_is_never_double_held() {
    let mic = FakeInput::new();
    let mut ctl = controller(&mic);
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);

    for round in 0..3 {
        ctl.dispatch(
            ControlEvent::StartCapture { word: format!("word{round}") },
            t0,
        )
        .unwrap();
        for _ in 0..3 {
            mic.push(tone_frame(0.4));
        }
        ctl.tick(t0 + Duration::from_millis(100)).unwrap();
        ctl.dispatch(ControlEvent::ManualStop, t0 + Duration::from_millis(300))
            .unwrap();
    }

    assert_eq!(mic.max_active_taps(), 1, "monitor and capture overlapped");
    assert_eq!(ctl.monitor().state(), MonitorState::Running);
}

#[test]
fn monitor_device_failure_leaves_it_stopped() {
    let mic = FakeInput::new();
    mic.set_fail(true);
    let mut ctl = controller(&mic);
    let t0 = Instant::now();

    let err = ctl.dispatch(ControlEvent::SessionStarted, t0).unwrap_err();
    assert!(matches!(err, AppError::Device(DeviceError::Busy)));
    assert_eq!(ctl.monitor().state(), MonitorState::Stopped);

    // Device freed up; the next visibility event brings the monitor back.
    mic.set_fail(false);
    ctl.dispatch(ControlEvent::TabVisible, t0).unwrap();
    assert_eq!(ctl.monitor().state(), MonitorState::Running);
}

#[test]
fn capture_device_failure_resumes_monitor() {
    let mic = FakeInput::new();
    let capture = mic.sibling();
    capture.set_fail(true);
    let mut ctl = SessionController::new(mic.clone(), capture, EndpointConfig::new());
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);

    let err = ctl
        .dispatch(ControlEvent::StartCapture { word: "ship".into() }, t0)
        .unwrap_err();
    assert!(matches!(err, AppError::Device(_)));
    assert!(!ctl.is_capturing());
    assert!(!ctl.shared().read().gates.app_busy);
    // Ambient listening came back even though the capture never started.
    assert_eq!(ctl.monitor().state(), MonitorState::Running);
    assert_eq!(mic.active_taps(), 1);
}

#[test]
fn new_capture_discards_untaken_attempt() {
    let mic = FakeInput::new();
    let mut ctl = controller(&mic);
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);

    for word in ["first", "second"] {
        ctl.dispatch(ControlEvent::StartCapture { word: word.into() }, t0)
            .unwrap();
        for _ in 0..3 {
            mic.push(tone_frame(0.4));
        }
        ctl.tick(t0 + Duration::from_millis(100)).unwrap();
        ctl.dispatch(ControlEvent::ManualStop, t0 + Duration::from_millis(300))
            .unwrap();
    }

    // Only the latest attempt survives.
    let attempt = ctl.take_attempt().unwrap();
    assert_eq!(attempt.word, "second");
    assert!(ctl.take_attempt().is_none());
}

#[test]
fn monitor_classifies_room_and_input_level() {
    let mic = FakeInput::new();
    let mut ctl = controller(&mic);
    let t0 = Instant::now();
    begin_session(&mut ctl, t0);

    // Nothing heard yet.
    assert_eq!(ctl.monitor().level_status(), LevelStatus::Low);
    assert_eq!(ctl.monitor().room_status(), RoomStatus::Quiet);

    // Moderate ambient level: mid-scale on the meter, room counts as noisy.
    for _ in 0..5 {
        mic.push(tone_frame(0.2));
    }
    ctl.tick(t0 + Duration::from_millis(100)).unwrap();
    assert_eq!(ctl.monitor().level_status(), LevelStatus::Good);
    assert_eq!(ctl.monitor().room_status(), RoomStatus::Noisy);

    // Sustained near-full-scale input pushes the meter into clipping.
    for _ in 0..30 {
        mic.push(tone_frame(0.9));
    }
    ctl.tick(t0 + Duration::from_millis(200)).unwrap();
    assert_eq!(ctl.monitor().level_status(), LevelStatus::Clipping);
}

#[test]
fn noise_floor_stays_bounded_under_arbitrary_input() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut est = NoiseFloorEstimator::new(FloorConfig::default());
        for _ in 0..1000 {
            est.observe_peak(rng.gen::<f32>());
            assert!(est.floor().is_finite());
            assert!(est.floor() >= 0.0);
        }
        est.commit_snapshot();
        assert!(
            (0.01..=0.15).contains(&est.floor()),
            "seed {}: committed floor {} out of bounds",
            seed,
            est.floor()
        );
    }
}
