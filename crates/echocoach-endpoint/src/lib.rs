//! Noise-adaptive endpointing engine.
//!
//! Three cooperating pieces share one noise-floor estimate:
//!
//! - [`AmbientMonitor`] listens between recordings and keeps the floor
//!   current, gated on app-idle, tab-visible and session-active.
//! - [`RecordingSession`] captures one attempt, running the auto-stop
//!   detector concurrently with accumulation.
//! - [`Endpointer`] trims leading and trailing silence from the finished
//!   attempt using the floor-relative thresholds.
//!
//! [`SessionController`] ties them together behind a single `dispatch`
//! entry point so the microphone is only ever time-shared.

pub mod config;
pub mod controller;
pub mod floor;
pub mod monitor;
pub mod session;
pub mod shared;
pub mod trim;

pub use config::{AutoStopConfig, EndpointConfig, FloorConfig, TrimConfig, TrimStrategy};
pub use controller::SessionController;
pub use floor::NoiseFloorEstimator;
pub use monitor::{AmbientMonitor, RoomStatus};
pub use session::{AutoStopDetector, RecordingAttempt, RecordingSession, StopReason};
pub use shared::{shared_session, AnalysisTap, AudioInput, SessionState, SharedSession};
pub use trim::{fixed_trim, Endpointer, FrameClassifier, PeakScan, Trimmer};
