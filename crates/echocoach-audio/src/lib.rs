pub mod buffer;
pub mod capture;
pub mod codec;
pub mod level;

pub use buffer::SignalBuffer;
pub use capture::{AnalysisFrame, CaptureStats, MicrophoneCapture, ANALYSIS_FRAME_SAMPLES};
pub use codec::{decode_wav, encode_wav};
pub use level::{classify_peak, zero_crossing_rate, FrameLevel, LevelMeter, LevelStatus};
