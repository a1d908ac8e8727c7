//! cpal adapter for the engine's microphone port.

use echocoach_audio::{AnalysisFrame, MicrophoneCapture};
use echocoach_endpoint::{AnalysisTap, AudioInput};
use echocoach_foundation::DeviceError;

/// Opens the named input device (or the host default) on each acquire.
/// Acquiring starts the stream; dropping the tap stops it and frees the
/// hardware, which is what lets the monitor and the recorder time-share one
/// physical microphone.
pub struct CpalInput {
    device_name: Option<String>,
}

impl CpalInput {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

pub struct CpalTap {
    capture: MicrophoneCapture,
}

impl AudioInput for CpalInput {
    type Tap = CpalTap;

    fn acquire(&mut self) -> Result<CpalTap, DeviceError> {
        let capture = MicrophoneCapture::open(self.device_name.as_deref())?;
        tracing::debug!(rate = capture.sample_rate(), "capture stream opened");
        Ok(CpalTap { capture })
    }
}

impl AnalysisTap for CpalTap {
    fn try_next_frame(&mut self) -> Option<AnalysisFrame> {
        self.capture.try_next_frame()
    }
}

impl Drop for CpalTap {
    fn drop(&mut self) {
        let stats = self.capture.stats();
        let dropped = stats.frames_dropped.load(std::sync::atomic::Ordering::Relaxed);
        if dropped > 0 {
            let captured = stats.frames_captured.load(std::sync::atomic::Ordering::Relaxed);
            tracing::warn!(dropped, captured, "frames lost to a stalled consumer");
        }
    }
}
