use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Microphone error: {0}")]
    Device(#[from] DeviceError),

    #[error("Audio decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Recording too short: {got_ms}ms of usable audio (minimum {min_ms}ms)")]
    TooShort { got_ms: u64, min_ms: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Microphone busy or already held")]
    Busy,

    #[error("Device not found: {name:?}")]
    NotFound { name: Option<String> },

    #[error("Device disconnected")]
    Disconnected,

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Stream error: {0}")]
    Stream(#[from] cpal::StreamError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed audio data: {0}")]
    Malformed(String),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// What the caller should do after an error. Nothing in this taxonomy is
/// fatal to the process; every path must leave the busy flag cleared and the
/// monitor in a consistent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryHint {
    /// Retry the same operation (permissions fixed, network back, ...).
    Retry,
    /// Discard the attempt and record again.
    Rerecord,
    /// Report and carry on.
    Ignore,
}

impl AppError {
    pub fn recovery_hint(&self) -> RecoveryHint {
        match self {
            AppError::Device(_) => RecoveryHint::Retry,
            AppError::Network(_) => RecoveryHint::Retry,
            AppError::TooShort { .. } => RecoveryHint::Rerecord,
            AppError::Decode(_) => RecoveryHint::Rerecord,
            AppError::Config(_) => RecoveryHint::Ignore,
        }
    }

    /// Short string for the UI collaborator's message box.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Device(DeviceError::PermissionDenied) => "MIC BLOCKED",
            AppError::Device(_) => "MIC ERROR",
            AppError::Decode(_) => "PROCESSING ERROR",
            AppError::TooShort { .. } => "TOO SHORT - TRY AGAIN",
            AppError::Network(_) => "NETWORK ERROR",
            AppError::Config(_) => "CONFIG ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_suggest_retry() {
        let err = AppError::Device(DeviceError::PermissionDenied);
        assert_eq!(err.recovery_hint(), RecoveryHint::Retry);
        assert_eq!(err.user_message(), "MIC BLOCKED");
    }

    #[test]
    fn too_short_requires_rerecord() {
        let err = AppError::TooShort {
            got_ms: 40,
            min_ms: 100,
        };
        assert_eq!(err.recovery_hint(), RecoveryHint::Rerecord);
        assert!(err.to_string().contains("40ms"));
    }
}
