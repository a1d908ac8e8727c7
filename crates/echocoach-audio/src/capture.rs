//! cpal-backed microphone capture. One `MicrophoneCapture` owns the physical
//! input device for exactly one purpose at a time (ambient listening or
//! attempt capture); dropping it releases the hardware synchronously.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use echocoach_foundation::DeviceError;

/// One analysis frame of mono float samples, timestamped at capture.
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    pub samples: Arc<[f32]>,
    pub timestamp: Instant,
    pub sample_rate: u32,
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub frames_captured: AtomicU64,
    pub frames_dropped: AtomicU64,
}

/// Frames queue up in a bounded channel; a stalled consumer drops the oldest
/// work on the producer side rather than blocking the audio callback.
const FRAME_QUEUE_CAPACITY: usize = 64;

/// Samples per analysis frame delivered to consumers. Matches the 2048-point
/// analysis window used for level metering.
pub const ANALYSIS_FRAME_SAMPLES: usize = 2048;

pub struct MicrophoneCapture {
    // Held for its lifetime only; dropping stops the stream and frees the
    // hardware.
    _stream: Stream,
    frames: Receiver<AnalysisFrame>,
    sample_rate: u32,
    stats: Arc<CaptureStats>,
}

impl MicrophoneCapture {
    /// Opens the named input device (or the host default) and starts
    /// streaming mono frames. Fails with `DeviceError` if the device is
    /// missing, busy, or speaks no supported format.
    pub fn open(device_name: Option<&str>) -> Result<Self, DeviceError> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|_| DeviceError::NotFound {
                    name: Some(name.to_string()),
                })?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::NotFound {
                    name: Some(name.to_string()),
                })?,
            None => host.default_input_device().ok_or(DeviceError::NotFound { name: None })?,
        };

        if let Ok(name) = device.name() {
            tracing::info!("Opening input device: {}", name);
        }

        let (config, sample_format) = negotiate_config(&device)?;
        let sample_rate = config.sample_rate.0;
        let channels = config.channels as usize;

        let (tx, rx) = crossbeam_channel::bounded(FRAME_QUEUE_CAPACITY);
        let stats = Arc::new(CaptureStats::default());
        let stream = build_stream(&device, &config, sample_format, channels, tx, stats.clone())?;
        stream.play()?;

        Ok(Self {
            _stream: stream,
            frames: rx,
            sample_rate,
            stats,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Next queued frame, if any. Non-blocking; callers poll on their own
    /// tick and must tolerate zero or several frames per tick.
    pub fn try_next_frame(&self) -> Option<AnalysisFrame> {
        self.frames.try_recv().ok()
    }

}

struct FrameAssembler {
    pending: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    tx: Sender<AnalysisFrame>,
    stats: Arc<CaptureStats>,
}

impl FrameAssembler {
    /// Downmixes to mono (first channel) and emits fixed-size frames.
    fn push(&mut self, interleaved: &[f32]) {
        for chunk in interleaved.chunks(self.channels) {
            self.pending.push(chunk[0]);
        }
        while self.pending.len() >= ANALYSIS_FRAME_SAMPLES {
            let rest = self.pending.split_off(ANALYSIS_FRAME_SAMPLES);
            let frame = AnalysisFrame {
                samples: std::mem::replace(&mut self.pending, rest).into(),
                timestamp: Instant::now(),
                sample_rate: self.sample_rate,
            };
            match self.tx.try_send(frame) {
                Ok(()) => {
                    self.stats.frames_captured.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                    self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    channels: usize,
    tx: Sender<AnalysisFrame>,
    stats: Arc<CaptureStats>,
) -> Result<Stream, DeviceError> {
    let mut assembler = FrameAssembler {
        pending: Vec::with_capacity(ANALYSIS_FRAME_SAMPLES * 2),
        channels: channels.max(1),
        sample_rate: config.sample_rate.0,
        tx,
        stats,
    };

    let err_fn = |err: cpal::StreamError| {
        tracing::error!("Audio stream error: {}", err);
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &_| assembler.push(data),
            err_fn,
            None,
        )?,
        SampleFormat::I16 => {
            let mut convert = Vec::new();
            device.build_input_stream(
                config,
                move |data: &[i16], _: &_| {
                    convert.clear();
                    convert.extend(data.iter().map(|&s| s as f32 / 32768.0));
                    assembler.push(&convert);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let mut convert = Vec::new();
            device.build_input_stream(
                config,
                move |data: &[u16], _: &_| {
                    convert.clear();
                    convert.extend(data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0));
                    assembler.push(&convert);
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(DeviceError::FormatNotSupported {
                format: format!("{:?}", other),
            })
        }
    };

    Ok(stream)
}

fn negotiate_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), DeviceError> {
    if let Ok(default_config) = device.default_input_config() {
        return Ok((
            StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            default_config.sample_format(),
        ));
    }

    let mut configs = device.supported_input_configs()?;
    if let Some(config) = configs.next() {
        return Ok((config.with_max_sample_rate().into(), config.sample_format()));
    }

    Err(DeviceError::FormatNotSupported {
        format: "no supported input formats".to_string(),
    })
}
