//! WAV encode/decode. The format is an implementation choice; 16-bit mono
//! PCM round-trips captured samples within quantization error, which is all
//! the comparison backend needs.

use std::io::Cursor;

use echocoach_foundation::DecodeError;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::buffer::SignalBuffer;

/// Encodes a buffer as 16-bit mono PCM WAV bytes.
pub fn encode_wav(buffer: &SignalBuffer) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        // Writing into an in-memory cursor cannot fail.
        let mut writer =
            WavWriter::new(&mut cursor, spec).expect("wav header write to memory cursor");
        for &s in buffer.samples() {
            let clamped = s.clamp(-1.0, 1.0);
            let v = if clamped < 0.0 {
                (clamped * 32768.0) as i16
            } else {
                (clamped * 32767.0) as i16
            };
            writer
                .write_sample(v)
                .expect("wav sample write to memory cursor");
        }
        writer.finalize().expect("wav finalize to memory cursor");
    }
    cursor.into_inner()
}

/// Decodes WAV bytes into a mono `SignalBuffer`. Multi-channel input keeps
/// the first channel only.
pub fn decode_wav(bytes: &[u8]) -> Result<SignalBuffer, DecodeError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(DecodeError::Malformed("zero sample rate".into()));
    }
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .step_by(channels)
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 8..=32) => {
            let shift = 1i64 << (spec.bits_per_sample - 1);
            reader
                .samples::<i32>()
                .step_by(channels)
                .map(|s| s.map(|v| v as f32 / shift as f32))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .step_by(channels)
            .collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(DecodeError::UnsupportedEncoding(format!(
                "{:?} {}-bit",
                format, bits
            )))
        }
    };

    Ok(SignalBuffer::new(samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_samples_within_quantization() {
        let original: Vec<f32> = (0..1600)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * 0.6)
            .collect();
        let buf = SignalBuffer::new(original.clone(), 16_000);

        let decoded = decode_wav(&encode_wav(&buf)).unwrap();
        assert_eq!(decoded.sample_rate(), 16_000);
        assert_eq!(decoded.len(), original.len());
        for (a, b) in original.iter().zip(decoded.samples()) {
            assert!((a - b).abs() < 1.0 / 32000.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        assert!(decode_wav(b"definitely not a wav file").is_err());
    }

    #[test]
    fn encode_clamps_out_of_range_samples() {
        let buf = SignalBuffer::new(vec![2.0, -2.0], 8000);
        let decoded = decode_wav(&encode_wav(&buf)).unwrap();
        assert!(decoded.samples()[0] > 0.99);
        assert!(decoded.samples()[1] < -0.99);
    }
}
