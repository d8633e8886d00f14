//! Interleaved PCM byte codec.
//!
//! Integer samples map onto [-1.0, 1.0) with
//! `value = (raw - offset) / abs_max` where `abs_max = 2^(bits-1)` and
//! `offset = min_representable + abs_max`; the encoder is the exact
//! inverse, `raw = clip(round(value * abs_max + offset), min, max)`.
//! Out-of-range values clamp (no wraparound) and no dithering is applied.
//! Float samples pass through both directions unchanged.

use crate::config::SampleFormat;
use crate::error::{Result, StreamDspError};

/// Decodes an interleaved PCM byte buffer into a stereo pair of
/// normalized `f32` channel vectors.
///
/// The buffer is interpreted as little-endian frames of `channels`
/// samples each; channel 0 and channel 1 are returned. `channels` must
/// be at least two (the session layer is stereo-only; samples of any
/// additional channels are skipped).
///
/// # Errors
///
/// - [`StreamDspError::UnsupportedFormat`] for 24-bit or custom formats,
///   on every input including empty.
/// - [`StreamDspError::MalformedBuffer`] if the byte length is not an
///   exact multiple of `channels * sample_width`, or `channels < 2`.
pub fn decode_pcm(
    bytes: &[u8],
    channels: u16,
    format: SampleFormat,
) -> Result<(Vec<f32>, Vec<f32>)> {
    let width = format.sample_width()?;
    let frame_bytes = width * channels as usize;
    if channels < 2 {
        return Err(StreamDspError::MalformedBuffer {
            len: bytes.len(),
            frame_bytes,
        });
    }
    if bytes.len() % frame_bytes != 0 {
        return Err(StreamDspError::MalformedBuffer {
            len: bytes.len(),
            frame_bytes,
        });
    }

    let frames = bytes.len() / frame_bytes;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in bytes.chunks_exact(frame_bytes) {
        left.push(sample_to_f32(&frame[..width], format));
        right.push(sample_to_f32(&frame[width..2 * width], format));
    }
    Ok((left, right))
}

/// Encodes a stereo pair of `f32` channel vectors back into an
/// interleaved little-endian PCM byte buffer.
///
/// Exact inverse of [`decode_pcm`]: output is frame-interleaved
/// (L, R, L, R, ...), never channel-major.
///
/// # Errors
///
/// - [`StreamDspError::UnsupportedFormat`] for 24-bit or custom formats.
/// - [`StreamDspError::ChannelMismatch`] if the channel lengths differ.
pub fn encode_pcm(left: &[f32], right: &[f32], format: SampleFormat) -> Result<Vec<u8>> {
    let width = format.sample_width()?;
    if left.len() != right.len() {
        return Err(StreamDspError::ChannelMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    let mut bytes = Vec::with_capacity(left.len() * width * 2);
    for (&l, &r) in left.iter().zip(right) {
        write_sample(&mut bytes, l, format);
        write_sample(&mut bytes, r, format);
    }
    Ok(bytes)
}

/// Reads one little-endian sample and normalizes it to f32.
///
/// `bytes` is exactly `sample_width` long; callers guarantee the format
/// is one of the five supported kinds.
fn sample_to_f32(bytes: &[u8], format: SampleFormat) -> f32 {
    let abs_max = format.abs_max();
    let offset = format.zero_offset();
    match format {
        SampleFormat::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        SampleFormat::I32 => {
            let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            ((f64::from(raw) - offset) / abs_max) as f32
        }
        SampleFormat::I16 => {
            let raw = i16::from_le_bytes([bytes[0], bytes[1]]);
            ((f64::from(raw) - offset) / abs_max) as f32
        }
        SampleFormat::I8 => {
            let raw = bytes[0] as i8;
            ((f64::from(raw) - offset) / abs_max) as f32
        }
        SampleFormat::U8 => ((f64::from(bytes[0]) - offset) / abs_max) as f32,
        SampleFormat::I24 | SampleFormat::Custom => unreachable!("rejected by sample_width"),
    }
}

/// Quantizes one normalized f32 sample and appends its little-endian bytes.
fn write_sample(out: &mut Vec<u8>, value: f32, format: SampleFormat) {
    if format == SampleFormat::F32 {
        out.extend_from_slice(&value.to_le_bytes());
        return;
    }

    let (min, max) = format.integer_range();
    let scaled = (f64::from(value) * format.abs_max() + format.zero_offset())
        .round()
        .clamp(min, max);
    match format {
        SampleFormat::I32 => out.extend_from_slice(&(scaled as i32).to_le_bytes()),
        SampleFormat::I16 => out.extend_from_slice(&(scaled as i16).to_le_bytes()),
        SampleFormat::I8 => out.push((scaled as i8) as u8),
        SampleFormat::U8 => out.push(scaled as u8),
        SampleFormat::F32 | SampleFormat::I24 | SampleFormat::Custom => {
            unreachable!("handled above or rejected by sample_width")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_deinterleaves_frames() {
        // Two stereo frames: (100, -200), (300, -400)
        let bytes = i16_bytes(&[100, -200, 300, -400]);
        let (left, right) = decode_pcm(&bytes, 2, SampleFormat::I16).unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(right.len(), 2);
        assert_eq!(left[0], 100.0 / 32768.0);
        assert_eq!(right[0], -200.0 / 32768.0);
        assert_eq!(left[1], 300.0 / 32768.0);
        assert_eq!(right[1], -400.0 / 32768.0);
    }

    #[test]
    fn test_encode_is_frame_interleaved() {
        let left = [100.0 / 32768.0, 300.0 / 32768.0];
        let right = [-200.0 / 32768.0, -400.0 / 32768.0];
        let bytes = encode_pcm(&left, &right, SampleFormat::I16).unwrap();
        assert_eq!(bytes, i16_bytes(&[100, -200, 300, -400]));
    }

    #[test]
    fn test_i16_roundtrip_is_exact() {
        // decode then immediate encode back to Int16 must reproduce the
        // original integer samples exactly
        let original: Vec<i16> = vec![0, 1, -1, 1000, -1000, 12345, i16::MAX, i16::MIN];
        let bytes = i16_bytes(&original);
        let (left, right) = decode_pcm(&bytes, 2, SampleFormat::I16).unwrap();
        let encoded = encode_pcm(&left, &right, SampleFormat::I16).unwrap();
        assert_eq!(encoded, bytes);
    }

    #[test]
    fn test_quantization_within_one_step() {
        for format in [SampleFormat::I16, SampleFormat::I8, SampleFormat::U8] {
            let step = 1.0 / format.abs_max() as f32;
            let values = [0.0f32, 0.25, -0.25, 0.33337, -0.9999, 0.5 * step];
            let (l, r): (Vec<f32>, Vec<f32>) = (values.to_vec(), values.to_vec());
            let bytes = encode_pcm(&l, &r, format).unwrap();
            let (decoded, _) = decode_pcm(&bytes, 2, format).unwrap();
            for (orig, round) in values.iter().zip(&decoded) {
                assert!(
                    (orig - round).abs() <= step,
                    "{format}: {orig} -> {round} exceeds one quantization step"
                );
            }
            // A second pass over the already-quantized values is a fixed point.
            let bytes2 = encode_pcm(&decoded, &decoded, format).unwrap();
            let (decoded2, _) = decode_pcm(&bytes2, 2, format).unwrap();
            assert_eq!(decoded, decoded2, "{format} not idempotent");
        }
    }

    #[test]
    fn test_clipping_saturates() {
        let bytes = encode_pcm(&[1.5], &[-1.5], SampleFormat::I16).unwrap();
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MIN);
    }

    #[test]
    fn test_u8_bias() {
        // Silence encodes to the unsigned midpoint
        let bytes = encode_pcm(&[0.0], &[0.0], SampleFormat::U8).unwrap();
        assert_eq!(bytes, vec![128, 128]);
        let (left, _) = decode_pcm(&[0, 255, 128, 128], 2, SampleFormat::U8).unwrap();
        assert_eq!(left[0], -1.0);
        assert_eq!(left[1], 0.0);
    }

    #[test]
    fn test_f32_passthrough() {
        let left = [0.5f32, -0.75];
        let right = [0.25f32, 1.0];
        let bytes = encode_pcm(&left, &right, SampleFormat::F32).unwrap();
        let (l2, r2) = decode_pcm(&bytes, 2, SampleFormat::F32).unwrap();
        assert_eq!(l2, left);
        assert_eq!(r2, right);
    }

    #[test]
    fn test_unsupported_formats_always_fail() {
        for format in [SampleFormat::I24, SampleFormat::Custom] {
            assert!(matches!(
                decode_pcm(&[], 2, format),
                Err(StreamDspError::UnsupportedFormat { .. })
            ));
            assert!(matches!(
                decode_pcm(&[0u8; 12], 2, format),
                Err(StreamDspError::UnsupportedFormat { .. })
            ));
            assert!(matches!(
                encode_pcm(&[0.0], &[0.0], format),
                Err(StreamDspError::UnsupportedFormat { .. })
            ));
        }
    }

    #[test]
    fn test_frame_alignment() {
        // 2 channels of i16: length must be a multiple of 4
        for len in [1usize, 2, 3, 5, 6, 7, 9] {
            let bytes = vec![0u8; len];
            assert!(
                matches!(
                    decode_pcm(&bytes, 2, SampleFormat::I16),
                    Err(StreamDspError::MalformedBuffer { .. })
                ),
                "length {len} should be rejected"
            );
        }
        for len in [0usize, 4, 8, 400] {
            let bytes = vec![0u8; len];
            let (left, right) = decode_pcm(&bytes, 2, SampleFormat::I16).unwrap();
            assert_eq!(left.len(), len / 4);
            assert_eq!(right.len(), len / 4);
        }
    }

    #[test]
    fn test_encode_rejects_mismatched_channels() {
        assert!(matches!(
            encode_pcm(&[0.0, 0.0], &[0.0], SampleFormat::I16),
            Err(StreamDspError::ChannelMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn test_extra_channels_skipped() {
        // 4-channel frames: only channels 0 and 1 come back
        let bytes = i16_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let (left, right) = decode_pcm(&bytes, 4, SampleFormat::I16).unwrap();
        assert_eq!(left, vec![1.0 / 32768.0, 5.0 / 32768.0]);
        assert_eq!(right, vec![2.0 / 32768.0, 6.0 / 32768.0]);
    }
}
