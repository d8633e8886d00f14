//! Stream configuration types: sample formats and the immutable
//! per-session stream parameters.

use std::fmt;

use crate::error::{Result, StreamDspError};

/// PCM sample formats known to the platform audio layer.
///
/// Only five of these have a codec: [`F32`](Self::F32), [`I32`](Self::I32),
/// [`I16`](Self::I16), [`I8`](Self::I8) and [`U8`](Self::U8). The 24-bit
/// and vendor-custom kinds exist so the boundary can name them when
/// rejecting them; every codec path fails fast on both.
///
/// Each variant maps to exactly one native numeric representation and one
/// human-readable label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 32-bit IEEE float, normalized to [-1.0, 1.0).
    F32,
    /// 32-bit signed integer.
    I32,
    /// 24-bit signed integer. Unsupported; always rejected.
    I24,
    /// 16-bit signed integer.
    I16,
    /// 8-bit signed integer.
    I8,
    /// 8-bit unsigned integer (biased by 128, the WAV convention).
    U8,
    /// Vendor-specific format. Unsupported; always rejected.
    Custom,
}

impl SampleFormat {
    /// All five formats the codec accepts.
    pub const SUPPORTED: [SampleFormat; 5] = [
        SampleFormat::F32,
        SampleFormat::I32,
        SampleFormat::I16,
        SampleFormat::I8,
        SampleFormat::U8,
    ];

    /// Returns `true` if the codec can decode/encode this format.
    pub fn is_supported(self) -> bool {
        !matches!(self, SampleFormat::I24 | SampleFormat::Custom)
    }

    /// Human-readable label, matching the platform layer's descriptions.
    pub fn label(self) -> &'static str {
        match self {
            SampleFormat::F32 => "32 bit float",
            SampleFormat::I32 => "32 bit int",
            SampleFormat::I24 => "24 bit int",
            SampleFormat::I16 => "16 bit int",
            SampleFormat::I8 => "8 bit int",
            SampleFormat::U8 => "8 bit unsigned int",
            SampleFormat::Custom => "custom format",
        }
    }

    /// Width of one sample in bytes.
    ///
    /// # Errors
    ///
    /// [`StreamDspError::UnsupportedFormat`] for `I24` and `Custom`.
    pub fn sample_width(self) -> Result<usize> {
        match self {
            SampleFormat::F32 | SampleFormat::I32 => Ok(4),
            SampleFormat::I16 => Ok(2),
            SampleFormat::I8 | SampleFormat::U8 => Ok(1),
            SampleFormat::I24 | SampleFormat::Custom => {
                Err(StreamDspError::UnsupportedFormat { format: self })
            }
        }
    }

    /// Bit width of the representation (for quantization-step math).
    pub fn bit_width(self) -> u32 {
        match self {
            SampleFormat::F32 | SampleFormat::I32 => 32,
            SampleFormat::I24 => 24,
            SampleFormat::I16 => 16,
            SampleFormat::I8 | SampleFormat::U8 => 8,
            // No defined width; never reaches the quantization math.
            SampleFormat::Custom => 0,
        }
    }

    /// `2^(bits-1)`: the normalization divisor for integer formats.
    pub(crate) fn abs_max(self) -> f64 {
        f64::from(2u32).powi(self.bit_width() as i32 - 1)
    }

    /// Bias applied before normalization: `min_representable + abs_max`.
    ///
    /// Zero for two's-complement signed formats, 128 for `U8`.
    pub(crate) fn zero_offset(self) -> f64 {
        match self {
            SampleFormat::U8 => 128.0,
            _ => 0.0,
        }
    }

    /// Smallest and largest representable integer values, as f64.
    pub(crate) fn integer_range(self) -> (f64, f64) {
        match self {
            SampleFormat::I32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
            SampleFormat::I16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
            SampleFormat::I8 => (f64::from(i8::MIN), f64::from(i8::MAX)),
            SampleFormat::U8 => (0.0, 255.0),
            // Not meaningful for float or unsupported kinds.
            _ => (f64::MIN, f64::MAX),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable stream parameters for one session.
///
/// Fixed once the session is opened. When a topology reads from a file,
/// the file's own width/channels/rate authoritatively override these
/// values for the decode/encode path.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Samples per channel delivered to each callback. Power of two
    /// recommended.
    pub frame_size: usize,
    /// Channel count. The session layer supports exactly two.
    pub channels: u16,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Wire format at the device boundary.
    pub format: SampleFormat,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            channels: 2,
            rate: 44100,
            format: SampleFormat::F32,
        }
    }
}

impl StreamConfig {
    /// Byte stride of one interleaved frame.
    pub fn frame_bytes(&self) -> Result<usize> {
        Ok(self.format.sample_width()? * self.channels as usize)
    }

    /// Latency contributed by one callback buffer, in milliseconds.
    pub fn buffer_latency_ms(&self) -> f64 {
        1000.0 * self.frame_size as f64 / f64::from(self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_labels() {
        assert_eq!(SampleFormat::F32.label(), "32 bit float");
        assert_eq!(SampleFormat::I16.label(), "16 bit int");
        assert_eq!(SampleFormat::U8.label(), "8 bit unsigned int");
        assert_eq!(SampleFormat::Custom.label(), "custom format");
    }

    #[test]
    fn test_sample_width() {
        assert_eq!(SampleFormat::F32.sample_width().unwrap(), 4);
        assert_eq!(SampleFormat::I32.sample_width().unwrap(), 4);
        assert_eq!(SampleFormat::I16.sample_width().unwrap(), 2);
        assert_eq!(SampleFormat::I8.sample_width().unwrap(), 1);
        assert_eq!(SampleFormat::U8.sample_width().unwrap(), 1);
    }

    #[test]
    fn test_unsupported_widths_fail() {
        assert!(SampleFormat::I24.sample_width().is_err());
        assert!(SampleFormat::Custom.sample_width().is_err());
    }

    #[test]
    fn test_abs_max_and_offset() {
        assert_eq!(SampleFormat::I16.abs_max(), 32768.0);
        assert_eq!(SampleFormat::I8.abs_max(), 128.0);
        assert_eq!(SampleFormat::U8.abs_max(), 128.0);
        assert_eq!(SampleFormat::I16.zero_offset(), 0.0);
        assert_eq!(SampleFormat::U8.zero_offset(), 128.0);
    }

    #[test]
    fn test_stream_config_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.frame_size, 1024);
        assert_eq!(config.channels, 2);
        assert_eq!(config.rate, 44100);
        assert_eq!(config.format, SampleFormat::F32);
        assert_eq!(config.frame_bytes().unwrap(), 8);
    }

    #[test]
    fn test_buffer_latency() {
        let config = StreamConfig::default();
        // 1024 frames at 44100 Hz is about 23.2 ms
        let latency = config.buffer_latency_ms();
        assert!((latency - 23.219).abs() < 0.01);
    }
}
