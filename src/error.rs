//! Error types for stream-dsp.
//!
//! Every variant here is fatal at the point of occurrence: configuration
//! and open-time failures abort session startup, and codec failures inside
//! an active stream terminate it. The only expected "failure" in a running
//! stream is end-of-file on a file source, which is signalled out of band
//! as a normal completion, not as an error.

use std::path::PathBuf;

use crate::config::SampleFormat;

/// Convenience result type for stream-dsp operations.
pub type Result<T> = std::result::Result<T, StreamDspError>;

/// Fatal errors raised by the streaming session core.
#[derive(Debug, thiserror::Error)]
pub enum StreamDspError {
    /// The sample format has no supported PCM codec (24-bit and
    /// vendor-custom formats always fail).
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The rejected format.
        format: SampleFormat,
    },

    /// A raw PCM buffer does not divide into whole frames.
    #[error("malformed PCM buffer: {len} bytes is not a multiple of the {frame_bytes}-byte frame size")]
    MalformedBuffer {
        /// Byte length of the offending buffer.
        len: usize,
        /// Expected frame stride (`channels * sample_width`).
        frame_bytes: usize,
    },

    /// The two channel sequences given to the encoder differ in length.
    #[error("channel length mismatch: left has {left} samples, right has {right}")]
    ChannelMismatch {
        /// Left channel sample count.
        left: usize,
        /// Right channel sample count.
        right: usize,
    },

    /// A device endpoint required by the stream topology was not found.
    #[error("no supported audio devices for current stream mode: '{name}' not found")]
    UnresolvedEndpoint {
        /// The device name that failed to resolve.
        name: String,
    },

    /// The platform audio layer rejected the format/channels/rate combination.
    #[error("unsupported audio configuration: {format}, {channels} channels @ {rate} Hz on '{device}'")]
    UnsupportedConfiguration {
        /// Requested sample format.
        format: SampleFormat,
        /// Requested channel count.
        channels: u16,
        /// Requested sample rate in Hz.
        rate: u32,
        /// Name of the device that rejected the combination.
        device: String,
    },

    /// A source or sink file could not be opened.
    #[error("failed to open {path}: {reason}")]
    FileOpen {
        /// Path of the file.
        path: PathBuf,
        /// Why the open failed.
        reason: String,
    },

    /// A file-bearing topology was configured without the corresponding path.
    #[error("stream mode requires an {role} file but none was provided")]
    MissingFile {
        /// Which side of the pipeline lacks a file ("input" or "output").
        role: &'static str,
    },

    /// The topology selector did not map to a known stream mode.
    ///
    /// Unreachable through the public API (the topology enumeration is
    /// closed) but kept so the selection layer can fail explicitly.
    #[error("unsupported stream mode")]
    UnsupportedStreamMode,

    /// A lifecycle operation was invoked in the wrong session state.
    #[error("session is {actual}, expected {expected}")]
    InvalidState {
        /// State the operation requires.
        expected: &'static str,
        /// State the session is actually in.
        actual: &'static str,
    },

    /// An error from the underlying audio backend (CPAL).
    #[error("audio backend error: {0}")]
    Backend(String),

    /// A WAV read/write error from the file boundary.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// A settings file could not be parsed, or a required key is missing.
    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Standard I/O error (settings persistence).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_endpoint_display() {
        let err = StreamDspError::UnresolvedEndpoint {
            name: "Soundflower (2ch)".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no supported audio devices for current stream mode: 'Soundflower (2ch)' not found"
        );
    }

    #[test]
    fn test_malformed_buffer_display() {
        let err = StreamDspError::MalformedBuffer {
            len: 5,
            frame_bytes: 4,
        };
        assert!(err.to_string().contains("5 bytes"));
        assert!(err.to_string().contains("4-byte"));
    }

    #[test]
    fn test_unsupported_format_display() {
        let err = StreamDspError::UnsupportedFormat {
            format: SampleFormat::I24,
        };
        assert_eq!(err.to_string(), "unsupported sample format: 24 bit int");
    }
}
