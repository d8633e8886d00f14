//! WAV file boundary.
//!
//! [`FileSource`] and [`FileSink`] adapt hound readers/writers to the
//! byte-oriented callback pipeline: sources hand out interleaved
//! little-endian frames in the file's native format, sinks take the same
//! bytes back. The sink's header is finalized exactly once, on close.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use hound::{SampleFormat as WavSampleFormat, WavReader, WavSpec, WavWriter};

use crate::config::SampleFormat;
use crate::error::{Result, StreamDspError};

/// A WAV file opened for frame-by-frame reading.
///
/// The file's own format, channel count and rate are authoritative: they
/// override the session's configured values for any topology that reads
/// from a file.
pub struct FileSource {
    reader: WavReader<BufReader<File>>,
    format: SampleFormat,
    path: PathBuf,
}

impl FileSource {
    /// Opens a WAV file for reading.
    ///
    /// # Errors
    ///
    /// [`StreamDspError::FileOpen`] if the file cannot be opened or is
    /// not a RIFF/WAVE file; [`StreamDspError::UnsupportedFormat`] if the
    /// sample width has no codec (24-bit PCM in particular).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path).map_err(|e| StreamDspError::FileOpen {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let format = format_from_spec(&reader.spec())?;
        Ok(Self {
            reader,
            format,
            path,
        })
    }

    /// The file's native sample format.
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// The file's channel count.
    pub fn channels(&self) -> u16 {
        self.reader.spec().channels
    }

    /// The file's sample rate in Hz.
    pub fn rate(&self) -> u32 {
        self.reader.spec().sample_rate
    }

    /// Total number of frames in the file.
    pub fn frame_count(&self) -> u32 {
        self.reader.duration()
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads up to `frames` interleaved frames as native-format
    /// little-endian bytes. An empty vector signals end of stream.
    pub fn read_frames(&mut self, frames: usize) -> Result<Vec<u8>> {
        let wanted = frames * self.channels() as usize;
        let width = self.format.sample_width()?;
        let mut bytes = Vec::with_capacity(wanted * width);
        match self.format {
            SampleFormat::I16 => {
                for sample in self.reader.samples::<i16>().take(wanted) {
                    bytes.extend_from_slice(&sample?.to_le_bytes());
                }
            }
            SampleFormat::I32 => {
                for sample in self.reader.samples::<i32>().take(wanted) {
                    bytes.extend_from_slice(&sample?.to_le_bytes());
                }
            }
            SampleFormat::F32 => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    bytes.extend_from_slice(&sample?.to_le_bytes());
                }
            }
            format => return Err(StreamDspError::UnsupportedFormat { format }),
        }
        Ok(bytes)
    }
}

/// A WAV file opened for writing processed output.
///
/// The spec (format, channels, rate) is fixed at creation, before the
/// first write, and the header is patched when [`finalize`](Self::finalize)
/// runs. Dropping an unfinalized sink still writes a valid header via
/// hound's own drop, but `finalize` is the supported path.
pub struct FileSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    format: SampleFormat,
    path: PathBuf,
}

impl FileSink {
    /// Creates a WAV file with the given stream parameters.
    pub fn create(
        path: impl AsRef<Path>,
        format: SampleFormat,
        channels: u16,
        rate: u32,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = spec_from_format(format, channels, rate)?;
        let writer = WavWriter::create(&path, spec).map_err(|e| StreamDspError::FileOpen {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            writer: Some(writer),
            format,
            path,
        })
    }

    /// Creates a sink mirroring a source's format, channels and rate.
    pub fn mirroring(path: impl AsRef<Path>, source: &FileSource) -> Result<Self> {
        Self::create(path, source.format(), source.channels(), source.rate())
    }

    /// The sink's sample format.
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Path the sink writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one block of interleaved little-endian bytes.
    ///
    /// # Errors
    ///
    /// [`StreamDspError::MalformedBuffer`] if the byte length does not
    /// divide into whole samples; write errors propagate as
    /// [`StreamDspError::Wav`].
    pub fn write_block(&mut self, bytes: &[u8]) -> Result<()> {
        let width = self.format.sample_width()?;
        if bytes.len() % width != 0 {
            return Err(StreamDspError::MalformedBuffer {
                len: bytes.len(),
                frame_bytes: width,
            });
        }
        let writer = self.writer.as_mut().ok_or(StreamDspError::InvalidState {
            expected: "open sink",
            actual: "finalized",
        })?;
        match self.format {
            SampleFormat::I16 => {
                for chunk in bytes.chunks_exact(2) {
                    writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
                }
            }
            SampleFormat::I32 => {
                for chunk in bytes.chunks_exact(4) {
                    writer.write_sample(i32::from_le_bytes([
                        chunk[0], chunk[1], chunk[2], chunk[3],
                    ]))?;
                }
            }
            SampleFormat::F32 => {
                for chunk in bytes.chunks_exact(4) {
                    writer.write_sample(f32::from_le_bytes([
                        chunk[0], chunk[1], chunk[2], chunk[3],
                    ]))?;
                }
            }
            format => return Err(StreamDspError::UnsupportedFormat { format }),
        }
        Ok(())
    }

    /// Flushes buffered samples and patches the RIFF header with the
    /// final sizes. Idempotent: repeated calls are no-ops.
    pub fn finalize(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

/// Maps a WAV spec to the codec's sample format.
fn format_from_spec(spec: &WavSpec) -> Result<SampleFormat> {
    match (spec.sample_format, spec.bits_per_sample) {
        (WavSampleFormat::Float, 32) => Ok(SampleFormat::F32),
        (WavSampleFormat::Int, 32) => Ok(SampleFormat::I32),
        (WavSampleFormat::Int, 24) => Err(StreamDspError::UnsupportedFormat {
            format: SampleFormat::I24,
        }),
        (WavSampleFormat::Int, 16) => Ok(SampleFormat::I16),
        _ => Err(StreamDspError::UnsupportedFormat {
            format: SampleFormat::Custom,
        }),
    }
}

/// Maps a codec sample format back to a WAV spec.
fn spec_from_format(format: SampleFormat, channels: u16, rate: u32) -> Result<WavSpec> {
    let (sample_format, bits) = match format {
        SampleFormat::F32 => (WavSampleFormat::Float, 32),
        SampleFormat::I32 => (WavSampleFormat::Int, 32),
        SampleFormat::I16 => (WavSampleFormat::Int, 16),
        _ => return Err(StreamDspError::UnsupportedFormat { format }),
    };
    Ok(WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: bits,
        sample_format,
    })
}
