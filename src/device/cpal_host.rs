//! CPAL implementation of the audio host boundary.
//!
//! The session core is byte-oriented, so streams are opened through
//! CPAL's raw-byte API and the codec layer never sees typed samples.
//! A full-duplex "stream" is one capture stream and one playback stream
//! wired through a lock-free SPSC ring buffer; the per-buffer callback
//! runs entirely on the capture thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;

use crate::config::SampleFormat;
use crate::device::{AudioHost, DeviceCallback, DeviceStream, EndpointRef, StreamDescriptor, StreamFlow};
use crate::error::{Result, StreamDspError};

/// How many callback buffers the duplex ring absorbs before the capture
/// side starts overwriting silence on the playback side.
const DUPLEX_RING_BUFFERS: usize = 8;

/// Production audio host backed by the platform's default CPAL host.
pub struct CpalHost {
    host: cpal::Host,
}

impl CpalHost {
    /// Creates a host over the platform default backend.
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Finds the CPAL device a resolved endpoint refers to.
    fn find_device(&self, endpoint: Option<&EndpointRef>) -> Result<cpal::Device> {
        let endpoint = endpoint.filter(|e| e.is_resolved()).ok_or_else(|| {
            StreamDspError::UnresolvedEndpoint {
                name: endpoint.map_or_else(String::new, |e| e.name.clone()),
            }
        })?;
        let devices = self
            .host
            .devices()
            .map_err(|e| StreamDspError::Backend(e.to_string()))?;
        for device in devices {
            if device.name().is_ok_and(|name| name == endpoint.name) {
                return Ok(device);
            }
        }
        Err(StreamDspError::UnresolvedEndpoint {
            name: endpoint.name.clone(),
        })
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for CpalHost {
    fn device_names(&self) -> Result<Vec<String>> {
        let devices = self
            .host
            .devices()
            .map_err(|e| StreamDspError::Backend(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn supports(
        &self,
        endpoint: &EndpointRef,
        format: SampleFormat,
        channels: u16,
        rate: u32,
    ) -> bool {
        let Ok(device) = self.find_device(Some(endpoint)) else {
            return false;
        };
        let Ok(wanted) = to_cpal_format(format) else {
            return false;
        };

        let matches = |range: &SupportedStreamConfigRange| {
            range.sample_format() == wanted
                && range.channels() >= channels
                && range.min_sample_rate().0 <= rate
                && rate <= range.max_sample_rate().0
        };

        if let Ok(mut configs) = device.supported_input_configs() {
            if configs.any(|c| matches(&c)) {
                return true;
            }
        }
        if let Ok(mut configs) = device.supported_output_configs() {
            if configs.any(|c| matches(&c)) {
                return true;
            }
        }
        false
    }

    fn open_stream(
        &self,
        descriptor: &StreamDescriptor,
        callback: DeviceCallback,
    ) -> Result<Box<dyn DeviceStream>> {
        let sample_format = to_cpal_format(descriptor.format)?;
        let frame_bytes = descriptor.format.sample_width()? * descriptor.channels as usize;
        let silence = silence_byte(descriptor.format);
        let config = cpal::StreamConfig {
            channels: descriptor.channels,
            sample_rate: cpal::SampleRate(descriptor.rate),
            buffer_size: cpal::BufferSize::Fixed(descriptor.frame_size as u32),
        };

        let active = Arc::new(AtomicBool::new(true));
        let period_ms = 1000.0 * descriptor.frame_size as f64 / f64::from(descriptor.rate);

        let (input, output) = match (descriptor.enable_input, descriptor.enable_output) {
            (true, true) => {
                let input_device = self.find_device(descriptor.input.as_ref())?;
                let output_device = self.find_device(descriptor.output.as_ref())?;

                // Output thread only ever pops; capture thread only pushes.
                let ring = HeapRb::<u8>::new(
                    frame_bytes * descriptor.frame_size * DUPLEX_RING_BUFFERS,
                );
                let (mut producer, mut consumer) = ring.split();

                let input_stream = build_capture(
                    &input_device,
                    &config,
                    sample_format,
                    frame_bytes,
                    Arc::clone(&active),
                    callback,
                    move |out| {
                        let pushed = producer.push_slice(out);
                        if pushed < out.len() {
                            tracing::trace!(
                                "playback ring full, dropped {} bytes",
                                out.len() - pushed
                            );
                        }
                    },
                )?;

                let active_out = Arc::clone(&active);
                let output_stream = output_device
                    .build_output_stream_raw(
                        &config,
                        sample_format,
                        move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                            let buffer = data.bytes_mut();
                            let filled = if active_out.load(Ordering::SeqCst) {
                                consumer.pop_slice(buffer)
                            } else {
                                0
                            };
                            buffer[filled..].fill(silence);
                        },
                        log_stream_error,
                        None,
                    )
                    .map_err(|e| StreamDspError::Backend(e.to_string()))?;

                (Some(input_stream), Some(output_stream))
            }
            (true, false) => {
                let input_device = self.find_device(descriptor.input.as_ref())?;
                // Output bytes were already routed by the callback itself
                // (file sink); nothing to forward.
                let input_stream = build_capture(
                    &input_device,
                    &config,
                    sample_format,
                    frame_bytes,
                    Arc::clone(&active),
                    callback,
                    |_| {},
                )?;
                (Some(input_stream), None)
            }
            (false, true) => {
                let output_device = self.find_device(descriptor.output.as_ref())?;
                let mut callback = callback;
                let active_out = Arc::clone(&active);
                let output_stream = output_device
                    .build_output_stream_raw(
                        &config,
                        sample_format,
                        move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                            let buffer = data.bytes_mut();
                            if !active_out.load(Ordering::SeqCst) {
                                buffer.fill(silence);
                                return;
                            }
                            let frames = buffer.len() / frame_bytes;
                            match callback(&[], frames) {
                                StreamFlow::Continue(out) => {
                                    let n = out.len().min(buffer.len());
                                    buffer[..n].copy_from_slice(&out[..n]);
                                    buffer[n..].fill(silence);
                                }
                                StreamFlow::Complete | StreamFlow::Abort => {
                                    active_out.store(false, Ordering::SeqCst);
                                    buffer.fill(silence);
                                }
                            }
                        },
                        log_stream_error,
                        None,
                    )
                    .map_err(|e| StreamDspError::Backend(e.to_string()))?;
                (None, Some(output_stream))
            }
            (false, false) => {
                return Err(StreamDspError::Backend(
                    "stream with neither direction enabled".to_string(),
                ));
            }
        };

        if let Some(stream) = &output {
            stream
                .play()
                .map_err(|e| StreamDspError::Backend(e.to_string()))?;
        }
        if let Some(stream) = &input {
            stream
                .play()
                .map_err(|e| StreamDspError::Backend(e.to_string()))?;
        }

        Ok(Box::new(CpalStream {
            has_input: input.is_some(),
            has_output: output.is_some(),
            input,
            output,
            active,
            period_ms,
        }))
    }
}

/// Builds the capture-side stream that runs the session callback.
fn build_capture(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    frame_bytes: usize,
    active: Arc<AtomicBool>,
    mut callback: DeviceCallback,
    mut forward: impl FnMut(&[u8]) + Send + 'static,
) -> Result<cpal::Stream> {
    device
        .build_input_stream_raw(
            config,
            sample_format,
            move |data: &cpal::Data, _: &cpal::InputCallbackInfo| {
                if !active.load(Ordering::SeqCst) {
                    return;
                }
                let bytes = data.bytes();
                let frames = bytes.len() / frame_bytes;
                match callback(bytes, frames) {
                    StreamFlow::Continue(out) => forward(&out),
                    StreamFlow::Complete | StreamFlow::Abort => {
                        active.store(false, Ordering::SeqCst);
                    }
                }
            },
            log_stream_error,
            None,
        )
        .map_err(|e| StreamDspError::Backend(e.to_string()))
}

/// A live pair of CPAL stream handles behind the `DeviceStream` trait.
struct CpalStream {
    input: Option<cpal::Stream>,
    output: Option<cpal::Stream>,
    active: Arc<AtomicBool>,
    period_ms: f64,
    has_input: bool,
    has_output: bool,
}

impl DeviceStream for CpalStream {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    // CPAL does not expose the device's own latency, so both directions
    // report the callback buffer period as the estimate.
    fn input_latency_ms(&self) -> f64 {
        if self.has_input {
            self.period_ms
        } else {
            0.0
        }
    }

    fn output_latency_ms(&self) -> f64 {
        if self.has_output {
            self.period_ms
        } else {
            0.0
        }
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        // Dropping a cpal stream stops it and joins its callbacks.
        self.input.take();
        self.output.take();
    }
}

fn log_stream_error(err: cpal::StreamError) {
    tracing::error!("audio stream error: {err}");
}

/// Maps a wire format onto CPAL's sample format enum.
fn to_cpal_format(format: SampleFormat) -> Result<cpal::SampleFormat> {
    match format {
        SampleFormat::F32 => Ok(cpal::SampleFormat::F32),
        SampleFormat::I32 => Ok(cpal::SampleFormat::I32),
        SampleFormat::I16 => Ok(cpal::SampleFormat::I16),
        SampleFormat::I8 => Ok(cpal::SampleFormat::I8),
        SampleFormat::U8 => Ok(cpal::SampleFormat::U8),
        SampleFormat::I24 | SampleFormat::Custom => {
            Err(StreamDspError::UnsupportedFormat { format })
        }
    }
}

/// The byte value that represents silence for a format.
///
/// Unsigned 8-bit sits at its 128 midpoint; every other supported format
/// encodes silence as all-zero bytes.
fn silence_byte(format: SampleFormat) -> u8 {
    match format {
        SampleFormat::U8 => 0x80,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mapping() {
        assert_eq!(
            to_cpal_format(SampleFormat::F32).unwrap(),
            cpal::SampleFormat::F32
        );
        assert_eq!(
            to_cpal_format(SampleFormat::I16).unwrap(),
            cpal::SampleFormat::I16
        );
        assert!(to_cpal_format(SampleFormat::I24).is_err());
        assert!(to_cpal_format(SampleFormat::Custom).is_err());
    }

    #[test]
    fn test_silence_bytes() {
        assert_eq!(silence_byte(SampleFormat::U8), 0x80);
        assert_eq!(silence_byte(SampleFormat::F32), 0);
        assert_eq!(silence_byte(SampleFormat::I16), 0);
    }

    // Enumeration requires a working audio host; may be empty in CI but
    // must not panic.
    #[test]
    fn test_device_names_doesnt_panic() {
        let host = CpalHost::new();
        let _ = host.device_names();
    }

    #[test]
    fn test_resolve_unknown_name_is_unresolved() {
        let host = CpalHost::new();
        let endpoint = host.resolve("definitely-not-a-real-device-name");
        assert!(!endpoint.is_resolved());
    }
}
