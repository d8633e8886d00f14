//! Mock audio host for testing without hardware.
//!
//! Drives the session callback from a plain thread at an accelerated
//! pace, feeding queued input buffers (or synthesizing pulls for
//! playback-only streams) and recording every produced output buffer.
//! Deterministic and CI-safe.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::SampleFormat;
use crate::device::{AudioHost, DeviceCallback, DeviceStream, EndpointRef, StreamDescriptor, StreamFlow};
use crate::error::{Result, StreamDspError};

/// A deterministic in-memory audio host.
///
/// # Example
///
/// ```
/// use stream_dsp::device::{AudioHost, MockHost};
///
/// let host = MockHost::new(["Built-in Input", "Built-in Output"]);
/// assert!(host.resolve("Built-in Input").is_resolved());
/// assert!(!host.resolve("Soundflower (2ch)").is_resolved());
/// ```
pub struct MockHost {
    names: Vec<String>,
    reject_combinations: bool,
    input_queue: Mutex<VecDeque<Vec<u8>>>,
    captured: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockHost {
    /// Creates a host enumerating exactly the given device names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            reject_combinations: false,
            input_queue: Mutex::new(VecDeque::new()),
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A host that resolves every endpoint but rejects every
    /// format/channels/rate combination.
    pub fn rejecting<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reject_combinations: true,
            ..Self::new(names)
        }
    }

    /// Queues one raw input buffer to feed a capture callback. Buffers
    /// are delivered in order; when the queue runs dry the stream
    /// completes, simulating an interrupted capture.
    pub fn push_input(&self, bytes: Vec<u8>) {
        self.input_queue.lock().unwrap().push_back(bytes);
    }

    /// All output buffers produced by streams opened on this host.
    pub fn captured(&self) -> Vec<Vec<u8>> {
        self.captured.lock().unwrap().clone()
    }
}

impl AudioHost for MockHost {
    fn device_names(&self) -> Result<Vec<String>> {
        Ok(self.names.clone())
    }

    fn supports(
        &self,
        endpoint: &EndpointRef,
        _format: SampleFormat,
        _channels: u16,
        _rate: u32,
    ) -> bool {
        endpoint.is_resolved() && !self.reject_combinations
    }

    fn open_stream(
        &self,
        descriptor: &StreamDescriptor,
        mut callback: DeviceCallback,
    ) -> Result<Box<dyn DeviceStream>> {
        for endpoint in [&descriptor.input, &descriptor.output]
            .into_iter()
            .flatten()
        {
            if !endpoint.is_resolved() {
                return Err(StreamDspError::UnresolvedEndpoint {
                    name: endpoint.name.clone(),
                });
            }
        }

        let frame_bytes =
            descriptor.format.sample_width()? * descriptor.channels as usize;
        let frame_size = descriptor.frame_size;
        let captures_input = descriptor.enable_input;

        let mut inputs: VecDeque<Vec<u8>> =
            std::mem::take(&mut *self.input_queue.lock().unwrap());
        let captured = Arc::clone(&self.captured);
        let active = Arc::new(AtomicBool::new(true));
        let active_worker = Arc::clone(&active);

        let handle = std::thread::Builder::new()
            .name("mock-audio".to_string())
            .spawn(move || {
                while active_worker.load(Ordering::SeqCst) {
                    let flow = if captures_input {
                        let Some(block) = inputs.pop_front() else {
                            // Input exhausted: a real device would keep
                            // producing; the mock just stops.
                            break;
                        };
                        let frames = block.len() / frame_bytes.max(1);
                        callback(&block, frames)
                    } else {
                        callback(&[], frame_size)
                    };
                    match flow {
                        StreamFlow::Continue(out) => {
                            captured.lock().unwrap().push(out);
                        }
                        StreamFlow::Complete | StreamFlow::Abort => break,
                    }
                }
                active_worker.store(false, Ordering::SeqCst);
            })
            .map_err(|e| StreamDspError::Backend(e.to_string()))?;

        Ok(Box::new(MockStream {
            active,
            handle: Some(handle),
        }))
    }
}

struct MockStream {
    active: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceStream for MockStream {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn input_latency_ms(&self) -> f64 {
        1.0
    }

    fn output_latency_ms(&self) -> f64 {
        1.0
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.stop();
    }
}
