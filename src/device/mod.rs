//! Device directory and the audio backend seam.
//!
//! [`AudioHost`] abstracts over the platform audio layer: enumerating
//! endpoints, resolving configured names to opaque handles, capability
//! queries, and opening the one bidirectional stream a session owns.
//! [`CpalHost`] is the production backend; [`MockHost`] is a
//! deterministic, hardware-free backend for tests and CI.

mod cpal_host;
mod mock;

pub use cpal_host::CpalHost;
pub use mock::MockHost;

use crate::config::SampleFormat;
use crate::error::Result;

/// Opaque reference to a resolved audio endpoint.
///
/// `index < 0` is the "not found" sentinel. Endpoints are re-resolved on
/// every session configuration; the cached name is only for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRef {
    /// Position in the backend's enumeration order, or -1.
    pub index: i32,
    /// The name the endpoint was resolved under.
    pub name: String,
}

impl EndpointRef {
    /// The "not found" sentinel for a name that failed to resolve.
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            index: -1,
            name: name.into(),
        }
    }

    /// Returns `true` if this reference points at a real endpoint.
    pub fn is_resolved(&self) -> bool {
        self.index >= 0
    }
}

/// Verdict returned by the per-buffer callback to the driving layer.
#[derive(Debug)]
pub enum StreamFlow {
    /// Keep streaming; these are the processed output bytes for this
    /// buffer (same byte length as the decoded input).
    Continue(Vec<u8>),
    /// Normal end of stream (input file exhausted).
    Complete,
    /// Fatal mid-stream error; the stream stops and the session must
    /// still be closed to release its handles.
    Abort,
}

/// The per-buffer callback bound into a device stream.
///
/// Arguments are the raw interleaved input bytes (empty when the
/// topology has no live input) and the frame count for this buffer.
pub type DeviceCallback = Box<dyn FnMut(&[u8], usize) -> StreamFlow + Send>;

/// Everything a backend needs to open one logical stream.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Wire sample format at the device boundary.
    pub format: SampleFormat,
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Frames per callback buffer.
    pub frame_size: usize,
    /// Capture side enabled.
    pub enable_input: bool,
    /// Playback side enabled.
    pub enable_output: bool,
    /// Resolved input endpoint (used when `enable_input`).
    pub input: Option<EndpointRef>,
    /// Resolved output endpoint (used when `enable_output`).
    pub output: Option<EndpointRef>,
}

/// A running device stream handle, exclusively owned by its session.
pub trait DeviceStream {
    /// `true` while the platform layer keeps invoking the callback.
    fn is_active(&self) -> bool;

    /// Estimated input-side latency in milliseconds.
    fn input_latency_ms(&self) -> f64;

    /// Estimated output-side latency in milliseconds.
    fn output_latency_ms(&self) -> f64;

    /// Stops the stream and releases platform resources. Idempotent.
    fn stop(&mut self);
}

/// The platform audio layer boundary.
pub trait AudioHost {
    /// Names of all endpoints, in the backend's stable enumeration order.
    fn device_names(&self) -> Result<Vec<String>>;

    /// Resolves a device name to an endpoint: linear scan, first exact
    /// match, no fuzzy matching or case folding.
    fn resolve(&self, name: &str) -> EndpointRef {
        let names = match self.device_names() {
            Ok(names) => names,
            Err(err) => {
                tracing::error!("device enumeration failed: {err}");
                return EndpointRef::unresolved(name);
            }
        };
        for (index, candidate) in names.iter().enumerate() {
            if candidate == name {
                return EndpointRef {
                    index: index as i32,
                    name: name.to_string(),
                };
            }
        }
        EndpointRef::unresolved(name)
    }

    /// Asks the backend whether it supports this combination on the
    /// given endpoint. A `false` here is a hard precondition failure for
    /// opening a stream, never a recoverable condition.
    fn supports(
        &self,
        endpoint: &EndpointRef,
        format: SampleFormat,
        channels: u16,
        rate: u32,
    ) -> bool;

    /// Opens the single bidirectional stream described by `descriptor`,
    /// binds `callback`, and starts it.
    fn open_stream(
        &self,
        descriptor: &StreamDescriptor,
        callback: DeviceCallback,
    ) -> Result<Box<dyn DeviceStream>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_sentinel() {
        let endpoint = EndpointRef::unresolved("USB Mic");
        assert_eq!(endpoint.index, -1);
        assert!(!endpoint.is_resolved());
        assert_eq!(endpoint.name, "USB Mic");
    }

    #[test]
    fn test_resolved() {
        let endpoint = EndpointRef {
            index: 3,
            name: "Built-in Output".to_string(),
        };
        assert!(endpoint.is_resolved());
    }
}
