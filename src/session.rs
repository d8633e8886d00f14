//! Streaming session lifecycle.
//!
//! A [`Session`] is single-use: constructed in the `Configured` state,
//! moved to `Open` when the stream starts, and to `Closed` on teardown.
//! There are no reverse transitions. The per-buffer pipeline (acquire,
//! decode, process, encode, route) runs on the audio callback thread; the
//! controlling thread only polls [`Session::is_active`] and requests a
//! cooperative stop.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::config::StreamConfig;
use crate::device::{
    AudioHost, DeviceCallback, DeviceStream, EndpointRef, StreamDescriptor, StreamFlow,
};
use crate::error::{Result, StreamDspError};
use crate::format::{decode_pcm, encode_pcm};
use crate::settings::Settings;
use crate::stage::ProcessingStage;
use crate::topology::{InputSource, OutputSink, StreamTopology, TopologyPlan};
use crate::wav::{FileSink, FileSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Configured,
    Open,
    Closed,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Configured => "configured",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
        }
    }
}

/// Per-block processing time statistics, reported at close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingStats {
    /// Number of buffers that completed the full pipeline.
    pub blocks: u64,
    /// Fastest decode-to-route time in milliseconds.
    pub min_ms: f64,
    /// Slowest decode-to-route time in milliseconds.
    pub max_ms: f64,
}

/// State shared between the audio thread and the controlling thread.
///
/// Atomics only. Latency extrema are stored as `f64` bit patterns in
/// `AtomicU64` and updated with compare-exchange loops, so the audio
/// thread never takes a lock.
struct SessionShared {
    active: AtomicBool,
    stop_requested: AtomicBool,
    blocks: AtomicU64,
    min_bits: AtomicU64,
    max_bits: AtomicU64,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            blocks: AtomicU64::new(0),
            min_bits: AtomicU64::new(f64::INFINITY.to_bits()),
            max_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn record(&self, elapsed_ms: f64) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
        let bits = elapsed_ms.to_bits();
        let _ = self
            .min_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                (elapsed_ms < f64::from_bits(current)).then_some(bits)
            });
        let _ = self
            .max_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                (elapsed_ms > f64::from_bits(current)).then_some(bits)
            });
    }

    fn stats(&self) -> ProcessingStats {
        let blocks = self.blocks.load(Ordering::Relaxed);
        if blocks == 0 {
            return ProcessingStats {
                blocks: 0,
                min_ms: 0.0,
                max_ms: 0.0,
            };
        }
        ProcessingStats {
            blocks,
            min_ms: f64::from_bits(self.min_bits.load(Ordering::Relaxed)),
            max_ms: f64::from_bits(self.max_bits.load(Ordering::Relaxed)),
        }
    }
}

/// One configured streaming session.
///
/// Owns the resolved endpoints, the optional file source/sink, the
/// processing stage, and (once open) the device stream handle or the
/// offline pump thread. Not `Send`: the platform stream handle is tied
/// to the thread that opened it.
pub struct Session {
    state: SessionState,
    topology: StreamTopology,
    plan: &'static TopologyPlan,
    config: StreamConfig,
    host: Box<dyn AudioHost>,
    input_endpoint: Option<EndpointRef>,
    output_endpoint: Option<EndpointRef>,
    source: Option<Arc<Mutex<FileSource>>>,
    sink: Option<Arc<Mutex<FileSink>>>,
    stage: Option<Box<dyn ProcessingStage>>,
    stream: Option<Box<dyn DeviceStream>>,
    pump: Option<JoinHandle<()>>,
    shared: Arc<SessionShared>,
}

impl Session {
    /// Configures a session for a topology: resolves the device
    /// endpoints the plan requires and opens the file source/sink.
    ///
    /// When a topology reads from a file, that file's format, channel
    /// count and rate override the settings-derived values for the whole
    /// pipeline. An output file mirrors the input file's parameters, or
    /// the live configuration when there is no input file.
    ///
    /// # Errors
    ///
    /// [`StreamDspError::UnresolvedEndpoint`] when a required device
    /// name is not enumerated by the host;
    /// [`StreamDspError::MissingFile`] when the topology needs a file
    /// path that was not supplied; [`StreamDspError::FileOpen`] when a
    /// file cannot be opened.
    pub fn configure(
        topology: StreamTopology,
        settings: &Settings,
        host: Box<dyn AudioHost>,
        input_file: Option<&Path>,
        output_file: Option<&Path>,
        stage: Box<dyn ProcessingStage>,
    ) -> Result<Self> {
        let plan = topology.plan();
        let mut config = settings.stream_config();

        let mut input_endpoint = None;
        let mut output_endpoint = None;
        if let InputSource::Device(role) = plan.input {
            input_endpoint = Some(Self::resolve_role(&*host, settings.device_name(role))?);
        }
        if let OutputSink::Device(role) = plan.output {
            output_endpoint = Some(Self::resolve_role(&*host, settings.device_name(role))?);
        }

        let source = if plan.reads_file() {
            let path = input_file.ok_or(StreamDspError::MissingFile { role: "input" })?;
            let source = FileSource::open(path)?;
            // The file is authoritative for the pipeline parameters.
            config.format = source.format();
            config.channels = source.channels();
            config.rate = source.rate();
            tracing::debug!(
                path = %source.path().display(),
                format = %config.format,
                channels = config.channels,
                rate = config.rate,
                "input file opened"
            );
            Some(Arc::new(Mutex::new(source)))
        } else {
            None
        };

        let sink = if plan.writes_file() {
            let path = output_file.ok_or(StreamDspError::MissingFile { role: "output" })?;
            let sink = match &source {
                Some(source) => FileSink::mirroring(path, &source.lock().unwrap())?,
                None => FileSink::create(path, config.format, config.channels, config.rate)?,
            };
            Some(Arc::new(Mutex::new(sink)))
        } else {
            None
        };

        Ok(Self {
            state: SessionState::Configured,
            topology,
            plan,
            config,
            host,
            input_endpoint,
            output_endpoint,
            source,
            sink,
            stage: Some(stage),
            stream: None,
            pump: None,
            shared: Arc::new(SessionShared::new()),
        })
    }

    fn resolve_role(host: &dyn AudioHost, name: &str) -> Result<EndpointRef> {
        let endpoint = host.resolve(name);
        if !endpoint.is_resolved() {
            return Err(StreamDspError::UnresolvedEndpoint {
                name: name.to_string(),
            });
        }
        Ok(endpoint)
    }

    /// Opens the stream and starts processing.
    ///
    /// Validates the active format/channels/rate combination against
    /// each resolved endpoint, binds the per-buffer callback, and either
    /// opens the device stream or (File -> File) spawns the session's
    /// own pump thread in the audio callback role. Prints the
    /// configuration and latency summary on success.
    ///
    /// # Errors
    ///
    /// [`StreamDspError::InvalidState`] unless the session is
    /// `Configured`; [`StreamDspError::UnsupportedConfiguration`] when
    /// an endpoint rejects the combination. On error the session stays
    /// `Configured`.
    pub fn open(&mut self) -> Result<()> {
        if self.state != SessionState::Configured {
            return Err(StreamDspError::InvalidState {
                expected: "configured",
                actual: self.state.name(),
            });
        }

        for endpoint in [&self.input_endpoint, &self.output_endpoint]
            .into_iter()
            .flatten()
        {
            if !self.host.supports(
                endpoint,
                self.config.format,
                self.config.channels,
                self.config.rate,
            ) {
                return Err(StreamDspError::UnsupportedConfiguration {
                    format: self.config.format,
                    channels: self.config.channels,
                    rate: self.config.rate,
                    device: endpoint.name.clone(),
                });
            }
        }

        let callback = self.build_callback()?;
        self.shared.active.store(true, Ordering::SeqCst);

        if self.plan.is_offline() {
            let frame_size = self.config.frame_size;
            let shared = Arc::clone(&self.shared);
            let mut callback = callback;
            let pump = std::thread::Builder::new()
                .name("stream-pump".to_string())
                .spawn(move || {
                    while !matches!(callback(&[], frame_size), StreamFlow::Complete | StreamFlow::Abort) {}
                    shared.active.store(false, Ordering::SeqCst);
                })
                .map_err(|e| StreamDspError::Backend(e.to_string()))?;
            self.pump = Some(pump);
        } else {
            let descriptor = StreamDescriptor {
                format: self.config.format,
                channels: self.config.channels,
                rate: self.config.rate,
                frame_size: self.config.frame_size,
                enable_input: self.plan.enable_input,
                enable_output: self.plan.enable_output,
                input: self.input_endpoint.clone(),
                output: self.output_endpoint.clone(),
            };
            let stream = match self.host.open_stream(&descriptor, callback) {
                Ok(stream) => stream,
                Err(err) => {
                    self.shared.active.store(false, Ordering::SeqCst);
                    return Err(err);
                }
            };
            self.stream = Some(stream);
        }

        self.state = SessionState::Open;
        self.print_summary();
        Ok(())
    }

    /// Builds the per-buffer pipeline closure. Takes the stage out of
    /// the session; the closure owns it for the stream's lifetime.
    fn build_callback(&mut self) -> Result<DeviceCallback> {
        let mut stage = self.stage.take().ok_or(StreamDspError::InvalidState {
            expected: "configured",
            actual: "already opened",
        })?;
        let source = self.source.clone();
        let sink = self.sink.clone();
        let shared = Arc::clone(&self.shared);
        let format = self.config.format;
        let channels = self.config.channels;

        Ok(Box::new(move |bytes: &[u8], frames: usize| {
            if shared.stop_requested.load(Ordering::SeqCst) {
                shared.active.store(false, Ordering::SeqCst);
                return StreamFlow::Complete;
            }

            // Acquire input bytes before the clock starts: the stats
            // cover decode through route, not file reads.
            let block;
            let input: &[u8] = match &source {
                Some(source) => {
                    block = match source.lock().unwrap().read_frames(frames) {
                        Ok(block) => block,
                        Err(err) => {
                            tracing::error!("file read failed: {err}");
                            shared.active.store(false, Ordering::SeqCst);
                            return StreamFlow::Abort;
                        }
                    };
                    if block.is_empty() {
                        shared.active.store(false, Ordering::SeqCst);
                        return StreamFlow::Complete;
                    }
                    &block
                }
                None => bytes,
            };

            let started = Instant::now();
            let (left, right) = match decode_pcm(input, channels, format) {
                Ok(decoded) => decoded,
                Err(err) => {
                    tracing::error!("decode failed: {err}");
                    shared.active.store(false, Ordering::SeqCst);
                    return StreamFlow::Abort;
                }
            };
            let (left, right) = stage.process(left, right);
            let encoded = match encode_pcm(&left, &right, format) {
                Ok(encoded) => encoded,
                Err(err) => {
                    tracing::error!("encode failed: {err}");
                    shared.active.store(false, Ordering::SeqCst);
                    return StreamFlow::Abort;
                }
            };
            if let Some(sink) = &sink {
                if let Err(err) = sink.lock().unwrap().write_block(&encoded) {
                    tracing::error!("file write failed: {err}");
                    shared.active.store(false, Ordering::SeqCst);
                    return StreamFlow::Abort;
                }
            }
            shared.record(started.elapsed().as_secs_f64() * 1000.0);
            StreamFlow::Continue(encoded)
        }))
    }

    fn print_summary(&self) {
        println!("{}", self.plan.describe);
        if let Some(input) = &self.input_endpoint {
            println!("Input device: {} ({})", input.index + 1, input.name);
        }
        if let Some(output) = &self.output_endpoint {
            println!("Output device: {} ({})", output.index + 1, output.name);
        }
        println!("Format: {}", self.config.format);
        println!("Channels: {}", self.config.channels);
        println!("Rate: {} Hz", self.config.rate);
        println!("Frame size: {}", self.config.frame_size);

        let buffer = self.config.buffer_latency_ms();
        let (src, dst) = match &self.stream {
            Some(stream) => (stream.input_latency_ms(), stream.output_latency_ms()),
            None => (0.0, 0.0),
        };
        println!(
            "Round-trip latency: {:.1} ms ({:.1}/{:.1}/{:.1})",
            src + buffer + dst,
            src,
            buffer,
            dst
        );
    }

    /// `true` while the stream keeps producing buffers.
    ///
    /// Consults the device stream handle as well as the session's own
    /// flag: a backend can stop delivering buffers without the callback
    /// ever returning a terminal verdict (capture source went away), and
    /// the controlling loop must observe that too.
    pub fn is_active(&self) -> bool {
        if self.state != SessionState::Open || !self.shared.active.load(Ordering::SeqCst) {
            return false;
        }
        self.stream
            .as_ref()
            .map_or(true, |stream| stream.is_active())
    }

    /// Asks the audio thread to stop after the current buffer.
    pub fn request_stop(&self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
    }

    /// The topology this session was configured for.
    pub fn topology(&self) -> StreamTopology {
        self.topology
    }

    /// The effective pipeline configuration (after any file override).
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stops the stream, releases every handle, finalizes the output
    /// file, prints the processing-time summary, and returns the final
    /// statistics. Idempotent: a second call returns the same stats
    /// without side effects. Works from `Configured` too (nothing to
    /// stop, nothing recorded).
    pub fn close(&mut self) -> Result<ProcessingStats> {
        if self.state == SessionState::Closed {
            return Ok(self.shared.stats());
        }

        self.request_stop();
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
        self.source = None;
        if let Some(sink) = self.sink.take() {
            sink.lock().unwrap().finalize()?;
        }
        self.shared.active.store(false, Ordering::SeqCst);
        self.state = SessionState::Closed;

        let stats = self.shared.stats();
        println!(
            "Processing time: min {:.3} ms, max {:.3} ms over {} buffers",
            stats.min_ms, stats.max_ms, stats.blocks
        );
        tracing::debug!(blocks = stats.blocks, "session closed");
        Ok(stats)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            if let Err(err) = self.close() {
                tracing::error!("close during drop failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockHost;
    use crate::stage::Passthrough;

    fn settings() -> Settings {
        Settings {
            frame_size: 4,
            ..Settings::default()
        }
    }

    #[test]
    fn test_configure_fails_on_unresolved_endpoint() {
        let host = MockHost::new(["Something Else"]);
        let err = Session::configure(
            StreamTopology::BuiltinToBuiltin,
            &settings(),
            Box::new(host),
            None,
            None,
            Box::new(Passthrough),
        )
        .err()
        .unwrap();
        assert!(matches!(err, StreamDspError::UnresolvedEndpoint { .. }));
    }

    #[test]
    fn test_configure_fails_without_required_file() {
        let host = MockHost::new::<[&str; 0], &str>([]);
        let err = Session::configure(
            StreamTopology::FileToFile,
            &settings(),
            Box::new(host),
            None,
            None,
            Box::new(Passthrough),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            StreamDspError::MissingFile { role: "input" }
        ));
    }

    #[test]
    fn test_open_fails_on_rejected_configuration() {
        let host = MockHost::rejecting(["Built-in Input", "Built-in Output"]);
        let mut session = Session::configure(
            StreamTopology::BuiltinToBuiltin,
            &settings(),
            Box::new(host),
            None,
            None,
            Box::new(Passthrough),
        )
        .unwrap();
        let err = session.open().unwrap_err();
        assert!(matches!(
            err,
            StreamDspError::UnsupportedConfiguration { .. }
        ));
        // Open failure leaves the session configured, so a retryable
        // close still works.
        session.close().unwrap();
    }

    #[test]
    fn test_close_from_configured_is_clean() {
        let host = MockHost::new(["Built-in Input", "Built-in Output"]);
        let mut session = Session::configure(
            StreamTopology::BuiltinToBuiltin,
            &settings(),
            Box::new(host),
            None,
            None,
            Box::new(Passthrough),
        )
        .unwrap();
        let stats = session.close().unwrap();
        assert_eq!(stats.blocks, 0);
        assert_eq!(stats.min_ms, 0.0);
        assert_eq!(stats.max_ms, 0.0);
    }

    #[test]
    fn test_open_after_close_fails() {
        let host = MockHost::new(["Built-in Input", "Built-in Output"]);
        let mut session = Session::configure(
            StreamTopology::BuiltinToBuiltin,
            &settings(),
            Box::new(host),
            None,
            None,
            Box::new(Passthrough),
        )
        .unwrap();
        session.close().unwrap();
        let err = session.open().unwrap_err();
        assert!(matches!(
            err,
            StreamDspError::InvalidState {
                expected: "configured",
                actual: "closed"
            }
        ));
    }

    #[test]
    fn test_stats_record_extrema() {
        let shared = SessionShared::new();
        shared.record(2.0);
        shared.record(0.5);
        shared.record(1.0);
        let stats = shared.stats();
        assert_eq!(stats.blocks, 3);
        assert_eq!(stats.min_ms, 0.5);
        assert_eq!(stats.max_ms, 2.0);
    }
}
