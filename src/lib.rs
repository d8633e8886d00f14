//! Real-time streaming audio with swappable DSP stages.
//!
//! Routes a live or file-based audio stream through an interchangeable
//! processing stage and out to a live device or a WAV file. Eight
//! directional topologies cover every pairing of built-in devices, a
//! virtual loopback device, and files; the same per-buffer pipeline
//! (decode to f32 planes, process, encode back to PCM) runs in all of
//! them.
//!
//! # Example
//!
//! Offline file-to-file processing with the reference channel-swap
//! stage:
//!
//! ```no_run
//! use stream_dsp::device::MockHost;
//! use stream_dsp::{Session, Settings, StreamTopology, SwapChannels};
//!
//! # fn run() -> stream_dsp::Result<()> {
//! let settings = Settings::default();
//! let mut session = Session::configure(
//!     StreamTopology::FileToFile,
//!     &settings,
//!     Box::new(MockHost::new::<[&str; 0], &str>([])),
//!     Some("in.wav".as_ref()),
//!     Some("out.wav".as_ref()),
//!     Box::new(SwapChannels),
//! )?;
//! session.open()?;
//! while session.is_active() {
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! let stats = session.close()?;
//! println!("processed {} buffers", stats.blocks);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod session;
pub mod settings;
pub mod stage;
pub mod topology;
pub mod wav;

pub use config::{SampleFormat, StreamConfig};
pub use error::{Result, StreamDspError};
pub use format::{decode_pcm, encode_pcm};
pub use session::{ProcessingStats, Session};
pub use settings::{Settings, SETTINGS_FILE};
pub use stage::{Passthrough, ProcessingStage, SwapChannels};
pub use topology::{StreamTopology, TopologyPlan};
pub use wav::{FileSink, FileSource};
