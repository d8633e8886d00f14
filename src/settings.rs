//! Persisted audio settings.
//!
//! Settings live in a small JSON file next to the binary. A missing file
//! is replaced with defaults and reloaded; a missing key in an existing
//! file is a hard error (no per-key defaulting), so a stale settings file
//! never half-applies.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{SampleFormat, StreamConfig};
use crate::error::Result;
use crate::topology::EndpointRole;

/// Default settings file name, resolved relative to the working directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// User-tunable stream parameters and device names.
///
/// Channel count and wire format are deliberately not persisted: the
/// session layer is fixed at two channels of 32-bit float at the device
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Samples per channel per callback buffer.
    pub frame_size: usize,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Exact enumerated name of the built-in input device.
    pub build_in_input_audio_device_name: String,
    /// Exact enumerated name of the built-in output device.
    pub build_in_output_audio_device_name: String,
    /// Exact enumerated name of the virtual loopback device.
    pub virtual_audio_device_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            rate: 44100,
            build_in_input_audio_device_name: "Built-in Input".to_string(),
            build_in_output_audio_device_name: "Built-in Output".to_string(),
            virtual_audio_device_name: "Soundflower (2ch)".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`.
    ///
    /// If the file does not exist, defaults are written there first and
    /// then loaded back. If the file exists but is malformed or missing a
    /// key, the error propagates (fatal to startup).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                "{} couldn't be found, applying default settings",
                path.display()
            );
            Settings::default().save(path)?;
        }
        let text = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        Ok(settings)
    }

    /// Writes the settings to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Configured device name for an endpoint role.
    pub fn device_name(&self, role: EndpointRole) -> &str {
        match role {
            EndpointRole::BuiltinInput => &self.build_in_input_audio_device_name,
            EndpointRole::BuiltinOutput => &self.build_in_output_audio_device_name,
            EndpointRole::VirtualDevice => &self.virtual_audio_device_name,
        }
    }

    /// Builds the immutable stream configuration these settings describe.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            frame_size: self.frame_size,
            channels: 2,
            rate: self.rate,
            format: SampleFormat::F32,
        }
    }
}
