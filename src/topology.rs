//! Stream topologies: the eight directional wirings of input source,
//! processing stage, and output sink.
//!
//! Each topology is described once, in a static [`TopologyPlan`] table.
//! Configuration, stream opening and teardown all index this single
//! table instead of re-deriving the wiring.

use crate::error::{Result, StreamDspError};

/// A named device endpoint role, resolved against the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    /// The configured built-in input device (microphone).
    BuiltinInput,
    /// The configured built-in output device (speakers).
    BuiltinOutput,
    /// The configured virtual loopback device.
    VirtualDevice,
}

/// Where a topology's input bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// A live device identified by its endpoint role.
    Device(EndpointRole),
    /// A WAV file read frame-by-frame inside the callback.
    File,
}

/// Where a topology's output bytes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSink {
    /// A live device identified by its endpoint role.
    Device(EndpointRole),
    /// A WAV file written synchronously inside the callback.
    File,
}

/// Static description of one topology's wiring.
#[derive(Debug, Clone, Copy)]
pub struct TopologyPlan {
    /// Input side of the pipeline.
    pub input: InputSource,
    /// Output side of the pipeline.
    pub output: OutputSink,
    /// Whether the device stream captures.
    pub enable_input: bool,
    /// Whether the device stream plays back.
    pub enable_output: bool,
    /// Human-readable wiring diagram.
    pub describe: &'static str,
}

impl TopologyPlan {
    /// Device endpoint roles this topology must resolve before opening.
    pub fn required_roles(&self) -> Vec<EndpointRole> {
        let mut roles = Vec::with_capacity(2);
        if let InputSource::Device(role) = self.input {
            roles.push(role);
        }
        if let OutputSink::Device(role) = self.output {
            roles.push(role);
        }
        roles
    }

    /// True when the input side is a WAV file.
    pub fn reads_file(&self) -> bool {
        self.input == InputSource::File
    }

    /// True when the output side is a WAV file.
    pub fn writes_file(&self) -> bool {
        self.output == OutputSink::File
    }

    /// True when no live device participates at all (File -> File); the
    /// session drives its own callback loop in that case.
    pub fn is_offline(&self) -> bool {
        !self.enable_input && !self.enable_output
    }
}

/// The eight directional stream modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamTopology {
    /// (build-in input) -> [process] -> (build-in output)
    BuiltinToBuiltin,
    /// (build-in input) -> [process] -> (virtual device output)
    BuiltinToVirtual,
    /// (virtual device input) -> [process] -> (build-in output)
    VirtualToBuiltin,
    /// (file) -> [process] -> (file)
    FileToFile,
    /// (build-in input) -> [process] -> (file)
    BuiltinToFile,
    /// (file) -> [process] -> (build-in output)
    FileToBuiltin,
    /// (virtual device input) -> [process] -> (file)
    VirtualToFile,
    /// (file) -> [process] -> (virtual device output)
    FileToVirtual,
}

/// One plan per topology, in `StreamTopology` discriminant order.
static PLANS: [TopologyPlan; 8] = [
    TopologyPlan {
        input: InputSource::Device(EndpointRole::BuiltinInput),
        output: OutputSink::Device(EndpointRole::BuiltinOutput),
        enable_input: true,
        enable_output: true,
        describe: "(build-in input) -> [process] -> (build-in output)",
    },
    TopologyPlan {
        input: InputSource::Device(EndpointRole::BuiltinInput),
        output: OutputSink::Device(EndpointRole::VirtualDevice),
        enable_input: true,
        enable_output: true,
        describe: "(build-in input) -> [process] -> (virtual device output)",
    },
    TopologyPlan {
        input: InputSource::Device(EndpointRole::VirtualDevice),
        output: OutputSink::Device(EndpointRole::BuiltinOutput),
        enable_input: true,
        enable_output: true,
        describe: "(virtual device input) -> [process] -> (build-in output)",
    },
    TopologyPlan {
        input: InputSource::File,
        output: OutputSink::File,
        enable_input: false,
        enable_output: false,
        describe: "(file) -> [process] -> (file)",
    },
    TopologyPlan {
        input: InputSource::Device(EndpointRole::BuiltinInput),
        output: OutputSink::File,
        enable_input: true,
        enable_output: false,
        describe: "(build-in input) -> [process] -> (file)",
    },
    TopologyPlan {
        input: InputSource::File,
        output: OutputSink::Device(EndpointRole::BuiltinOutput),
        enable_input: false,
        enable_output: true,
        describe: "(file) -> [process] -> (build-in output)",
    },
    TopologyPlan {
        input: InputSource::Device(EndpointRole::VirtualDevice),
        output: OutputSink::File,
        enable_input: true,
        enable_output: false,
        describe: "(virtual device input) -> [process] -> (file)",
    },
    TopologyPlan {
        input: InputSource::File,
        output: OutputSink::Device(EndpointRole::VirtualDevice),
        enable_input: false,
        enable_output: true,
        describe: "(file) -> [process] -> (virtual device output)",
    },
];

impl StreamTopology {
    /// All eight topologies, in mode order.
    pub const ALL: [StreamTopology; 8] = [
        StreamTopology::BuiltinToBuiltin,
        StreamTopology::BuiltinToVirtual,
        StreamTopology::VirtualToBuiltin,
        StreamTopology::FileToFile,
        StreamTopology::BuiltinToFile,
        StreamTopology::FileToBuiltin,
        StreamTopology::VirtualToFile,
        StreamTopology::FileToVirtual,
    ];

    /// Returns this topology's static wiring plan.
    pub fn plan(self) -> &'static TopologyPlan {
        &PLANS[self as usize]
    }

    /// Selects a topology from the CLI flag combination.
    ///
    /// Mirrors the mode table from the usage text: file paths pick the
    /// file-bearing modes, `-v` swaps the built-in endpoint for the
    /// virtual device, and `-a`/`-b` pick among the all-live modes.
    ///
    /// # Errors
    ///
    /// [`StreamDspError::UnsupportedStreamMode`] when no file is given
    /// and neither `-a` nor `-b` is set: there is nothing to wire, and
    /// the caller falls back to printing usage.
    pub fn select(
        input_file: bool,
        output_file: bool,
        virtual_device: bool,
        builtin_input: bool,
        builtin_output: bool,
    ) -> Result<StreamTopology> {
        match (input_file, output_file) {
            (true, true) => Ok(StreamTopology::FileToFile),
            (true, false) if virtual_device => Ok(StreamTopology::FileToVirtual),
            (true, false) => Ok(StreamTopology::FileToBuiltin),
            (false, true) if virtual_device => Ok(StreamTopology::VirtualToFile),
            (false, true) => Ok(StreamTopology::BuiltinToFile),
            (false, false) => match (builtin_input, builtin_output) {
                (true, true) => Ok(StreamTopology::BuiltinToBuiltin),
                (true, false) => Ok(StreamTopology::BuiltinToVirtual),
                (false, true) => Ok(StreamTopology::VirtualToBuiltin),
                (false, false) => Err(StreamDspError::UnsupportedStreamMode),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_table_is_consistent() {
        for topology in StreamTopology::ALL {
            let plan = topology.plan();
            // Live capture implies a device input and vice versa
            assert_eq!(
                plan.enable_input,
                matches!(plan.input, InputSource::Device(_)),
                "{topology:?}"
            );
            assert_eq!(
                plan.enable_output,
                matches!(plan.output, OutputSink::Device(_)),
                "{topology:?}"
            );
            assert!(plan.describe.contains("[process]"));
        }
    }

    #[test]
    fn test_required_roles() {
        assert_eq!(
            StreamTopology::BuiltinToBuiltin.plan().required_roles(),
            vec![EndpointRole::BuiltinInput, EndpointRole::BuiltinOutput]
        );
        assert_eq!(
            StreamTopology::VirtualToFile.plan().required_roles(),
            vec![EndpointRole::VirtualDevice]
        );
        assert!(StreamTopology::FileToFile.plan().required_roles().is_empty());
    }

    #[test]
    fn test_file_to_file_is_offline() {
        assert!(StreamTopology::FileToFile.plan().is_offline());
        for topology in StreamTopology::ALL {
            if topology != StreamTopology::FileToFile {
                assert!(!topology.plan().is_offline(), "{topology:?}");
            }
        }
    }

    #[test]
    fn test_virtual_file_modes_pair_with_virtual_device() {
        // Mode 7: (virtual device input) -> [process] -> (file)
        let plan = StreamTopology::VirtualToFile.plan();
        assert_eq!(plan.input, InputSource::Device(EndpointRole::VirtualDevice));
        assert_eq!(plan.output, OutputSink::File);
        assert!(plan.enable_input && !plan.enable_output);

        // Mode 8: (file) -> [process] -> (virtual device output)
        let plan = StreamTopology::FileToVirtual.plan();
        assert_eq!(plan.input, InputSource::File);
        assert_eq!(plan.output, OutputSink::Device(EndpointRole::VirtualDevice));
        assert!(!plan.enable_input && plan.enable_output);
    }

    #[test]
    fn test_select_matches_usage_table() {
        use StreamTopology::*;
        let sel = |i, o, v, a, b| StreamTopology::select(i, o, v, a, b).ok();
        assert_eq!(sel(false, false, false, true, true), Some(BuiltinToBuiltin));
        assert_eq!(sel(false, false, false, true, false), Some(BuiltinToVirtual));
        assert_eq!(sel(false, false, false, false, true), Some(VirtualToBuiltin));
        assert_eq!(sel(true, true, false, false, false), Some(FileToFile));
        assert_eq!(sel(false, true, false, false, false), Some(BuiltinToFile));
        assert_eq!(sel(true, false, false, false, false), Some(FileToBuiltin));
        assert_eq!(sel(false, true, true, false, false), Some(VirtualToFile));
        assert_eq!(sel(true, false, true, false, false), Some(FileToVirtual));
        assert_eq!(sel(false, false, false, false, false), None);
        // -v is ignored when both files are present
        assert_eq!(sel(true, true, true, false, false), Some(FileToFile));
    }
}
