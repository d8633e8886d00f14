//! Command-line entry point.
//!
//! Flag handling mirrors the classic getopt style: short flags pick the
//! stream mode, `-i`/`-o` attach WAV files, and an empty selection just
//! prints usage. The streaming core is callback-driven; the binary only
//! polls the session and waits for Ctrl+C on a single-threaded runtime
//! (the platform stream handle is not `Send`).

use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use stream_dsp::device::{AudioHost, CpalHost};
use stream_dsp::{Session, Settings, StreamTopology, SwapChannels, SETTINGS_FILE};

#[derive(Debug, Default)]
struct CliArgs {
    help: bool,
    list_devices: bool,
    virtual_device: bool,
    builtin_input: bool,
    builtin_output: bool,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

/// Parses the argument list. Unknown flags and missing option values are
/// parse errors (exit code 2 at the call site).
fn parse_args<I>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" => parsed.help = true,
            "-d" => parsed.list_devices = true,
            "-v" => parsed.virtual_device = true,
            "-a" => parsed.builtin_input = true,
            "-b" => parsed.builtin_output = true,
            "-i" | "--ifile" => {
                let value = args.next().ok_or_else(|| format!("{arg} requires a value"))?;
                parsed.input_file = Some(PathBuf::from(value));
            }
            "-o" | "--ofile" => {
                let value = args.next().ok_or_else(|| format!("{arg} requires a value"))?;
                parsed.output_file = Some(PathBuf::from(value));
            }
            other => {
                if let Some(value) = other.strip_prefix("--ifile=") {
                    parsed.input_file = Some(PathBuf::from(value));
                } else if let Some(value) = other.strip_prefix("--ofile=") {
                    parsed.output_file = Some(PathBuf::from(value));
                } else {
                    return Err(format!("unknown option: {other}"));
                }
            }
        }
    }
    Ok(parsed)
}

fn print_usage(name: &str) {
    println!(
        r#"
Streaming audio processing template program.

Offers the following streaming modes:
    * 1. (build-in input) -> [process] -> (build-in output)
    * 2. (build-in input) -> [process] -> (virtual device output)
    * 3. (virtual device input) -> [process] -> (build-in output)
    * 4. (file) -> [process] -> (file)
    * 5. (build-in input) -> [process] -> (file)
    * 6. (file) -> [process] -> (build-in output)
    * 7. (virtual device input) -> [process] -> (file)
    * 8. (file) -> [process] -> (virtual device output)

{name} [-h, -d, -v, -a, -b] [-i <in file>, -o <out file>]

To exit:
    Press `Ctrl+C`

Setup:
    Change `settings.json` to setup audio devices

Options:
    -h print this help message
    -d print all available devices
    -v use virtual audio device instead of built-in
       (can be used with -i/-o to activate mode 7/8)
    -a use built-in input with virtual audio device
       or built-in output (mode 1 or 2)
    -b use built-in output with virtual audio device
       or built-in input (mode 1 or 3)
    -i, --ifile= provide input wav file
    -o, --ofile= provide output wav file

Use cases:
    * `{name} -a -b` - to activate 1
    * `{name} -a` - to activate 2
    * `{name} -b` - to activate 3
    * `{name} -i infile.wav -o outfile.wav` - to activate 4
    * `{name} -o outfile.wav` - to activate 5
    * `{name} -i infile.wav` - to activate 6
    * `{name} -v -o outfile.wav` - to activate 7
    * `{name} -v -i infile.wav` - to activate 8"#
    );
}

fn list_devices() -> stream_dsp::Result<()> {
    let host = CpalHost::new();
    println!("Available audio devices:");
    for (index, name) in host.device_names()?.iter().enumerate() {
        println!("\t{}. {}", index + 1, name);
    }
    Ok(())
}

async fn run(topology: StreamTopology, settings: Settings, args: CliArgs) -> stream_dsp::Result<()> {
    let mut session = Session::configure(
        topology,
        &settings,
        Box::new(CpalHost::new()),
        args.input_file.as_deref(),
        args.output_file.as_deref(),
        Box::new(SwapChannels),
    )?;
    session.open()?;

    while session.is_active() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupt received, stopping stream");
                session.request_stop();
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    session.close()?;
    println!("Done!");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut argv = std::env::args();
    let name = argv.next().unwrap_or_else(|| "stream-dsp".to_string());
    let args = match parse_args(argv) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            print_usage(&name);
            exit(2);
        }
    };

    if args.help {
        print_usage(&name);
        return;
    }
    if args.list_devices {
        if let Err(err) = list_devices() {
            eprintln!("{err}");
            exit(1);
        }
        return;
    }

    let topology = match StreamTopology::select(
        args.input_file.is_some(),
        args.output_file.is_some(),
        args.virtual_device,
        args.builtin_input,
        args.builtin_output,
    ) {
        Ok(topology) => topology,
        Err(_) => {
            // No files, no mode flags: nothing to wire up.
            print_usage(&name);
            return;
        }
    };

    let settings = match Settings::load(SETTINGS_FILE) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            println!("Failed to init audio session!");
            exit(1);
        }
    };

    if let Err(err) = run(topology, settings, args).await {
        eprintln!("{err}");
        println!("Failed to init audio session!");
        exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, String> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_mode_flags() {
        let args = parse(&["-a", "-b"]).unwrap();
        assert!(args.builtin_input && args.builtin_output);
        assert!(!args.virtual_device);
    }

    #[test]
    fn test_parse_file_options() {
        let args = parse(&["-i", "in.wav", "--ofile", "out.wav"]).unwrap();
        assert_eq!(args.input_file, Some(PathBuf::from("in.wav")));
        assert_eq!(args.output_file, Some(PathBuf::from("out.wav")));

        let args = parse(&["--ifile=in.wav", "--ofile=out.wav"]).unwrap();
        assert_eq!(args.input_file, Some(PathBuf::from("in.wav")));
        assert_eq!(args.output_file, Some(PathBuf::from("out.wav")));
    }

    #[test]
    fn test_parse_rejects_unknown_flag() {
        assert!(parse(&["-x"]).is_err());
        assert!(parse(&["--frames"]).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_value() {
        assert!(parse(&["-i"]).is_err());
        assert!(parse(&["--ofile"]).is_err());
    }
}
