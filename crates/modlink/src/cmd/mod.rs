use clap::{Args, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use modlink_channel::{Channel, ChannelConfig, InboundSink, ThermalImage};
use modlink_transport::{DevicePath, SocketPath};

use crate::exit::{channel_error, io_error, thermal_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod decode;
pub mod emulate;
pub mod terminal;
pub mod thermal;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream frames from a thermal sensor accessory.
    Thermal(ThermalArgs),
    /// Exchange raw bytes with an accessory.
    Terminal(TerminalArgs),
    /// Decode a recorded sensor capture.
    Decode(DecodeArgs),
    /// Serve synthetic sensor frames on a Unix socket.
    Emulate(EmulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Thermal(args) => thermal::run(args, format),
        Command::Terminal(args) => terminal::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Emulate(args) => emulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ThermalArgs {
    /// Accessory device node (or socket path with --socket).
    #[arg(env = "MODLINK_DEVICE")]
    pub device: PathBuf,
    /// Treat DEVICE as a Unix socket, e.g. one served by `emulate`.
    #[arg(long)]
    pub socket: bool,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Write each frame as a PAM image into DIR.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
    /// Print decoder counters when the session ends.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct TerminalArgs {
    /// Accessory device node (or socket path with --socket).
    #[arg(env = "MODLINK_DEVICE")]
    pub device: PathBuf,
    /// Treat DEVICE as a Unix socket.
    #[arg(long)]
    pub socket: bool,
    /// Send this string once the channel is open.
    #[arg(long)]
    pub data: Option<String>,
    /// Forward stdin to the accessory.
    #[arg(long)]
    pub stdin: bool,
    /// Exit after printing N reads.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file holding raw sensor bytes.
    pub file: PathBuf,
    /// Bytes per decoder call, like one device read.
    #[arg(long, default_value_t = modlink_thermal::DEFAULT_CHUNK_SIZE)]
    pub chunk: usize,
    /// Write each frame as a PAM image into DIR.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
    /// Print decoder counters after the last frame.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct EmulateArgs {
    /// Socket path to bind.
    pub socket: PathBuf,
    /// Stop streaming after N frames. Default: until the host sends `off`.
    #[arg(long)]
    pub frames: Option<u64>,
    /// Delay between frames in milliseconds.
    #[arg(long, default_value = "111")]
    pub interval: u64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn open_channel<S: InboundSink>(
    device: &Path,
    socket: bool,
    sink: S,
    config: ChannelConfig,
) -> CliResult<Channel> {
    let result = if socket {
        Channel::open(SocketPath::new(device), sink, config)
    } else {
        Channel::open(DevicePath::new(device), sink, config)
    };
    result.map_err(|err| channel_error("open failed", err))
}

fn create_out_dir(dir: Option<&Path>) -> CliResult<()> {
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir).map_err(|err| io_error("output directory", err))?;
    }
    Ok(())
}

/// Write `image` as `frame-NNNNN.pam` under `dir`.
fn save_image(dir: &Path, image: &ThermalImage) -> CliResult<PathBuf> {
    let path = dir.join(format!("frame-{:05}.pam", image.sequence));
    let file = File::create(&path).map_err(|err| io_error("create image failed", err))?;
    image
        .bitmap
        .write_pam(BufWriter::new(file))
        .map_err(|err| thermal_error("write image failed", err))?;
    Ok(path)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
