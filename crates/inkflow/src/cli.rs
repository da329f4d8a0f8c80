use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fluidconfig::GpuPower;

#[derive(Parser, Debug)]
#[command(
    name = "inkflow",
    author,
    version,
    about = "Real-time GPU fluid simulation",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Options shared by the window and snapshot paths.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Configuration file; defaults to `config.toml` in the user config directory.
    #[arg(long, value_name = "PATH", env = "INKFLOW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Window or snapshot size in physical pixels (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", global = true)]
    pub size: Option<String>,

    /// Optional FPS cap for the window (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Adapter preference.
    #[arg(long, value_enum)]
    pub power: Option<PowerArg>,

    /// Seed for startup and ambient splats.
    #[arg(long, value_name = "SEED", global = true)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub overrides: SimulationOverrides,
}

/// Per-knob overrides layered over the configuration file.
#[derive(Args, Debug, Default, Clone)]
pub struct SimulationOverrides {
    /// Velocity grid resolution along the shorter axis.
    #[arg(long, value_name = "CELLS", global = true)]
    pub sim_resolution: Option<u32>,

    /// Dye grid resolution along the shorter axis.
    #[arg(long, value_name = "TEXELS", global = true)]
    pub dye_resolution: Option<u32>,

    /// Jacobi sweeps per frame.
    #[arg(long, value_name = "N", global = true)]
    pub pressure_iterations: Option<u32>,

    /// Vorticity confinement strength.
    #[arg(long, value_name = "STRENGTH", global = true)]
    pub curl: Option<f32>,

    /// Splat radius in percent of the shorter axis.
    #[arg(long, value_name = "PERCENT", global = true)]
    pub splat_radius: Option<f32>,

    /// Dye decay rate per second.
    #[arg(long, value_name = "RATE", global = true)]
    pub density_dissipation: Option<f32>,

    /// Velocity decay rate per second.
    #[arg(long, value_name = "RATE", global = true)]
    pub velocity_dissipation: Option<f32>,

    /// Derive alpha from dye intensity.
    #[arg(long, global = true)]
    pub transparent: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerArg {
    Low,
    High,
}

impl From<PowerArg> for GpuPower {
    fn from(value: PowerArg) -> Self {
        match value {
            PowerArg::Low => GpuPower::Low,
            PowerArg::High => GpuPower::High,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate headless on the CPU and write the final frame as PNG.
    Snapshot(SnapshotArgs),
    /// Inspect or install the default configuration.
    Defaults(DefaultsCommand),
}

#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    /// Output PNG path.
    #[arg(long, short, value_name = "PATH", default_value = "inkflow.png")]
    pub output: PathBuf,

    /// Number of simulated frames.
    #[arg(long, value_name = "N", default_value_t = 120)]
    pub frames: u32,

    /// Fixed step per frame in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0 / 60.0)]
    pub step: f64,
}

#[derive(Parser, Debug)]
pub struct DefaultsCommand {
    #[command(subcommand)]
    pub action: DefaultsAction,
}

#[derive(Subcommand, Debug)]
pub enum DefaultsAction {
    /// Print the resolved configuration directory and file.
    Where,
    /// Print the built-in configuration as TOML.
    Print,
    /// Write the built-in configuration to the user config file.
    Write(DefaultsWriteArgs),
}

#[derive(Args, Debug, Default)]
pub struct DefaultsWriteArgs {
    /// Replace an existing file.
    #[arg(long)]
    pub force: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}' in size specification", width.trim()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}' in size specification", height.trim()))?;

    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}
