use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use fluid::{render_snapshot, Renderer, RendererConfig, SnapshotRequest, SurfaceSize};
use fluidconfig::FluidFile;
use tracing_subscriber::EnvFilter;

use crate::cli::{parse_surface_size, Cli, Command, DefaultsAction, RunArgs, SnapshotArgs};
use crate::paths::AppPaths;

const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 720);
const DEFAULT_SNAPSHOT_SIZE: (u32, u32) = (640, 360);
const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved inkflow paths");

    match cli.command {
        Some(Command::Snapshot(args)) => run_snapshot(&cli.run, &args, &paths),
        Some(Command::Defaults(command)) => run_defaults(command.action, &paths),
        None => run_window(&cli.run, &paths),
    }
}

fn initialise_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_window(args: &RunArgs, paths: &AppPaths) -> Result<()> {
    let file = resolve_config(args, &paths.config_file())?;
    let config = renderer_config(&file, args);
    tracing::info!(
        width = config.surface_size.0,
        height = config.surface_size.1,
        sim_resolution = config.simulation.sim_resolution,
        dye_resolution = config.simulation.dye_resolution,
        "launching inkflow window"
    );
    let mut renderer = Renderer::new(config);
    renderer.run()
}

fn run_snapshot(args: &RunArgs, snapshot: &SnapshotArgs, paths: &AppPaths) -> Result<()> {
    let file = resolve_config(args, &paths.config_file())?;
    let request = snapshot_request(&file, args, snapshot)?;
    let path = render_snapshot(&request)?;
    println!("{}", path.display());
    Ok(())
}

fn run_defaults(action: DefaultsAction, paths: &AppPaths) -> Result<()> {
    match action {
        DefaultsAction::Where => {
            let file = paths.config_file();
            println!("config dir : {}", paths.config_dir().display());
            println!(
                "config file: {} ({})",
                file.display(),
                if file.exists() { "present" } else { "missing" }
            );
            Ok(())
        }
        DefaultsAction::Print => {
            print!("{}", FluidFile::default().to_toml_string()?);
            Ok(())
        }
        DefaultsAction::Write(args) => {
            let path = write_default_config(&paths.config_file(), args.force)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Layers defaults, the config file and CLI overrides, then validates.
///
/// An explicit `--config` path must exist; the implicit user file is optional.
pub fn resolve_config(args: &RunArgs, user_file: &Path) -> Result<FluidFile> {
    let mut file = match args.config.as_deref() {
        Some(path) => FluidFile::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None if user_file.exists() => FluidFile::load(user_file)
            .with_context(|| format!("failed to load config {}", user_file.display()))?,
        None => {
            tracing::debug!(path = %user_file.display(), "no config file; using defaults");
            FluidFile::default()
        }
    };

    apply_overrides(&mut file, args)?;
    file.validate().context("invalid configuration after CLI overrides")?;
    Ok(file)
}

fn apply_overrides(file: &mut FluidFile, args: &RunArgs) -> Result<()> {
    if let Some(size) = args.size.as_deref() {
        let (width, height) = parse_surface_size(size).map_err(|err| anyhow!(err))?;
        file.window.size = Some([width, height]);
    }
    if let Some(fps) = args.fps {
        file.window.fps = Some(fps);
    }
    if let Some(power) = args.power {
        file.window.power = power.into();
    }

    let overrides = &args.overrides;
    let sim = &mut file.simulation;
    if let Some(value) = overrides.sim_resolution {
        sim.sim_resolution = value;
    }
    if let Some(value) = overrides.dye_resolution {
        sim.dye_resolution = value;
    }
    if let Some(value) = overrides.pressure_iterations {
        sim.pressure_iterations = value;
    }
    if let Some(value) = overrides.curl {
        sim.curl = value;
    }
    if let Some(value) = overrides.splat_radius {
        sim.splat_radius = value;
    }
    if let Some(value) = overrides.density_dissipation {
        sim.density_dissipation = value;
    }
    if let Some(value) = overrides.velocity_dissipation {
        sim.velocity_dissipation = value;
    }
    if overrides.transparent {
        sim.transparent = true;
    }
    Ok(())
}

pub fn renderer_config(file: &FluidFile, args: &RunArgs) -> RendererConfig {
    let surface_size = file
        .window
        .size
        .map(|[width, height]| (width, height))
        .unwrap_or(DEFAULT_WINDOW_SIZE);
    RendererConfig {
        simulation: file.simulation,
        surface_size,
        target_fps: file.window.fps.filter(|fps| *fps > 0.0),
        power: file.window.power,
        seed: args.seed,
    }
}

pub fn snapshot_request(
    file: &FluidFile,
    args: &RunArgs,
    snapshot: &SnapshotArgs,
) -> Result<SnapshotRequest> {
    if !snapshot.step.is_finite() || snapshot.step <= 0.0 {
        bail!("snapshot step must be a positive number of seconds");
    }
    let (width, height) = file
        .window
        .size
        .map(|[width, height]| (width, height))
        .unwrap_or(DEFAULT_SNAPSHOT_SIZE);
    let mut request = SnapshotRequest::new(
        file.simulation,
        SurfaceSize::new(width, height),
        snapshot.output.clone(),
    );
    request.frames = snapshot.frames;
    request.step = Duration::try_from_secs_f64(snapshot.step)
        .with_context(|| format!("snapshot step {} is out of range", snapshot.step))?;
    request.seed = args.seed.unwrap_or_default();
    Ok(request)
}

fn write_default_config(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let contents = FluidFile::default().to_toml_string()?;
    fs::write(path, contents)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote default configuration");
    Ok(path.to_path_buf())
}
