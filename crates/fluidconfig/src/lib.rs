//! Static configuration table for the fluid simulation.
//!
//! The simulation reads a fixed set of numeric knobs at startup and never
//! mutates them during a run. They come from three layers, applied in order:
//! built-in defaults, an optional TOML file, then CLI overrides applied by the
//! binary. Whatever the source, [`SimulationConfig::validate`] is the gate
//! every table passes through before the renderer sees it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Linear RGB triple in `[0, 1]` per channel.
pub type Rgb = [f32; 3];

/// Current on-disk schema version.
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// GPU adapter preference forwarded to `wgpu` when picking a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuPower {
    Low,
    #[default]
    High,
}

/// Named numeric parameters of the solver.
///
/// Field names follow the knobs of the classic WebGL stable-fluids demo so
/// configs can be ported by hand.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Base resolution of the velocity/pressure grid (shorter axis, in cells).
    pub sim_resolution: u32,
    /// Base resolution of the dye grid (shorter axis, in texels).
    pub dye_resolution: u32,
    /// Exponential decay rate of the dye field per second.
    pub density_dissipation: f32,
    /// Exponential decay rate of the velocity field per second.
    pub velocity_dissipation: f32,
    /// Fraction of last frame's pressure carried into the next solve.
    pub pressure: f32,
    /// Number of Jacobi sweeps per frame; the only stopping criterion.
    pub pressure_iterations: u32,
    /// Vorticity confinement strength.
    pub curl: f32,
    /// Splat radius in percent of the shorter axis.
    pub splat_radius: f32,
    /// Multiplier turning a normalized pointer delta into a velocity impulse.
    pub splat_force: f32,
    /// Rate at which pointer colors are re-rolled (cycles per second).
    pub color_update_speed: f32,
    /// Background tint added to the dye in the display pass.
    pub back_color: Rgb,
    /// Emit alpha from dye intensity instead of an opaque surface.
    pub transparent: bool,
    /// Seconds between ambient impulses.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub ambient_interval: Duration,
    /// Force magnitude of ambient impulses (same units as `splat_force * delta`).
    pub ambient_force: f32,
    /// Upper bound for the integration step.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub max_step: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 1.0,
            velocity_dissipation: 0.2,
            pressure: 0.8,
            pressure_iterations: 20,
            curl: 30.0,
            splat_radius: 0.25,
            splat_force: 6000.0,
            color_update_speed: 10.0,
            back_color: [0.0, 0.0, 0.0],
            transparent: false,
            ambient_interval: Duration::from_secs(3),
            ambient_force: 600.0,
            max_step: Duration::from_secs_f64(1.0 / 60.0),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sim_resolution == 0 {
            return Err(ConfigError::Invalid(
                "sim_resolution must be a positive integer".into(),
            ));
        }
        if self.dye_resolution == 0 {
            return Err(ConfigError::Invalid(
                "dye_resolution must be a positive integer".into(),
            ));
        }

        let non_negative = [
            ("density_dissipation", self.density_dissipation),
            ("velocity_dissipation", self.velocity_dissipation),
            ("curl", self.curl),
            ("splat_force", self.splat_force),
            ("color_update_speed", self.color_update_speed),
            ("ambient_force", self.ambient_force),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a finite value >= 0 (got {value})"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.pressure) {
            return Err(ConfigError::Invalid(format!(
                "pressure must lie in [0, 1] (got {})",
                self.pressure
            )));
        }

        if !self.splat_radius.is_finite() || self.splat_radius <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "splat_radius must be > 0 (got {})",
                self.splat_radius
            )));
        }

        if self
            .back_color
            .iter()
            .any(|channel| !channel.is_finite() || *channel < 0.0)
        {
            return Err(ConfigError::Invalid(
                "back_color channels must be finite values >= 0".into(),
            ));
        }

        if self.max_step.is_zero() {
            return Err(ConfigError::Invalid(
                "max_step must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Integration step ceiling in seconds.
    pub fn max_step_seconds(&self) -> f32 {
        self.max_step.as_secs_f32()
    }
}

/// Host window preferences.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSettings {
    /// Initial inner size in physical pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<[u32; 2]>,
    /// Optional frame-rate cap; `None` or `0` renders on every vsync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
    pub power: GpuPower,
}

/// Top-level layout of `config.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FluidFile {
    pub version: u32,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub window: WindowSettings,
}

impl Default for FluidFile {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            simulation: SimulationConfig::default(),
            window: WindowSettings::default(),
        }
    }
}

impl FluidFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FluidFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        self.simulation.validate()?;

        if let Some([width, height]) = self.window.size {
            if width == 0 || height == 0 {
                return Err(ConfigError::Invalid(
                    "window.size dimensions must be greater than zero".into(),
                ));
            }
        }

        if let Some(fps) = self.window.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid(
                    "window.fps must be a finite value >= 0".into(),
                ));
            }
        }

        Ok(())
    }
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[simulation]
sim_resolution = 64
dye_resolution = 512
pressure_iterations = 30
curl = 12.5
back_color = [0.05, 0.0, 0.1]
transparent = true
ambient_interval = "1500ms"
max_step = 0.02

[window]
size = [1280, 720]
fps = 0
power = "low"
"#;

    #[test]
    fn parses_sample_config() {
        let config = FluidFile::from_toml_str(SAMPLE).expect("parse config");
        let sim = &config.simulation;
        assert_eq!(sim.sim_resolution, 64);
        assert_eq!(sim.dye_resolution, 512);
        assert_eq!(sim.pressure_iterations, 30);
        assert!((sim.curl - 12.5).abs() < f32::EPSILON);
        assert!(sim.transparent);
        assert_eq!(sim.ambient_interval, Duration::from_millis(1500));
        assert_eq!(sim.max_step, Duration::from_secs_f64(0.02));
        // Unspecified knobs keep their defaults.
        assert_eq!(sim.splat_force, SimulationConfig::default().splat_force);
        assert_eq!(config.window.size, Some([1280, 720]));
        assert_eq!(config.window.power, GpuPower::Low);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = FluidFile::from_toml_str("version = 1").expect("parse config");
        assert_eq!(config, FluidFile::default());
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = FluidFile::from_toml_str("version = 7").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_resolution() {
        let err = FluidFile::from_toml_str(
            r#"
version = 1
[simulation]
sim_resolution = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("sim_resolution")));
    }

    #[test]
    fn rejects_negative_dissipation() {
        let err = FluidFile::from_toml_str(
            r#"
version = 1
[simulation]
velocity_dissipation = -0.5
"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid(message) if message.contains("velocity_dissipation"))
        );
    }

    #[test]
    fn rejects_pressure_factor_above_one() {
        let mut config = SimulationConfig::default();
        config.pressure = 1.5;
        assert!(config.validate().is_err());
        config.pressure = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_simulation_keys() {
        let err = FluidFile::from_toml_str(
            r#"
version = 1
[simulation]
viscosity = 3.0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_negative_duration() {
        let err = FluidFile::from_toml_str(
            r#"
version = 1
[simulation]
ambient_interval = -2
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_unrepresentable_durations() {
        for key in ["ambient_interval", "max_step"] {
            let err = FluidFile::from_toml_str(&format!(
                "version = 1\n[simulation]\n{key} = 1e30\n"
            ))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{key}: {err}");
        }
    }

    #[test]
    fn rejects_non_finite_fps() {
        let err = FluidFile::from_toml_str("version = 1\n[window]\nfps = inf\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("window.fps")));
    }

    #[test]
    fn serialised_defaults_parse_back() {
        let rendered = FluidFile::default().to_toml_string().expect("serialise");
        let parsed = FluidFile::from_toml_str(&rendered).expect("parse rendered defaults");
        assert_eq!(parsed.simulation.sim_resolution, 128);
        assert_eq!(parsed.simulation.ambient_interval, Duration::from_secs(3));
        let drift = parsed.simulation.max_step_seconds() - 1.0 / 60.0;
        assert!(drift.abs() < 1e-6);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");
        let err = FluidFile::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).expect("write config");
        let config = FluidFile::load(&path).expect("load config");
        assert_eq!(config.simulation.sim_resolution, 64);
    }
}
