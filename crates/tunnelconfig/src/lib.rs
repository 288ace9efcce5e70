use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use field::{Parameter, ParameterSet, Style};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceChoice {
    Cpu,
    Gpu,
}

/// Contents of a `warptunnel.toml` file. Every value is optional; unset
/// values fall through to the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TunnelConfig {
    #[serde(default)]
    pub params: ParamsSection,
    #[serde(default)]
    pub controls: ControlsSection,
    #[serde(default)]
    pub render: RenderSection,
}

/// Initial parameter values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ParamsSection {
    pub speed: Option<f32>,
    pub warp: Option<f32>,
    pub thickness: Option<f32>,
    pub color_shift: Option<f32>,
}

/// Key step sizes and statically disabled controls.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ControlsSection {
    pub speed_factor: Option<f32>,
    pub warp_step: Option<f32>,
    pub thickness_step: Option<f32>,
    pub color_shift_step: Option<f32>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RenderSection {
    pub device: Option<DeviceChoice>,
    pub style: Option<String>,
    /// Window size as `WIDTHxHEIGHT`.
    pub size: Option<String>,
    /// Frame cap; `0` disables the cap.
    pub fps: Option<f32>,
    pub render_scale: Option<f32>,
    pub threads: Option<usize>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub pacing: Option<Duration>,
    pub shader: Option<PathBuf>,
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Smallest accepted non-zero frame cap.
pub const MIN_FPS: f32 = 0.01;

/// Accepts `0` (uncapped) or a finite cap of at least [`MIN_FPS`].
pub fn check_fps(fps: f32) -> Result<(), String> {
    if fps == 0.0 || (fps.is_finite() && fps >= MIN_FPS) {
        Ok(())
    } else {
        Err(format!("must be 0 or a finite value >= {MIN_FPS}, got {fps}"))
    }
}

/// Parses `WIDTHxHEIGHT` (also accepts `X` and `×`) into non-zero dimensions.
pub fn parse_size(raw: &str) -> Result<(u32, u32), String> {
    let normalized = raw.trim().to_ascii_lowercase().replace('×', "x");
    let (width, height) = normalized
        .split_once('x')
        .ok_or_else(|| format!("invalid size '{raw}'; expected WIDTHxHEIGHT"))?;
    let parse = |part: &str| -> Result<u32, String> {
        part.trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid size '{raw}': {err}"))
    };
    let size = (parse(width)?, parse(height)?);
    if size.0 == 0 || size.1 == 0 {
        return Err(format!("invalid size '{raw}'; dimensions must be non-zero"));
    }
    Ok(size)
}

impl TunnelConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: TunnelConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let params = &self.params;
        if let Some(speed) = params.speed {
            if !(speed > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "params.speed must be > 0, got {speed}"
                )));
            }
        }
        if let Some(warp) = params.warp {
            if !(warp >= ParameterSet::MIN_WARP) {
                return Err(ConfigError::Invalid(format!(
                    "params.warp must be >= {}, got {warp}",
                    ParameterSet::MIN_WARP
                )));
            }
        }
        if let Some(thickness) = params.thickness {
            if !(thickness >= ParameterSet::MIN_THICKNESS) {
                return Err(ConfigError::Invalid(format!(
                    "params.thickness must be >= {}, got {thickness}",
                    ParameterSet::MIN_THICKNESS
                )));
            }
        }
        if let Some(color_shift) = params.color_shift {
            if !color_shift.is_finite() {
                return Err(ConfigError::Invalid(
                    "params.color_shift must be finite".into(),
                ));
            }
        }

        let controls = &self.controls;
        if let Some(factor) = controls.speed_factor {
            if !(factor > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "controls.speed_factor must be > 0, got {factor}"
                )));
            }
        }
        for (name, step) in [
            ("warp_step", controls.warp_step),
            ("thickness_step", controls.thickness_step),
            ("color_shift_step", controls.color_shift_step),
        ] {
            if let Some(step) = step {
                if !(step > 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "controls.{name} must be > 0, got {step}"
                    )));
                }
            }
        }
        controls.disabled_parameters()?;

        let render = &self.render;
        if let Some(style) = &render.style {
            style
                .parse::<Style>()
                .map_err(|err| ConfigError::Invalid(format!("render.style: {err}")))?;
        }
        if let Some(size) = &render.size {
            parse_size(size).map_err(|err| ConfigError::Invalid(format!("render.size: {err}")))?;
        }
        if let Some(fps) = render.fps {
            check_fps(fps).map_err(|err| ConfigError::Invalid(format!("render.fps {err}")))?;
        }
        if let Some(scale) = render.render_scale {
            if !(0.1..=1.0).contains(&scale) {
                return Err(ConfigError::Invalid(format!(
                    "render.render_scale must be within 0.1..=1.0, got {scale}"
                )));
            }
        }
        if render.threads == Some(0) {
            return Err(ConfigError::Invalid("render.threads must be >= 1".into()));
        }

        Ok(())
    }

    /// Overlays the configured values onto `base`.
    pub fn parameter_set(&self, base: ParameterSet) -> ParameterSet {
        let params = &self.params;
        ParameterSet {
            speed: params.speed.unwrap_or(base.speed),
            warp: params.warp.unwrap_or(base.warp),
            thickness: params.thickness.unwrap_or(base.thickness),
            color_shift: params.color_shift.unwrap_or(base.color_shift),
        }
    }

    pub fn style(&self) -> Result<Option<Style>, ConfigError> {
        self.render
            .style
            .as_deref()
            .map(|raw| {
                raw.parse::<Style>()
                    .map_err(|err| ConfigError::Invalid(format!("render.style: {err}")))
            })
            .transpose()
    }

    pub fn size(&self) -> Result<Option<(u32, u32)>, ConfigError> {
        self.render
            .size
            .as_deref()
            .map(|raw| {
                parse_size(raw).map_err(|err| ConfigError::Invalid(format!("render.size: {err}")))
            })
            .transpose()
    }
}

impl ControlsSection {
    pub fn disabled_parameters(&self) -> Result<Vec<Parameter>, ConfigError> {
        let mut parameters = Vec::with_capacity(self.disabled.len());
        for name in &self.disabled {
            let parameter = name
                .parse::<Parameter>()
                .map_err(|err| ConfigError::Invalid(format!("controls.disabled: {err}")))?;
            if !parameters.contains(&parameter) {
                parameters.push(parameter);
            }
        }
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[params]
speed = 4.5
thickness = 0.25

[controls]
speed_factor = 1.25
warp_step = 0.2
disabled = ["color_shift", "warp"]

[render]
device = "cpu"
style = "drift+banking"
size = "800x600"
fps = 30
render_scale = 0.5
threads = 4
pacing = "2ms"
shader = "shaders/custom.wgsl"
"#;

    #[test]
    fn parses_sample_config() {
        let config = TunnelConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.render.device, Some(DeviceChoice::Cpu));
        assert_eq!(config.render.pacing, Some(Duration::from_millis(2)));
        assert_eq!(config.size().unwrap(), Some((800, 600)));
        let style = config.style().unwrap().unwrap();
        assert!(style.drift && style.banking && !style.hammer);
        assert_eq!(
            config.controls.disabled_parameters().unwrap(),
            vec![Parameter::ColorShift, Parameter::Warp]
        );
        assert_eq!(
            config.render.shader.as_deref(),
            Some(Path::new("shaders/custom.wgsl"))
        );
    }

    #[test]
    fn empty_config_is_valid() {
        let config = TunnelConfig::from_toml_str("").unwrap();
        assert!(config.style().unwrap().is_none());
        assert!(config.render.pacing.is_none());
        assert_eq!(config.parameter_set(ParameterSet::default()), ParameterSet::default());
    }

    #[test]
    fn overlays_params_onto_defaults() {
        let config = TunnelConfig::from_toml_str(SAMPLE).unwrap();
        let params = config.parameter_set(ParameterSet::default());
        assert_eq!(params.speed, 4.5);
        assert_eq!(params.warp, 1.0);
        assert_eq!(params.thickness, 0.25);
        assert_eq!(params.color_shift, 0.0);
    }

    #[test]
    fn rejects_out_of_range_params() {
        for input in [
            "[params]\nspeed = 0",
            "[params]\nspeed = -1.0",
            "[params]\nwarp = 0.05",
            "[params]\nthickness = 0.001",
            "[controls]\nspeed_factor = 0",
            "[controls]\nthickness_step = -0.01",
            "[render]\nrender_scale = 1.5",
            "[render]\nfps = -1",
            "[render]\nfps = 1e-20",
            "[render]\nfps = inf",
            "[render]\nfps = nan",
            "[render]\nthreads = 0",
        ] {
            let err = TunnelConfig::from_toml_str(input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{input}: {err}");
        }
    }

    #[test]
    fn rejects_unknown_control_name() {
        let err = TunnelConfig::from_toml_str("[controls]\ndisabled = [\"gamma\"]").unwrap_err();
        assert!(err.to_string().contains("gamma"));
    }

    #[test]
    fn rejects_bad_style_and_size() {
        let err = TunnelConfig::from_toml_str("[render]\nstyle = \"sparkle\"").unwrap_err();
        assert!(err.to_string().contains("sparkle"));
        let err = TunnelConfig::from_toml_str("[render]\nsize = \"0x200\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn numeric_pacing_is_seconds() {
        let config = TunnelConfig::from_toml_str("[render]\npacing = 0.5").unwrap();
        assert_eq!(config.render.pacing, Some(Duration::from_millis(500)));
        let err = TunnelConfig::from_toml_str("[render]\npacing = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_fps_means_uncapped() {
        let config = TunnelConfig::from_toml_str("[render]\nfps = 0").unwrap();
        assert_eq!(config.render.fps, Some(0.0));
        assert!(check_fps(MIN_FPS).is_ok());
        assert!(check_fps(MIN_FPS / 2.0).is_err());
    }

    #[test]
    fn parse_size_accepts_spellings() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size(" 640X480 "), Ok((640, 480)));
        assert_eq!(parse_size("320×200"), Ok((320, 200)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("ax720").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = TunnelConfig::load(Path::new("/nonexistent/warptunnel.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[render]\ndevice = \"gpu\"\n").unwrap();
        let config = TunnelConfig::load(file.path()).unwrap();
        assert_eq!(config.render.device, Some(DeviceChoice::Gpu));
    }
}
