use anyhow::{anyhow, ensure, Context, Result};
use field::ParameterSet;
use renderer::{Controls, DeviceKind, RendererConfig};
use tracing_subscriber::EnvFilter;
use tunnelconfig::DeviceChoice;

use crate::cli::RunArgs;
use crate::paths::{self, LoadedConfig};

pub fn run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    tracing::info!(
        device = %config.device,
        style = %config.style,
        width = config.surface_size.0,
        height = config.surface_size.1,
        "launching warptunnel"
    );
    renderer::run(config)
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Builds the renderer configuration from the file, then applies CLI flags on top.
pub fn resolve_config(args: &RunArgs) -> Result<RendererConfig> {
    let loaded = paths::load_config(args.config.as_deref())?;
    merge(args, loaded.as_ref())
}

fn merge(args: &RunArgs, loaded: Option<&LoadedConfig>) -> Result<RendererConfig> {
    let defaults = RendererConfig::default();
    let file = loaded.map(|loaded| &loaded.config);

    let (controls, params) = match file {
        Some(file) => {
            let base = Controls::default();
            let section = &file.controls;
            let controls = Controls {
                speed_factor: section.speed_factor.unwrap_or(base.speed_factor),
                warp_step: section.warp_step.unwrap_or(base.warp_step),
                thickness_step: section.thickness_step.unwrap_or(base.thickness_step),
                color_shift_step: section.color_shift_step.unwrap_or(base.color_shift_step),
                disabled: section.disabled_parameters()?,
            };
            (controls, file.parameter_set(ParameterSet::default()))
        }
        None => (Controls::default(), ParameterSet::default()),
    };
    let params = ParameterSet {
        speed: args.speed.unwrap_or(params.speed),
        warp: args.warp.unwrap_or(params.warp),
        thickness: args.thickness.unwrap_or(params.thickness),
        color_shift: args.color_shift.unwrap_or(params.color_shift),
    };
    ensure!(
        params.speed > 0.0 && params.speed <= ParameterSet::MAX_SPEED,
        "speed must be within (0, {}], got {}",
        ParameterSet::MAX_SPEED,
        params.speed
    );
    ensure!(
        params.warp >= ParameterSet::MIN_WARP,
        "warp must be >= {}, got {}",
        ParameterSet::MIN_WARP,
        params.warp
    );
    ensure!(
        params.thickness >= ParameterSet::MIN_THICKNESS,
        "thickness must be >= {}, got {}",
        ParameterSet::MIN_THICKNESS,
        params.thickness
    );
    ensure!(params.color_shift.is_finite(), "color shift must be finite");

    let render = file.map(|file| &file.render);
    let device = args
        .device
        .or_else(|| {
            render.and_then(|render| render.device).map(|choice| match choice {
                DeviceChoice::Cpu => DeviceKind::Cpu,
                DeviceChoice::Gpu => DeviceKind::Gpu,
            })
        })
        .unwrap_or(defaults.device);
    let style = match args.style {
        Some(style) => style,
        None => file
            .map(|file| file.style())
            .transpose()
            .context("invalid style in configuration")?
            .flatten()
            .unwrap_or(defaults.style),
    };
    let surface_size = match args.size {
        Some(size) => size,
        None => file
            .map(|file| file.size())
            .transpose()
            .context("invalid size in configuration")?
            .flatten()
            .unwrap_or(defaults.surface_size),
    };
    let target_fps = args
        .fps
        .or_else(|| render.and_then(|render| render.fps));
    if let Some(fps) = target_fps {
        tunnelconfig::check_fps(fps).map_err(|err| anyhow!("fps {err}"))?;
    }
    let target_fps = target_fps.filter(|fps| *fps > 0.0);
    let render_scale = args
        .render_scale
        .or_else(|| render.and_then(|render| render.render_scale))
        .unwrap_or(defaults.render_scale);
    ensure!(
        (0.1..=1.0).contains(&render_scale),
        "render scale must be within 0.1..=1.0, got {render_scale}"
    );
    let threads = args
        .threads
        .or_else(|| render.and_then(|render| render.threads));
    ensure!(threads != Some(0), "thread count must be >= 1");
    let shader = args.shader.clone().or_else(|| {
        loaded.and_then(|loaded| {
            loaded
                .config
                .render
                .shader
                .as_deref()
                .map(|path| loaded.resolve(path))
        })
    });

    Ok(RendererConfig {
        device,
        style,
        surface_size,
        target_fps,
        render_scale,
        threads,
        pacing: render
            .and_then(|render| render.pacing)
            .unwrap_or(defaults.pacing),
        shader,
        fixed_time: args.time,
        params,
        controls,
        gpu_power: defaults.gpu_power,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use field::{Parameter, Style};
    use tunnelconfig::TunnelConfig;

    fn loaded(input: &str) -> LoadedConfig {
        LoadedConfig {
            path: PathBuf::from("/etc/warptunnel/warptunnel.toml"),
            config: TunnelConfig::from_toml_str(input).unwrap(),
        }
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let config = merge(&RunArgs::default(), None).unwrap();
        assert_eq!(config, RendererConfig::default());
    }

    #[test]
    fn cli_flags_override_file_values() {
        let file = loaded(
            r#"
[params]
speed = 2.0
warp = 1.5

[controls]
warp_step = 0.25
disabled = ["thickness"]

[render]
device = "cpu"
style = "twirl"
size = "800x600"
fps = 30
pacing = "5ms"
shader = "custom.wgsl"
"#,
        );
        let args = RunArgs {
            speed: Some(9.0),
            style: Some(Style::thor()),
            fps: Some(0.0),
            ..RunArgs::default()
        };
        let config = merge(&args, Some(&file)).unwrap();
        assert_eq!(config.params.speed, 9.0);
        assert_eq!(config.params.warp, 1.5);
        assert_eq!(config.style, Style::thor());
        assert_eq!(config.device, DeviceKind::Cpu);
        assert_eq!(config.surface_size, (800, 600));
        assert_eq!(config.target_fps, None);
        assert_eq!(config.pacing, Duration::from_millis(5));
        assert_eq!(config.controls.warp_step, 0.25);
        assert_eq!(config.controls.disabled, vec![Parameter::Thickness]);
        assert_eq!(
            config.shader,
            Some(PathBuf::from("/etc/warptunnel/custom.wgsl"))
        );
    }

    #[test]
    fn rejects_out_of_range_flags() {
        for args in [
            RunArgs {
                warp: Some(0.01),
                ..RunArgs::default()
            },
            RunArgs {
                speed: Some(0.0),
                ..RunArgs::default()
            },
            RunArgs {
                render_scale: Some(2.0),
                ..RunArgs::default()
            },
            RunArgs {
                threads: Some(0),
                ..RunArgs::default()
            },
            RunArgs {
                fps: Some(1e-20),
                ..RunArgs::default()
            },
            RunArgs {
                fps: Some(f32::NAN),
                ..RunArgs::default()
            },
        ] {
            assert!(merge(&args, None).is_err(), "{args:?}");
        }
    }
}
