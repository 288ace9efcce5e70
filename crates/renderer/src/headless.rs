use anyhow::{Context, Result};
use crossbeam_channel::unbounded;

use crate::device::CpuDevice;
use crate::program::{InputName, ProgramManager, Slot};
use crate::runtime::{frame_interval, FrameScheduler, SteppedTimeSource};
use crate::session::Session;
use crate::types::RendererConfig;

/// Result of a headless program check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub program: String,
    pub block_size: usize,
    pub slots: Vec<(InputName, Slot)>,
    /// Frames rendered on the CPU device; zero when none were requested.
    pub frames: u64,
    /// Internal size of the last frame rendered.
    pub frame_size: Option<(u32, u32)>,
}

/// Compiles, links and binds the configured program without a window, then
/// optionally renders `frames` frames on the CPU device.
pub fn check(config: &RendererConfig, frames: u64) -> Result<CheckReport> {
    let sources = crate::program_sources(config)?;
    let device = CpuDevice::new(config.threads)?.with_render_scale(config.render_scale);
    let mut manager = ProgramManager::new(device);
    for source in &sources {
        manager.compile(source)?;
    }
    let program = manager.link()?;
    let label = program.label.clone();
    let block_size = program.block_size();
    let slots = manager
        .bind_inputs(&config.controls.disabled)?
        .iter()
        .map(|(name, slot)| (name, slot.clone()))
        .collect();

    let mut report = CheckReport {
        program: label,
        block_size,
        slots,
        frames: 0,
        frame_size: None,
    };
    if frames == 0 {
        return Ok(report);
    }

    manager
        .activate()
        .context("program cannot be rendered headless")?;
    let (_events_tx, events_rx) = unbounded();
    let (width, height) = config.surface_size;
    let frame_step =
        frame_interval(config.target_fps).unwrap_or(std::time::Duration::from_millis(16));
    let mut session = Session::new(manager, events_rx)
        .with_params(config.params)
        .with_controls(config.controls.clone())
        .with_resolution(width, height)
        .with_clock(Box::new(SteppedTimeSource::new(frame_step)));
    let mut scheduler = FrameScheduler::new(None, std::time::Duration::ZERO);
    report.frames = session.run(&mut scheduler, Some(frames))?;
    report.frame_size = session.program().device().last_frame_size();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use field::Style;

    fn small_config() -> RendererConfig {
        RendererConfig {
            surface_size: (64, 36),
            threads: Some(1),
            style: Style::thor(),
            ..RendererConfig::default()
        }
    }

    #[test]
    fn check_reports_all_slots() {
        let report = check(&small_config(), 0).unwrap();
        assert_eq!(report.block_size, 32);
        let names: Vec<String> = report.slots.iter().map(|(name, _)| name.to_string()).collect();
        assert_eq!(
            names,
            vec!["time", "resolution", "speed", "warp", "thickness", "colorShift"]
        );
        assert_eq!(report.frames, 0);
    }

    #[test]
    fn check_renders_requested_frames() {
        let config = RendererConfig {
            render_scale: 0.5,
            ..small_config()
        };
        let report = check(&config, 2).unwrap();
        assert_eq!(report.frames, 2);
        assert_eq!(report.frame_size, Some((32, 18)));
    }

    #[test]
    fn custom_shader_binds_but_does_not_render_on_cpu() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".wgsl").tempfile().unwrap();
        writeln!(
            file,
            "@fragment fn fs_tunnel() -> @location(0) vec4<f32> {{ return vec4<f32>(inputs.time); }}"
        )
        .unwrap();
        let config = RendererConfig {
            shader: Some(file.path().to_path_buf()),
            ..small_config()
        };
        let report = check(&config, 0).unwrap();
        assert_eq!(report.slots.len(), 6);
        let err = check(&config, 1).unwrap_err();
        assert!(format!("{err:#}").contains("custom fragment"), "{err:#}");
    }
}
