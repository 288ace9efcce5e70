use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use field::{ParameterSet, Style};

use crate::session::Controls;

/// Where the per-pixel program executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceKind {
    /// Native evaluation on a thread pool, blitted to the window.
    Cpu,
    /// The WGSL program as a fragment shader.
    #[default]
    Gpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => f.write_str("cpu"),
            DeviceKind::Gpu => f.write_str("gpu"),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceKind::Cpu),
            "gpu" => Ok(DeviceKind::Gpu),
            other => Err(format!("unknown device '{other}'; expected cpu or gpu")),
        }
    }
}

/// Power profile requested from the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Everything the window and headless drivers need to start a session.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub device: DeviceKind,
    pub style: Style,
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Optional frames-per-second cap.
    pub target_fps: Option<f32>,
    /// Internal resolution factor for the CPU device.
    pub render_scale: f32,
    /// CPU worker count; `None` uses one per core.
    pub threads: Option<usize>,
    /// Pause between frames when no FPS cap is set.
    pub pacing: Duration,
    /// Custom fragment body replacing the built-in tunnel.
    pub shader: Option<PathBuf>,
    /// Freezes the clock at this time in seconds.
    pub fixed_time: Option<f32>,
    pub params: ParameterSet,
    pub controls: Controls,
    pub gpu_power: GpuPowerPreference,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            device: DeviceKind::default(),
            style: Style::default(),
            surface_size: (1280, 720),
            target_fps: None,
            render_scale: 1.0,
            threads: None,
            pacing: Duration::from_millis(1),
            shader: None,
            fixed_time: None,
            params: ParameterSet::default(),
            controls: Controls::default(),
            gpu_power: GpuPowerPreference::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_kind_round_trips_names() {
        assert_eq!("CPU".parse::<DeviceKind>(), Ok(DeviceKind::Cpu));
        assert_eq!(DeviceKind::Gpu.to_string(), "gpu");
        assert!("tpu".parse::<DeviceKind>().unwrap_err().contains("tpu"));
    }
}
