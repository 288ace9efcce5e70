//! Renderer crate for warptunnel.
//!
//! The crate turns a program made of WGSL units into pixels on one of two
//! devices and drives it from an interactive session. The overall flow is:
//!
//! ```text
//!   CLI / warptunnel
//!          │ RendererConfig
//!          ▼
//!   program_sources ──▶ ProgramManager ──▶ Session::step ──▶ Device::dispatch
//!                        compile / link        │                 │
//!                        bind / activate       │                 ├─▶ GpuDevice (fragment shader)
//!                                              │                 └─▶ CpuDevice ─▶ FrameSink
//!                       window events ─────────┘
//! ```
//!
//! `ProgramManager` owns the lifecycle of one program and its input block,
//! `Session` owns the parameters and clock, and `window::run` wires both to a
//! winit event loop. `headless::check` runs the same path without a window.

use std::fs;

use anyhow::{Context, Result};

pub mod device;
mod gpu;
pub mod headless;
pub mod program;
pub mod runtime;
pub mod session;
pub mod types;
mod window;

pub use device::{CpuDevice, Device, FrameBuffer, FrameSink};
pub use gpu::{GpuDevice, GpuProgram};
pub use headless::{check, CheckReport};
pub use program::{ProgramError, ProgramManager, ProgramSource, ProgramState};
pub use session::{Controls, InputEvent, Key, Session};
pub use types::{DeviceKind, GpuPowerPreference, RendererConfig};
pub use window::run;

/// Units making up the configured program: the shared vertex stage plus either
/// the built-in tunnel fragment or a custom fragment body read from disk.
pub fn program_sources(config: &RendererConfig) -> Result<Vec<ProgramSource>> {
    let fragment = match &config.shader {
        Some(path) => {
            let body = fs::read_to_string(path)
                .with_context(|| format!("failed to read shader {}", path.display()))?;
            let label = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            ProgramSource::custom_fragment(label, &body, config.style)
        }
        None => ProgramSource::builtin_fragment(config.style),
    };
    Ok(vec![ProgramSource::builtin_vertex(), fragment])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_sources_have_vertex_and_fragment() {
        let sources = program_sources(&RendererConfig::default()).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources[1].label.starts_with("tunnel fragment"));
        assert!(sources.iter().all(ProgramSource::is_builtin));
    }

    #[test]
    fn custom_shader_uses_file_name_as_label() {
        let mut file = tempfile::Builder::new().suffix(".wgsl").tempfile().unwrap();
        writeln!(file, "@fragment fn fs_tunnel() -> @location(0) vec4<f32> {{ return vec4<f32>(1.0); }}").unwrap();
        let config = RendererConfig {
            shader: Some(file.path().to_path_buf()),
            ..RendererConfig::default()
        };
        let sources = program_sources(&config).unwrap();
        let name = file.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(sources[1].label, name);
        assert!(sources[1].code.contains("TunnelInputs"));
        assert!(sources[0].is_builtin());
        assert!(!sources[1].is_builtin());
    }

    #[test]
    fn missing_shader_reports_path() {
        let config = RendererConfig {
            shader: Some("/nonexistent/tunnel.wgsl".into()),
            ..RendererConfig::default()
        };
        let err = program_sources(&config).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/tunnel.wgsl"));
    }
}
